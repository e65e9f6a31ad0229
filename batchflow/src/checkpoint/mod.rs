//! Checkpoint store backed by an append-only, line-delimited record file.
//!
//! Tracks which input items already completed successfully so a restarted
//! run does not reprocess them. The file holds one JSON object per line,
//! each carrying at least the configured identifier field. A missing or
//! unreadable file means "no checkpoint", never an error. Appends are
//! serialized through a single-writer lock and synced to disk before
//! `mark_complete` returns; sharing one file across processes is out of
//! scope.

use crate::core::Item;
use crate::errors::BatchflowError;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

struct Inner {
    complete: HashSet<String>,
    file: Option<File>,
}

/// Persistent set of completed item identifiers.
pub struct CheckpointStore {
    path: PathBuf,
    key_field: String,
    inner: Mutex<Inner>,
}

impl CheckpointStore {
    /// Opens a checkpoint store, reading the full file once.
    ///
    /// Unparseable lines and lines without the identifier field are
    /// skipped with a warning.
    #[must_use]
    pub fn open(path: impl Into<PathBuf>, key_field: impl Into<String>) -> Self {
        let path = path.into();
        let key_field = key_field.into();
        let complete = Self::load_existing(&path, &key_field);

        Self {
            path,
            key_field,
            inner: Mutex::new(Inner {
                complete,
                file: None,
            }),
        }
    }

    fn load_existing(path: &Path, key_field: &str) -> HashSet<String> {
        let Ok(file) = File::open(path) else {
            return HashSet::new();
        };

        let mut complete = HashSet::new();
        for line in BufReader::new(file).lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<serde_json::Value>(&line) {
                Ok(value) => {
                    if let Some(id) = Item::from_value(value).identifier(key_field) {
                        complete.insert(id);
                    } else {
                        tracing::warn!(key_field, "Checkpoint line missing identifier field");
                    }
                }
                Err(error) => {
                    tracing::warn!(%error, "Skipping corrupt checkpoint line");
                }
            }
        }
        complete
    }

    /// The configured identifier field name.
    #[must_use]
    pub fn key_field(&self) -> &str {
        &self.key_field
    }

    /// Number of identifiers known to be complete.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().complete.len()
    }

    /// Returns true if no identifier is recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().complete.is_empty()
    }

    /// Returns true if the identifier already completed.
    #[must_use]
    pub fn is_complete(&self, id: &str) -> bool {
        self.inner.lock().complete.contains(id)
    }

    /// Records an identifier as complete, durably.
    ///
    /// The in-memory set and the file are updated together under the
    /// writer lock; the append is synced before this returns. Recording
    /// an already-complete identifier is a no-op.
    pub fn mark_complete(&self, id: &str) -> Result<(), BatchflowError> {
        let mut inner = self.inner.lock();
        if !inner.complete.insert(id.to_string()) {
            return Ok(());
        }

        if inner.file.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
            inner.file = Some(file);
        }

        let line = serde_json::json!({ self.key_field.as_str(): id });
        if let Some(file) = inner.file.as_mut() {
            writeln!(file, "{line}")?;
            file.sync_data()?;
        }
        Ok(())
    }

    /// Drops items whose identifier is already complete.
    ///
    /// Items lacking the identifier field are always considered pending.
    #[must_use]
    pub fn filter_pending(&self, items: Vec<Item>) -> Vec<Item> {
        let inner = self.inner.lock();
        items
            .into_iter()
            .filter(|item| {
                item.identifier(&self.key_field)
                    .map_or(true, |id| !inner.complete.contains(&id))
            })
            .collect()
    }
}

impl std::fmt::Debug for CheckpointStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckpointStore")
            .field("path", &self.path)
            .field("key_field", &self.key_field)
            .field("complete", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn item(json: serde_json::Value) -> Item {
        Item::from_value(json)
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::open(dir.path().join("none.jsonl"), "id");
        assert!(store.is_empty());
    }

    #[test]
    fn test_mark_and_query() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::open(dir.path().join("cp.jsonl"), "id");

        assert!(!store.is_complete("a"));
        store.mark_complete("a").unwrap();
        assert!(store.is_complete("a"));
        assert_eq!(store.len(), 1);

        // idempotent
        store.mark_complete("a").unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cp.jsonl");

        {
            let store = CheckpointStore::open(&path, "id");
            store.mark_complete("a").unwrap();
            store.mark_complete("b").unwrap();
        }

        let store = CheckpointStore::open(&path, "id");
        assert!(store.is_complete("a"));
        assert!(store.is_complete("b"));
        assert!(!store.is_complete("c"));
    }

    #[test]
    fn test_corrupt_lines_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cp.jsonl");

        let mut file = File::create(&path).unwrap();
        writeln!(file, "{{\"id\": \"a\"}}").unwrap();
        writeln!(file, "not json at all").unwrap();
        writeln!(file, "{{\"other\": 1}}").unwrap();
        writeln!(file, "{{\"id\": \"b\"}}").unwrap();

        let store = CheckpointStore::open(&path, "id");
        assert_eq!(store.len(), 2);
        assert!(store.is_complete("a"));
        assert!(store.is_complete("b"));
    }

    #[test]
    fn test_filter_pending() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::open(dir.path().join("cp.jsonl"), "id");
        store.mark_complete("a").unwrap();

        let items = vec![
            item(serde_json::json!({"id": "a"})),
            item(serde_json::json!({"id": "b"})),
            item(serde_json::json!({"text": "no id"})),
        ];

        let pending = store.filter_pending(items);
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].identifier("id"), Some("b".to_string()));
        // the item without an identifier is always pending
        assert_eq!(pending[1].identifier("id"), None);
    }

    #[test]
    fn test_file_contains_one_object_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cp.jsonl");

        let store = CheckpointStore::open(&path, "id");
        store.mark_complete("a").unwrap();
        store.mark_complete("b").unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in lines {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            assert!(value.get("id").is_some());
        }
    }
}
