//! In-memory artifact store with alias and type indexes.

use crate::core::{Artifact, ArtifactRequest};
use crate::errors::BatchflowError;
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Default)]
struct Inner {
    artifacts: Vec<Artifact>,
    by_id: HashMap<String, usize>,
    by_alias: HashMap<String, usize>,
    by_kind: HashMap<String, Vec<usize>>,
}

/// Registry of artifacts produced during one pipeline run.
///
/// Artifacts are immutable once registered; ids and aliases are unique
/// store-wide.
#[derive(Default)]
pub struct ArtifactStore {
    inner: RwLock<Inner>,
}

impl ArtifactStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered artifacts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().artifacts.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().artifacts.is_empty()
    }

    /// Registers an artifact, rejecting duplicate ids and aliases.
    pub fn register(&self, artifact: Artifact) -> Result<(), BatchflowError> {
        let mut inner = self.inner.write();

        if inner.by_id.contains_key(&artifact.id) {
            return Err(BatchflowError::DuplicateArtifact(artifact.id));
        }
        if let Some(alias) = &artifact.alias {
            if inner.by_alias.contains_key(alias) {
                return Err(BatchflowError::DuplicateArtifact(alias.clone()));
            }
        }

        let index = inner.artifacts.len();
        inner.by_id.insert(artifact.id.clone(), index);
        if let Some(alias) = &artifact.alias {
            inner.by_alias.insert(alias.clone(), index);
        }
        inner
            .by_kind
            .entry(artifact.kind.clone())
            .or_default()
            .push(index);
        inner.artifacts.push(artifact);
        Ok(())
    }

    /// Resolves a request against the store.
    ///
    /// An alias request must match exactly one artifact; a type request
    /// returns every matching artifact, possibly none, in registration
    /// order.
    pub fn resolve(&self, request: &ArtifactRequest) -> Result<Vec<Artifact>, BatchflowError> {
        let inner = self.inner.read();
        match request {
            ArtifactRequest::Alias(alias) => inner
                .by_alias
                .get(alias)
                .map(|&index| vec![inner.artifacts[index].clone()])
                .ok_or_else(|| BatchflowError::UnresolvedArtifact(request.token())),
            ArtifactRequest::Type(kind) => Ok(inner
                .by_kind
                .get(kind)
                .map(|indexes| {
                    indexes
                        .iter()
                        .map(|&index| inner.artifacts[index].clone())
                        .collect()
                })
                .unwrap_or_default()),
        }
    }

    /// Every registered artifact, in registration order.
    #[must_use]
    pub fn all(&self) -> Vec<Artifact> {
        self.inner.read().artifacts.clone()
    }
}

impl std::fmt::Debug for ArtifactStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactStore")
            .field("artifacts", &self.len())
            .finish()
    }
}
