//! The cycle's final output payload and its metadata block.

use super::item::Fields;
use super::record::{Failure, Record};
use super::security::SecurityLevel;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Why a cycle halted early.
///
/// At most one exists per cycle; once set it is immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HaltReason {
    /// The halt-condition plugin that tripped.
    pub plugin: String,
    /// Arbitrary reason fields reported by the plugin.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub details: Fields,
    /// The item index at which the condition fired.
    pub item_index: usize,
}

impl HaltReason {
    /// Creates a new halt reason.
    #[must_use]
    pub fn new(plugin: impl Into<String>, details: Fields, item_index: usize) -> Self {
        Self {
            plugin: plugin.into(),
            details,
            item_index,
        }
    }
}

/// Summary of retry activity across a cycle.
///
/// Computed only when at least one record or failure carries retry history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrySummary {
    /// Total decision-step requests issued, retries included.
    pub total_requests: usize,
    /// Attempts beyond the first, summed across all processed items.
    pub total_retries: usize,
    /// Items that exhausted their retries and failed.
    pub exhausted: usize,
}

/// Metadata block describing one cycle run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleMetadata {
    /// Unique run identifier.
    pub run_id: String,
    /// RFC3339 start timestamp.
    pub started_at: String,
    /// RFC3339 finish timestamp.
    pub finished_at: String,
    /// Items in the source dataset.
    pub total_items: usize,
    /// Items skipped because they were already checkpointed.
    pub skipped: usize,
    /// Items actually processed this run.
    pub processed: usize,
    /// Items that produced a record.
    pub succeeded: usize,
    /// Items that produced a failure.
    pub failed: usize,
    /// Retry summary, present only when some item carried retry history.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetrySummary>,
    /// Halt reason, present when a halt condition tripped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub halt: Option<HaltReason>,
    /// The cycle's active security classification, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security: Option<SecurityLevel>,
    /// Mirror of the payload's named aggregates.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub aggregates: Fields,
    /// Mirror of the payload's cost summary.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub cost: Fields,
}

/// The cycle's final output.
///
/// Built exactly once by the result aggregator after all items are done
/// or the cycle halted. A completed cycle always yields a payload, even
/// when every item failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payload {
    /// Records in original dataset order.
    pub results: Vec<Record>,
    /// Failures, in completion order.
    pub failures: Vec<Failure>,
    /// Named aggregate values from aggregation plugins.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub aggregates: Fields,
    /// Cost summary from the usage-accounting collaborator.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub cost: Fields,
    /// Run metadata.
    pub metadata: CycleMetadata,
}

impl Payload {
    /// Returns true if the cycle halted early.
    #[must_use]
    pub fn halted(&self) -> bool {
        self.metadata.halt.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Item;

    fn metadata() -> CycleMetadata {
        CycleMetadata {
            run_id: "run-1".to_string(),
            started_at: "2026-01-01T00:00:00Z".to_string(),
            finished_at: "2026-01-01T00:00:05Z".to_string(),
            total_items: 2,
            skipped: 0,
            processed: 2,
            succeeded: 2,
            failed: 0,
            retry: None,
            halt: None,
            security: None,
            aggregates: Fields::new(),
            cost: Fields::new(),
        }
    }

    #[test]
    fn test_payload_halted() {
        let mut meta = metadata();
        let payload = Payload {
            results: vec![Record::new(Item::default(), "ok")],
            failures: Vec::new(),
            aggregates: Fields::new(),
            cost: Fields::new(),
            metadata: meta.clone(),
        };
        assert!(!payload.halted());

        meta.halt = Some(HaltReason::new("limit", Fields::new(), 1));
        let payload = Payload {
            metadata: meta,
            ..payload
        };
        assert!(payload.halted());
    }

    #[test]
    fn test_metadata_serde_skips_absent() {
        let json = serde_json::to_value(metadata()).unwrap();
        assert!(json.get("retry").is_none());
        assert!(json.get("halt").is_none());
        assert!(json.get("security").is_none());
    }
}
