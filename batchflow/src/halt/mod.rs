//! Early-stop coordination.
//!
//! Evaluates registered halt conditions against completed records and,
//! once one trips, prevents new work from starting. The coordinator is
//! safe for concurrent use from many workers: evaluation is serialized
//! by a mutex while the tripped flag stays pollable lock-free.

mod signal;

pub use signal::HaltSignal;

use crate::core::{Fields, HaltReason, Record};
use crate::plugins::HaltCondition;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Evaluates halt conditions and manages the shared halt signal.
///
/// State machine: *armed* (conditions present, not yet tripped) →
/// *tripped* (terminal), or *disarmed* when no conditions are configured.
pub struct EarlyStopCoordinator {
    conditions: Vec<Arc<dyn HaltCondition>>,
    signal: Arc<HaltSignal>,
    eval: Mutex<()>,
}

impl EarlyStopCoordinator {
    /// Creates a coordinator over the given conditions.
    ///
    /// With no conditions the coordinator is disarmed and never trips.
    #[must_use]
    pub fn new(conditions: Vec<Arc<dyn HaltCondition>>) -> Self {
        Self {
            conditions,
            signal: HaltSignal::new(),
            eval: Mutex::new(()),
        }
    }

    /// The shared signal, pollable by workers without evaluation cost.
    #[must_use]
    pub fn signal(&self) -> Arc<HaltSignal> {
        self.signal.clone()
    }

    /// Returns true once a condition has tripped.
    #[must_use]
    pub fn is_tripped(&self) -> bool {
        self.signal.is_tripped()
    }

    /// The halt reason, once tripped.
    #[must_use]
    pub fn reason(&self) -> Option<HaltReason> {
        self.signal.reason()
    }

    /// Evaluates every condition, in registration order, against one
    /// completed record.
    ///
    /// No-op when disarmed or already tripped. The first condition to
    /// return a reason trips the coordinator and short-circuits the rest.
    /// A condition that errors is logged and skipped; it neither trips
    /// the coordinator nor crashes the cycle.
    pub fn check_record(&self, record: &Record, item_index: usize) {
        if self.conditions.is_empty() || self.signal.is_tripped() {
            return;
        }

        let _guard = self.eval.lock();
        if self.signal.is_tripped() {
            return;
        }

        for condition in &self.conditions {
            match condition.check(record, item_index) {
                Ok(Some(details)) => {
                    let reason = HaltReason::new(condition.name(), details, item_index);
                    if self.signal.trip(reason) {
                        tracing::info!(
                            plugin = condition.name(),
                            item_index,
                            "Halt condition tripped"
                        );
                    }
                    return;
                }
                Ok(None) => {}
                Err(error) => {
                    tracing::warn!(
                        plugin = condition.name(),
                        %error,
                        "Halt condition errored; skipping"
                    );
                }
            }
        }
    }

    /// Resets every condition for a new cycle.
    pub fn reset(&self) {
        for condition in &self.conditions {
            condition.reset();
        }
    }
}

impl std::fmt::Debug for EarlyStopCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EarlyStopCoordinator")
            .field("conditions", &self.conditions.len())
            .field("tripped", &self.is_tripped())
            .finish()
    }
}

/// Halt condition that trips once a fixed number of records completed.
#[derive(Debug)]
pub struct RecordLimitHalt {
    limit: usize,
    seen: AtomicUsize,
}

impl RecordLimitHalt {
    /// Creates a condition tripping after `limit` records.
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            seen: AtomicUsize::new(0),
        }
    }
}

impl HaltCondition for RecordLimitHalt {
    fn name(&self) -> &str {
        "record_limit"
    }

    fn check(
        &self,
        _record: &Record,
        _item_index: usize,
    ) -> Result<Option<Fields>, crate::errors::PluginError> {
        let seen = self.seen.fetch_add(1, Ordering::SeqCst) + 1;
        if seen >= self.limit {
            let mut details = Fields::new();
            details.insert("limit".to_string(), serde_json::json!(self.limit));
            details.insert("seen".to_string(), serde_json::json!(seen));
            return Ok(Some(details));
        }
        Ok(None)
    }

    fn reset(&self) {
        self.seen.store(0, Ordering::SeqCst);
    }
}
