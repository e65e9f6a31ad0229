//! Collects per-item outcomes and restores original dataset order.

use crate::core::{Failure, Record, RetrySummary};
use crate::processor::ItemOutcome;
use parking_lot::Mutex;

/// Thread-safe collector for completed item outcomes.
///
/// Workers complete in arbitrary order; records are re-sorted by their
/// original dataset index when the aggregator is finished. Failures stay
/// in completion order.
#[derive(Debug, Default)]
pub struct ResultAggregator {
    records: Mutex<Vec<(usize, Record)>>,
    failures: Mutex<Vec<Failure>>,
}

impl ResultAggregator {
    /// Creates an empty aggregator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one completed outcome under its original dataset index.
    pub fn add(&self, index: usize, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Success(record) => self.records.lock().push((index, *record)),
            ItemOutcome::Failed(failure) => self.failures.lock().push(*failure),
        }
    }

    /// Number of records collected so far.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.records.lock().len()
    }

    /// Number of failures collected so far.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failures.lock().len()
    }

    /// Finishes collection, returning records in original dataset order
    /// and failures in completion order.
    #[must_use]
    pub fn finish(self) -> (Vec<Record>, Vec<Failure>) {
        let mut indexed = self.records.into_inner();
        indexed.sort_by_key(|(index, _)| *index);
        let records = indexed.into_iter().map(|(_, record)| record).collect();
        (records, self.failures.into_inner())
    }

    /// Summarizes retry activity, or `None` when no item carried history.
    #[must_use]
    pub fn retry_summary(records: &[Record], failures: &[Failure]) -> Option<RetrySummary> {
        let any_history = records.iter().any(|r| r.retry.is_some())
            || failures.iter().any(|f| f.retry.is_some());
        if !any_history {
            return None;
        }

        let mut summary = RetrySummary::default();
        for record in records {
            let attempts = record.attempts();
            summary.total_requests += attempts;
            summary.total_retries += attempts.saturating_sub(1);
        }
        for failure in failures {
            // rendering failures never issued a request and carry no history
            if let Some(history) = &failure.retry {
                summary.total_requests += history.attempts;
                summary.total_retries += history.retries();
                summary.exhausted += 1;
            }
        }
        Some(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ErrorKind, Item, RetryHistory};

    fn record(label: &str) -> Record {
        Record::new(Item::default(), label)
    }

    fn success(label: &str) -> ItemOutcome {
        ItemOutcome::Success(Box::new(record(label)))
    }

    #[test]
    fn test_records_restored_to_original_order() {
        let aggregator = ResultAggregator::new();
        aggregator.add(2, success("third"));
        aggregator.add(0, success("first"));
        aggregator.add(1, success("second"));

        let (records, failures) = aggregator.finish();
        assert!(failures.is_empty());
        let order: Vec<_> = records.iter().filter_map(Record::default_response).collect();
        assert_eq!(order, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_failures_keep_completion_order() {
        let aggregator = ResultAggregator::new();
        let failed = |msg: &str| {
            ItemOutcome::Failed(Box::new(Failure::new(
                Item::default(),
                msg,
                ErrorKind::Action,
            )))
        };
        aggregator.add(5, failed("late"));
        aggregator.add(1, failed("early"));

        let (_, failures) = aggregator.finish();
        assert_eq!(failures[0].error, "late");
        assert_eq!(failures[1].error, "early");
    }

    #[test]
    fn test_retry_summary_absent_without_history() {
        let records = vec![record("a"), record("b")];
        assert!(ResultAggregator::retry_summary(&records, &[]).is_none());
    }

    #[test]
    fn test_retry_summary_counts() {
        let mut retried = record("a");
        let mut history = RetryHistory::new();
        history.record(1, "timeout", ErrorKind::Action);
        history.succeed(2);
        retried.retry = Some(history);

        let mut exhausted_history = RetryHistory::new();
        exhausted_history.record(1, "down", ErrorKind::Action);
        exhausted_history.record(2, "down", ErrorKind::Action);
        let exhausted = Failure::new(Item::default(), "down", ErrorKind::Action)
            .with_retry(exhausted_history);

        let summary =
            ResultAggregator::retry_summary(&[retried, record("b")], &[exhausted]).unwrap();
        // 2 + 1 + 2 requests, 1 + 1 retries, one item gave up
        assert_eq!(summary.total_requests, 5);
        assert_eq!(summary.total_retries, 2);
        assert_eq!(summary.exhausted, 1);
    }
}
