//! Processing outcomes: records, failures and retry history.

use super::item::{Fields, Item};
use super::security::SecurityLevel;
use crate::errors::ErrorKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Successful processing outcome for one item.
///
/// Created by the item processor; never mutated after creation except to
/// carry the active security classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    /// The original input item.
    pub item: Item,

    /// Decision-step responses, keyed by criterion name.
    ///
    /// A single unnamed decision call is stored under `"default"`.
    pub responses: HashMap<String, String>,

    /// Derived metric fields from the response and transform plugins.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metrics: Fields,

    /// Retry history, present when the action needed more than one attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryHistory>,

    /// The cycle's active security classification, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security: Option<SecurityLevel>,
}

impl Record {
    /// Creates a record with a single default response.
    #[must_use]
    pub fn new(item: Item, content: impl Into<String>) -> Self {
        let mut responses = HashMap::new();
        responses.insert("default".to_string(), content.into());
        Self {
            item,
            responses,
            metrics: Fields::new(),
            retry: None,
            security: None,
        }
    }

    /// Returns the default response content, if present.
    #[must_use]
    pub fn default_response(&self) -> Option<&str> {
        self.responses.get("default").map(String::as_str)
    }

    /// Returns the number of attempts the action needed, defaulting to 1.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.retry.as_ref().map_or(1, |h| h.attempts)
    }
}

/// Terminal processing outcome for one item.
///
/// Exactly one of `Record` or `Failure` exists per processed item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Failure {
    /// The original input item.
    pub item: Item,

    /// The error message.
    pub error: String,

    /// What kind of error terminated the item.
    pub kind: ErrorKind,

    /// Retry history, present when the action was attempted at all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryHistory>,
}

impl Failure {
    /// Creates a new failure.
    #[must_use]
    pub fn new(item: Item, error: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            item,
            error: error.into(),
            kind,
            retry: None,
        }
    }

    /// Attaches retry history.
    #[must_use]
    pub fn with_retry(mut self, history: RetryHistory) -> Self {
        self.retry = Some(history);
        self
    }
}

/// One failed attempt within a retry sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryAttempt {
    /// 1-based attempt number.
    pub attempt: usize,
    /// The attempt's error message.
    pub error: String,
    /// The attempt's error kind.
    pub kind: ErrorKind,
}

/// Ordered history of attempts for one item's action execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetryHistory {
    /// Total attempts made, including the final one.
    pub attempts: usize,
    /// Every failed attempt, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<RetryAttempt>,
}

impl RetryHistory {
    /// Creates an empty history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a failed attempt.
    pub fn record(&mut self, attempt: usize, error: impl Into<String>, kind: ErrorKind) {
        self.attempts = self.attempts.max(attempt);
        self.errors.push(RetryAttempt {
            attempt,
            error: error.into(),
            kind,
        });
    }

    /// Marks the given attempt as the successful final one.
    pub fn succeed(&mut self, attempt: usize) {
        self.attempts = self.attempts.max(attempt);
    }

    /// Returns true if no retry was needed.
    #[must_use]
    pub fn is_trivial(&self) -> bool {
        self.attempts <= 1 && self.errors.is_empty()
    }

    /// Number of retries, i.e. attempts beyond the first.
    #[must_use]
    pub fn retries(&self) -> usize {
        self.attempts.saturating_sub(1)
    }

    /// Merges another history into this one, accumulating attempts.
    pub fn merge(&mut self, other: Self) {
        self.attempts += other.attempts;
        self.errors.extend(other.errors);
    }
}
