//! Error types for the batchflow engine.
//!
//! Per-item problems (rendering, decision-step failure, plugin errors) are
//! captured as [`crate::core::Failure`] values and never abort a cycle.
//! Only structural problems in the output pipeline (dependency cycles,
//! security violations) surface as fatal errors.

use crate::core::RetryHistory;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The main error type for batchflow operations.
#[derive(Debug, Error)]
pub enum BatchflowError {
    /// A request template failed to compile.
    #[error("Template compilation failed: {0}")]
    Template(String),

    /// The decision step failed after exhausting retries.
    #[error("{0}")]
    Action(#[from] ActionError),

    /// A plugin raised an error.
    #[error("{0}")]
    Plugin(#[from] PluginError),

    /// A cycle was detected in the handler dependency graph.
    #[error("{0}")]
    CycleDetected(#[from] CycleDetectedError),

    /// A handler would receive an artifact above its permitted classification.
    #[error("{0}")]
    SecurityViolation(#[from] SecurityViolationError),

    /// An artifact request could not be resolved against the store.
    #[error("Unresolved artifact request: '{0}'")]
    UnresolvedArtifact(String),

    /// An artifact with the same id or alias was already registered.
    #[error("Duplicate artifact registration: '{0}'")]
    DuplicateArtifact(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Classifies the terminal cause of a per-item [`crate::core::Failure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The request template could not be rendered for the item.
    Rendering,
    /// The decision step failed after retry exhaustion.
    Action,
    /// A transform or other plugin raised while handling the item.
    Plugin,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rendering => write!(f, "rendering"),
            Self::Action => write!(f, "action"),
            Self::Plugin => write!(f, "plugin"),
        }
    }
}

/// Error raised when the decision step fails on every permitted attempt.
///
/// Carries the accumulated [`RetryHistory`] so the caller can record it on
/// the resulting failure.
#[derive(Debug, Error)]
#[error("Action failed after {attempts} attempt(s): {message}")]
pub struct ActionError {
    /// The last attempt's error message.
    pub message: String,
    /// Total attempts made.
    pub attempts: usize,
    /// Every failed attempt, in order.
    pub history: RetryHistory,
}

impl ActionError {
    /// Creates a new action error.
    #[must_use]
    pub fn new(message: impl Into<String>, attempts: usize, history: RetryHistory) -> Self {
        Self {
            message: message.into(),
            attempts,
            history,
        }
    }
}

/// Error raised by a single decision-step attempt.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct DecisionError {
    /// What went wrong.
    pub message: String,
}

impl DecisionError {
    /// Creates a new decision error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Error raised when a request template cannot be compiled or rendered.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct RenderError(pub String);

impl RenderError {
    /// Creates a new render error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Error raised by a transform, aggregation, halt-condition or output plugin.
#[derive(Debug, Clone, Error)]
#[error("Plugin '{plugin}' failed: {message}")]
pub struct PluginError {
    /// The plugin that raised.
    pub plugin: String,
    /// What went wrong.
    pub message: String,
}

impl PluginError {
    /// Creates a new plugin error.
    #[must_use]
    pub fn new(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
            message: message.into(),
        }
    }
}

/// Error raised when the handler dependency graph contains a cycle.
///
/// Raised before any handler executes, since partial execution with
/// unresolved dependencies is unsafe.
#[derive(Debug, Clone, Error)]
#[error("Cycle detected in handler graph: {}", cycle_path.join(" -> "))]
pub struct CycleDetectedError {
    /// The path of handlers forming the cycle.
    pub cycle_path: Vec<String>,
}

impl CycleDetectedError {
    /// Creates a new cycle detected error.
    #[must_use]
    pub fn new(cycle_path: Vec<String>) -> Self {
        Self { cycle_path }
    }
}

/// Error raised when a handler would receive an artifact classified above
/// its clearance.
#[derive(Debug, Clone, Error)]
#[error(
    "Handler '{handler}' (clearance {clearance}) may not receive artifact '{artifact}' (classified {classification})"
)]
pub struct SecurityViolationError {
    /// The consuming handler.
    pub handler: String,
    /// The handler's permitted classification.
    pub clearance: crate::core::SecurityLevel,
    /// The offending artifact id.
    pub artifact: String,
    /// The artifact's classification.
    pub classification: crate::core::SecurityLevel,
}

impl SecurityViolationError {
    /// Creates a new security violation error.
    #[must_use]
    pub fn new(
        handler: impl Into<String>,
        clearance: crate::core::SecurityLevel,
        artifact: impl Into<String>,
        classification: crate::core::SecurityLevel,
    ) -> Self {
        Self {
            handler: handler.into(),
            clearance,
            artifact: artifact.into(),
            classification,
        }
    }
}
