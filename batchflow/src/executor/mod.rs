//! Retrying action executor around the external decision step.
//!
//! This module provides:
//! - Bounded retries with exponential backoff
//! - Per-attempt retry history, carried on success and on exhaustion
//! - Admission-control acquisition before each attempt
//! - Usage accounting after each successful attempt
//! - A middleware seam applied around the decision call

mod middleware;
mod retry;

pub use middleware::MiddlewareChain;
pub use retry::RetryConfig;

use crate::core::{ErrorKind, RetryHistory};
use crate::errors::ActionError;
use crate::plugins::{
    ActionRequest, AdmissionControl, DecisionClient, DecisionResponse, UsageTracker,
};
use std::sync::Arc;

/// The outcome of a successful action execution.
#[derive(Debug, Clone)]
pub struct ActionOutcome {
    /// The (possibly middleware-transformed) response.
    pub response: DecisionResponse,
    /// History of the attempts it took; trivial when the first attempt won.
    pub history: RetryHistory,
}

/// Invokes the decision step with bounded retries and backoff.
pub struct ActionExecutor {
    client: Arc<dyn DecisionClient>,
    retry: RetryConfig,
    middleware: MiddlewareChain,
    admission: Option<Arc<dyn AdmissionControl>>,
    usage: Option<Arc<dyn UsageTracker>>,
}

impl ActionExecutor {
    /// Creates an executor with no middleware, admission control or
    /// usage accounting.
    #[must_use]
    pub fn new(client: Arc<dyn DecisionClient>, retry: RetryConfig) -> Self {
        Self {
            client,
            retry,
            middleware: MiddlewareChain::new(),
            admission: None,
            usage: None,
        }
    }

    /// Sets the middleware chain.
    #[must_use]
    pub fn with_middleware(mut self, middleware: MiddlewareChain) -> Self {
        self.middleware = middleware;
        self
    }

    /// Sets the admission-control collaborator.
    #[must_use]
    pub fn with_admission(mut self, admission: Arc<dyn AdmissionControl>) -> Self {
        self.admission = Some(admission);
        self
    }

    /// Sets the usage-accounting collaborator.
    #[must_use]
    pub fn with_usage(mut self, usage: Arc<dyn UsageTracker>) -> Self {
        self.usage = Some(usage);
        self
    }

    /// The retry configuration in effect.
    #[must_use]
    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Executes the action, retrying with backoff until success or
    /// exhaustion.
    ///
    /// Every failed attempt is recorded; on success the history is attached
    /// to the outcome, on exhaustion it travels with the returned
    /// [`ActionError`] so the caller can record it on the failure.
    pub async fn execute(&self, request: ActionRequest) -> Result<ActionOutcome, ActionError> {
        let mut history = RetryHistory::new();
        let mut last_error = String::new();
        let estimated_units = request.estimated_units();

        for attempt in 1..=self.retry.max_attempts {
            if let Some(admission) = &self.admission {
                admission.acquire(estimated_units).await;
            }

            let outgoing = self.middleware.apply_before(request.clone()).await;
            match self.client.generate(&outgoing).await {
                Ok(response) => {
                    let response = self.middleware.apply_after(response).await;
                    if let (Some(usage), Some(tracker)) = (response.usage, &self.usage) {
                        tracker.track(usage.prompt_units, usage.completion_units);
                    }
                    history.succeed(attempt);
                    return Ok(ActionOutcome { response, history });
                }
                Err(error) => {
                    last_error = error.to_string();
                    history.record(attempt, &last_error, ErrorKind::Action);

                    if attempt < self.retry.max_attempts {
                        let delay = self.retry.delay_for(attempt);
                        tracing::debug!(
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %last_error,
                            "Retrying action after error"
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Err(ActionError::new(
            last_error,
            self.retry.max_attempts,
            history,
        ))
    }
}

impl std::fmt::Debug for ActionExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionExecutor")
            .field("retry", &self.retry)
            .field("middleware", &self.middleware)
            .field("admission", &self.admission.is_some())
            .field("usage", &self.usage.is_some())
            .finish()
    }
}
