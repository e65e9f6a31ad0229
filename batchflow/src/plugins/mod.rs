//! Collaborator contracts consumed by the engine.
//!
//! Every external plugin family is modeled as an explicit trait; the core
//! depends only on these interfaces. Concrete loaders, model backends,
//! template renderers, output writers, rate limiters and cost policies
//! live outside this crate.

mod registry;

pub use registry::PluginRegistry;

use crate::core::{
    ArtifactDescriptor, Fields, Item, Payload, Record, SecurityLevel,
};
use crate::errors::{DecisionError, PluginError, RenderError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// A rendered decision-step request for one item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRequest {
    /// Optional system prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    /// The user prompt.
    pub user: String,
    /// Request metadata (criterion name, item index, identifiers).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: Fields,
}

impl ActionRequest {
    /// Creates a request with only a user prompt.
    #[must_use]
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            system: None,
            user: user.into(),
            metadata: Fields::new(),
        }
    }

    /// Sets the system prompt.
    #[must_use]
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Rough unit estimate for admission control, derived from prompt size.
    #[must_use]
    pub fn estimated_units(&self) -> u64 {
        let chars = self.user.len() + self.system.as_deref().map_or(0, str::len);
        (chars as u64 / 4).max(1)
    }
}

/// Consumed units reported by the decision backend.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    /// Units consumed by the prompt.
    pub prompt_units: u64,
    /// Units consumed by the completion.
    pub completion_units: u64,
}

/// One decision-step response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionResponse {
    /// The response content.
    pub content: String,
    /// Consumed units, when the backend reports them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    /// Metric fields contributed by the backend.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metrics: Fields,
}

impl DecisionResponse {
    /// Creates a response with only content.
    #[must_use]
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            usage: None,
            metrics: Fields::new(),
        }
    }

    /// Attaches usage figures.
    #[must_use]
    pub fn with_usage(mut self, prompt_units: u64, completion_units: u64) -> Self {
        self.usage = Some(Usage {
            prompt_units,
            completion_units,
        });
        self
    }

    /// Adds a metric field.
    #[must_use]
    pub fn with_metric(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metrics.insert(key.into(), value);
        self
    }
}

/// The external decision step (typically a language-model backend).
#[async_trait]
pub trait DecisionClient: Send + Sync {
    /// Issues one decision call. May fail; retries are the executor's job.
    async fn generate(&self, request: &ActionRequest) -> Result<DecisionResponse, DecisionError>;
}

/// A source of input items.
#[async_trait]
pub trait InputSource: Send + Sync {
    /// Loads the full dataset.
    async fn load(&self) -> Result<Vec<Item>, PluginError>;
}

/// A request template compiled once per cycle.
pub trait CompiledTemplate: Send + Sync {
    /// Renders the request for one item.
    fn render(&self, item: &Item) -> Result<ActionRequest, RenderError>;
}

/// Factory for compiled templates.
///
/// Compilation happens once at cycle start; compile failures are fatal,
/// render failures fail only the affected item.
pub trait TemplateEngine: Send + Sync {
    /// Compiles the template.
    fn compile(&self) -> Result<Arc<dyn CompiledTemplate>, RenderError>;
}

/// An output handler in the delivery pipeline.
#[async_trait]
pub trait OutputHandler: Send + Sync {
    /// The handler's unique name.
    fn name(&self) -> &str;

    /// The most permissive classification this handler may receive.
    fn clearance(&self) -> SecurityLevel {
        SecurityLevel::Public
    }

    /// Artifacts this handler declares it will produce.
    fn produces(&self) -> Vec<ArtifactDescriptor> {
        Vec::new()
    }

    /// Consumption tokens this handler resolves before finalizing.
    fn consumes(&self) -> Vec<String> {
        Vec::new()
    }

    /// Writes the payload to the handler's destination.
    async fn write(&self, payload: &Payload) -> Result<(), PluginError>;

    /// Receives the resolved consumed artifacts after `write`.
    async fn finalize(&self, _artifacts: &[crate::core::Artifact]) -> Result<(), PluginError> {
        Ok(())
    }
}

/// Derives additional metric fields from an item and its responses.
pub trait TransformPlugin: Send + Sync {
    /// The plugin's name, used in logs and failure messages.
    fn name(&self) -> &str;

    /// Produces derived fields, merged into the record's metrics.
    fn transform(
        &self,
        item: &Item,
        responses: &HashMap<String, String>,
    ) -> Result<Fields, PluginError>;
}

/// Computes named aggregate values over the full, ordered result list.
pub trait AggregationPlugin: Send + Sync {
    /// The plugin's name; its output is stored under this key.
    fn name(&self) -> &str;

    /// Produces aggregate fields for the payload.
    fn aggregate(&self, records: &[Record]) -> Result<Fields, PluginError>;
}

/// A pluggable rule that can stop a cycle early.
pub trait HaltCondition: Send + Sync {
    /// The condition's name, recorded in the halt reason.
    fn name(&self) -> &str;

    /// Evaluates one completed record. A non-`None` return trips the cycle.
    fn check(&self, record: &Record, item_index: usize) -> Result<Option<Fields>, PluginError>;

    /// Resets internal state for a new cycle.
    fn reset(&self) {}
}

/// Admission control consulted before each decision attempt.
///
/// `acquire` resolves once the caller may proceed; it may block a worker
/// for as long as the rate policy requires.
#[async_trait]
pub trait AdmissionControl: Send + Sync {
    /// Blocks until the caller is admitted.
    async fn acquire(&self, estimated_units: u64);
}

/// Usage accounting fed after each successful decision attempt.
pub trait UsageTracker: Send + Sync {
    /// Records consumed units.
    fn track(&self, prompt_units: u64, completion_units: u64);

    /// Summarizes accumulated cost for the payload.
    fn summary(&self) -> Fields;
}

/// Request/response transform applied around the decision call.
///
/// `before` hooks run in registration order, `after` hooks in reverse.
#[async_trait]
pub trait ActionMiddleware: Send + Sync {
    /// Transforms the outgoing request.
    async fn before(&self, request: ActionRequest) -> ActionRequest {
        request
    }

    /// Transforms the incoming response.
    async fn after(&self, response: DecisionResponse) -> DecisionResponse {
        response
    }
}
