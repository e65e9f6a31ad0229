//! Mock collaborators for tests.

use crate::core::{Artifact, ArtifactDescriptor, Item, Payload, SecurityLevel};
use crate::errors::{DecisionError, PluginError, RenderError};
use crate::plugins::{
    ActionRequest, AdmissionControl, CompiledTemplate, DecisionClient, DecisionResponse,
    OutputHandler, TemplateEngine, UsageTracker,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// A decision client that replays a script of responses.
///
/// Once the script is exhausted the fallback (if any) repeats forever.
pub struct ScriptedClient {
    script: Mutex<VecDeque<Result<DecisionResponse, DecisionError>>>,
    fallback: Option<Result<DecisionResponse, DecisionError>>,
    calls: AtomicUsize,
    requests: Mutex<Vec<ActionRequest>>,
}

impl ScriptedClient {
    /// Creates a client that replays the given script, then errors.
    #[must_use]
    pub fn new(script: Vec<Result<DecisionResponse, DecisionError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: None,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Creates a client that always succeeds with the given content.
    #[must_use]
    pub fn always_ok(content: impl Into<String>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Some(Ok(DecisionResponse::new(content.into()))),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Creates a client that always fails with the given message.
    #[must_use]
    pub fn always_err(message: impl Into<String>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Some(Err(DecisionError::new(message.into()))),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Number of calls made.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The requests received, in call order.
    #[must_use]
    pub fn requests(&self) -> Vec<ActionRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl DecisionClient for ScriptedClient {
    async fn generate(&self, request: &ActionRequest) -> Result<DecisionResponse, DecisionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());

        if let Some(step) = self.script.lock().pop_front() {
            return step;
        }
        match &self.fallback {
            Some(step) => step.clone(),
            None => Err(DecisionError::new("script exhausted")),
        }
    }
}

/// A template whose user prompt is a single item field.
///
/// Rendering fails for items missing the field, which makes this handy
/// for exercising rendering failures.
pub struct FieldTemplate {
    field: String,
    system: Option<String>,
}

impl FieldTemplate {
    /// Creates a template reading the given field.
    #[must_use]
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            system: None,
        }
    }

    /// Sets a fixed system prompt.
    #[must_use]
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

struct CompiledFieldTemplate {
    field: String,
    system: Option<String>,
}

impl CompiledTemplate for CompiledFieldTemplate {
    fn render(&self, item: &Item) -> Result<ActionRequest, RenderError> {
        let value = item
            .get(&self.field)
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| RenderError::new(format!("missing field '{}'", self.field)))?;

        let mut request = ActionRequest::new(value);
        if let Some(system) = &self.system {
            request = request.with_system(system.clone());
        }
        Ok(request)
    }
}

impl TemplateEngine for FieldTemplate {
    fn compile(&self) -> Result<Arc<dyn CompiledTemplate>, RenderError> {
        Ok(Arc::new(CompiledFieldTemplate {
            field: self.field.clone(),
            system: self.system.clone(),
        }))
    }
}

/// Admission control that counts acquisitions and never blocks.
#[derive(Debug, Default)]
pub struct CountingAdmission {
    acquisitions: AtomicUsize,
    units: AtomicU64,
}

impl CountingAdmission {
    /// Creates a new counting admission controller.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of acquisitions granted.
    #[must_use]
    pub fn acquisitions(&self) -> usize {
        self.acquisitions.load(Ordering::SeqCst)
    }

    /// Sum of estimated units requested.
    #[must_use]
    pub fn units(&self) -> u64 {
        self.units.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AdmissionControl for CountingAdmission {
    async fn acquire(&self, estimated_units: u64) {
        self.acquisitions.fetch_add(1, Ordering::SeqCst);
        self.units.fetch_add(estimated_units, Ordering::SeqCst);
    }
}

/// In-memory usage tracker.
#[derive(Debug, Default)]
pub struct MemoryUsageTracker {
    prompt: AtomicU64,
    completion: AtomicU64,
}

impl MemoryUsageTracker {
    /// Creates a new tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulated prompt units.
    #[must_use]
    pub fn prompt_units(&self) -> u64 {
        self.prompt.load(Ordering::SeqCst)
    }

    /// Accumulated completion units.
    #[must_use]
    pub fn completion_units(&self) -> u64 {
        self.completion.load(Ordering::SeqCst)
    }
}

impl UsageTracker for MemoryUsageTracker {
    fn track(&self, prompt_units: u64, completion_units: u64) {
        self.prompt.fetch_add(prompt_units, Ordering::SeqCst);
        self.completion.fetch_add(completion_units, Ordering::SeqCst);
    }

    fn summary(&self) -> crate::core::Fields {
        let prompt = self.prompt.load(Ordering::SeqCst);
        let completion = self.completion.load(Ordering::SeqCst);
        let mut fields = crate::core::Fields::new();
        fields.insert("prompt_units".to_string(), serde_json::json!(prompt));
        fields.insert("completion_units".to_string(), serde_json::json!(completion));
        fields.insert("total_units".to_string(), serde_json::json!(prompt + completion));
        fields
    }
}

/// An output handler that records its lifecycle for assertions.
pub struct RecordingHandler {
    name: String,
    clearance: SecurityLevel,
    produces: Vec<ArtifactDescriptor>,
    consumes: Vec<String>,
    fail_write: bool,
    write_log: Option<Arc<Mutex<Vec<String>>>>,
    writes: AtomicUsize,
    finalized: Mutex<Vec<Artifact>>,
}

impl RecordingHandler {
    /// Creates a handler with no declared artifacts.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            clearance: SecurityLevel::Public,
            produces: Vec::new(),
            consumes: Vec::new(),
            fail_write: false,
            write_log: None,
            writes: AtomicUsize::new(0),
            finalized: Mutex::new(Vec::new()),
        }
    }

    /// Sets the handler's clearance.
    #[must_use]
    pub fn with_clearance(mut self, clearance: SecurityLevel) -> Self {
        self.clearance = clearance;
        self
    }

    /// Declares a produced artifact.
    #[must_use]
    pub fn producing(mut self, descriptor: ArtifactDescriptor) -> Self {
        self.produces.push(descriptor);
        self
    }

    /// Declares a consumption token.
    #[must_use]
    pub fn consuming(mut self, token: impl Into<String>) -> Self {
        self.consumes.push(token.into());
        self
    }

    /// Makes `write` fail.
    #[must_use]
    pub fn failing_write(mut self) -> Self {
        self.fail_write = true;
        self
    }

    /// Shares a cross-handler log of write order.
    #[must_use]
    pub fn with_write_log(mut self, log: Arc<Mutex<Vec<String>>>) -> Self {
        self.write_log = Some(log);
        self
    }

    /// Number of completed writes.
    #[must_use]
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// The artifacts passed to `finalize`.
    #[must_use]
    pub fn finalized(&self) -> Vec<Artifact> {
        self.finalized.lock().clone()
    }
}

#[async_trait]
impl OutputHandler for RecordingHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn clearance(&self) -> SecurityLevel {
        self.clearance
    }

    fn produces(&self) -> Vec<ArtifactDescriptor> {
        self.produces.clone()
    }

    fn consumes(&self) -> Vec<String> {
        self.consumes.clone()
    }

    async fn write(&self, _payload: &Payload) -> Result<(), PluginError> {
        if self.fail_write {
            return Err(PluginError::new(self.name.clone(), "write failed"));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        if let Some(log) = &self.write_log {
            log.lock().push(self.name.clone());
        }
        Ok(())
    }

    async fn finalize(&self, artifacts: &[Artifact]) -> Result<(), PluginError> {
        self.finalized.lock().extend(artifacts.iter().cloned());
        Ok(())
    }
}
