//! Dependency-ordered output delivery.
//!
//! Handlers declare the artifacts they produce and consume; the pipeline
//! validates the resulting dependency graph before any handler writes,
//! then runs handlers in topological order. After each handler's write
//! its declared artifacts are registered, and its consumed artifacts are
//! resolved, clearance-checked and handed to `finalize`.

mod graph;
mod store;

pub use graph::{HandlerBinding, HandlerGraph};
pub use store::ArtifactStore;

use crate::core::{Artifact, Payload};
use crate::errors::{BatchflowError, SecurityViolationError};

/// Drives the output handlers over one payload.
#[derive(Debug, Default)]
pub struct OutputPipeline;

impl OutputPipeline {
    /// Creates a pipeline.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Runs every handler in dependency order and returns the registered
    /// artifacts.
    ///
    /// Graph validation failures (cycles, duplicate aliases, alias
    /// requests with no producer) reject the run before any handler
    /// writes. A handler write or finalize failure aborts the pipeline;
    /// earlier handlers' outputs are kept.
    pub async fn run(
        &self,
        payload: &Payload,
        bindings: &[HandlerBinding],
    ) -> Result<Vec<Artifact>, BatchflowError> {
        let graph = HandlerGraph::build(bindings)?;
        let store = ArtifactStore::new();

        for &index in graph.order() {
            let binding = &bindings[index];
            tracing::debug!(handler = binding.name(), "Running output handler");

            binding
                .handler()
                .write(payload)
                .await
                .map_err(BatchflowError::Plugin)?;

            for descriptor in binding.produces() {
                store.register(descriptor.clone().into_artifact(binding.name()))?;
            }

            if !binding.consumes().is_empty() {
                let resolved = Self::resolve_for(binding, &store)?;
                binding
                    .handler()
                    .finalize(&resolved)
                    .await
                    .map_err(BatchflowError::Plugin)?;
            }
        }

        tracing::info!(
            handlers = bindings.len(),
            artifacts = store.len(),
            "Output pipeline finished"
        );
        Ok(store.all())
    }

    fn resolve_for(
        binding: &HandlerBinding,
        store: &ArtifactStore,
    ) -> Result<Vec<Artifact>, BatchflowError> {
        let clearance = binding.clearance();
        let mut resolved = Vec::new();
        for request in binding.consumes() {
            for artifact in store.resolve(request)? {
                if !clearance.permits(artifact.security) {
                    return Err(SecurityViolationError::new(
                        binding.name(),
                        clearance,
                        artifact.id,
                        artifact.security,
                    )
                    .into());
                }
                resolved.push(artifact);
            }
        }
        Ok(resolved)
    }
}
