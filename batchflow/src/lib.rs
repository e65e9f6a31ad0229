//! # Batchflow
//!
//! A checkpointed batch execution engine for external decision steps
//! (typically language-model calls) with dependency-ordered output delivery.
//!
//! Batchflow runs a dataset of rows through a fallible decision step and
//! hands the collected results to output handlers, with support for:
//!
//! - **Checkpointed cycles**: completed items are persisted so an interrupted
//!   run can resume without reprocessing
//! - **Bounded retries**: exponential backoff around the decision call, with
//!   per-item retry history on both success and exhaustion
//! - **Early stopping**: pluggable halt conditions evaluated against
//!   completed results, safe under concurrent workers
//! - **Deterministic output**: results are re-sorted into original dataset
//!   order regardless of completion order
//! - **Artifact delivery**: output handlers declare produced and consumed
//!   artifacts; the pipeline resolves them in topological order, rejecting
//!   cycles before any handler runs
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use batchflow::prelude::*;
//!
//! let registry = Arc::new(PluginRegistry::new());
//! let coordinator = CycleCoordinator::new(client, registry, CycleConfig::default())
//!     .with_template("default", template_engine)
//!     .with_checkpoint(checkpoint);
//!
//! let payload = coordinator.run(dataset).await?;
//! OutputPipeline::new().run(&payload, &bindings).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod checkpoint;
pub mod core;
pub mod cycle;
pub mod errors;
pub mod executor;
pub mod halt;
pub mod observability;
pub mod pipeline;
pub mod plugins;
pub mod processor;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::checkpoint::CheckpointStore;
    pub use crate::core::{
        Artifact, ArtifactDescriptor, ArtifactRequest, CycleMetadata, ErrorKind,
        Failure, Fields, HaltReason, Item, Payload, Record, RetryHistory,
        RetrySummary, SecurityLevel,
    };
    pub use crate::cycle::{CycleConfig, CycleCoordinator, ResultAggregator};
    pub use crate::errors::{
        ActionError, BatchflowError, CycleDetectedError, DecisionError,
        PluginError, RenderError, SecurityViolationError,
    };
    pub use crate::executor::{ActionExecutor, MiddlewareChain, RetryConfig};
    pub use crate::halt::{EarlyStopCoordinator, HaltSignal, RecordLimitHalt};
    pub use crate::observability::init_tracing;
    pub use crate::pipeline::{
        ArtifactStore, HandlerBinding, HandlerGraph, OutputPipeline,
    };
    pub use crate::plugins::{
        ActionMiddleware, ActionRequest, AdmissionControl, AggregationPlugin,
        CompiledTemplate, DecisionClient, DecisionResponse, HaltCondition,
        InputSource, OutputHandler, PluginRegistry, TemplateEngine,
        TransformPlugin, Usage, UsageTracker,
    };
    pub use crate::processor::{Criterion, ItemOutcome, ItemProcessor};
    pub use crate::utils::{generate_uuid, iso_timestamp, RunIdentity};
}
