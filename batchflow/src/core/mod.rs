//! Core data model for cycles.
//!
//! This module provides:
//! - Input items and their identifier extraction
//! - Records, failures and retry history
//! - The final cycle payload with metadata
//! - Artifacts, artifact descriptors and consumption requests
//! - Security classification levels

mod artifact;
mod item;
mod payload;
mod record;
mod security;

pub use artifact::{Artifact, ArtifactDescriptor, ArtifactRequest};
pub use item::{Fields, Item};
pub use payload::{CycleMetadata, HaltReason, Payload, RetrySummary};
pub use record::{Failure, Record, RetryAttempt, RetryHistory};
pub use security::SecurityLevel;

pub use crate::errors::ErrorKind;
