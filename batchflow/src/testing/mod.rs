//! Test support utilities.
//!
//! Mock collaborators for exercising the engine without real model
//! backends, templates or output destinations.

pub mod mocks;
