//! Domain model for the discovery pipeline.
//!
//! Holds the per-request [`SessionState`], the closed set of pipeline
//! stages, their status lifecycle and the structured outputs each stage
//! produces.

pub mod domain;
pub mod error;

pub use domain::*;
pub use error::CoreError;
