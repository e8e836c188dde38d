//! Event system for the discovery pipeline
//!
//! This crate provides the event bus and event types used to observe
//! sessions as they move through the pipeline.

mod bus;
mod types;

pub use bus::EventBus;
pub use types::*;
