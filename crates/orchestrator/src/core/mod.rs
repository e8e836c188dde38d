//! Core abstractions shared by the pipeline stages and the router.
//!
//! - [`Stage`] - Trait every pipeline stage implements
//! - [`OrderedEventEmitter`] - Event emitter with sequence guarantees
//! - the `stage` helpers used inside `Stage::execute`

mod events;
pub mod stage;

pub use events::OrderedEventEmitter;
pub use stage::Stage;
