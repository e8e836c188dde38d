//! RAII guards for run lifecycle management.
//!
//! - [`RunGuard`] - Announces runs dropped before termination

mod run_guard;

pub use run_guard::RunGuard;
