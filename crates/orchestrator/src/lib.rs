//! Workflow engine of the discovery pipeline.
//!
//! A session moves through clarification, description, search and report.
//! [`DiscoveryOrchestrator`] drives it, [`PipelineStateMachine`] decides the
//! next step and the [`stages`] call out to [`Collaborator`]s for content.

pub mod checkpoint;
pub mod collaborator;
pub mod config;
pub mod core;
pub mod error;
pub mod executor;
pub mod resources;
pub mod stages;
pub mod state_machine;

pub use checkpoint::{
    CheckpointStore, CheckpointToken, FileCheckpointStore, MemoryCheckpointStore,
    NoopCheckpointStore,
};
pub use collaborator::{
    ClarificationInput, Collaborator, Collaborators, DescriptionInput, ReportInput,
    ScriptedCollaborator, ScriptedOutcome, SearchInput,
};
pub use config::{ConfidenceThresholds, OrchestratorConfig};
pub use error::{CollaboratorError, CollaboratorResult, OrchestratorError, Result};
pub use executor::{DiscoveryOrchestrator, PipelineResult, StageSummary, WorkflowSummary};
pub use state_machine::{PipelineStateMachine, Route, Termination};
