use chrono::{DateTime, Utc};
use discovery_core::{SessionState, StageKind, StageOutputs, StageStatus};
use events::{Event, EventBus};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::checkpoint::{CheckpointStore, CheckpointToken, NoopCheckpointStore};
use crate::collaborator::Collaborators;
use crate::config::OrchestratorConfig;
use crate::core::{OrderedEventEmitter, Stage};
use crate::error::{OrchestratorError, Result};
use crate::resources::RunGuard;
use crate::stages::Stages;
use crate::state_machine::{PipelineStateMachine, Route, Termination};

const WORKFLOW_END: &str = "workflow_end";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageSummary {
    pub stage: StageKind,
    pub status: StageStatus,
}

/// Read-only progress snapshot of a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowSummary {
    pub session_id: Uuid,
    pub subject: String,
    pub locale: String,
    pub stages: Vec<StageSummary>,
    pub completed_stages: usize,
    pub total_stages: usize,
    pub progress_percentage: f64,
    pub next_stage: Option<StageKind>,
    pub is_complete: bool,
    pub has_failed: bool,
    pub retry_count: u32,
    pub max_retries: u32,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: i64,
}

impl WorkflowSummary {
    pub fn from_state(state: &SessionState) -> Self {
        let total_stages = StageKind::ALL.len();
        let completed_stages = state.completed_count();
        Self {
            session_id: state.id(),
            subject: state.subject().to_string(),
            locale: state.locale().to_string(),
            stages: state
                .statuses()
                .into_iter()
                .map(|(stage, status)| StageSummary { stage, status })
                .collect(),
            completed_stages,
            total_stages,
            progress_percentage: completed_stages as f64 / total_stages as f64 * 100.0,
            next_stage: state.next_stage,
            is_complete: state.is_complete(),
            has_failed: state.has_failed(),
            retry_count: state.retry_count(),
            max_retries: state.max_retries(),
            errors: state.errors().to_vec(),
            warnings: state.warnings().to_vec(),
            started_at: state.started_at(),
            elapsed_ms: state.elapsed().num_milliseconds(),
        }
    }
}

/// Outcome of a pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub success: bool,
    pub session_id: Uuid,
    pub termination: Termination,
    pub outputs: StageOutputs,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub retry_count: u32,
    pub elapsed: Duration,
    pub checkpoint: Option<CheckpointToken>,
    pub summary: WorkflowSummary,
}

impl PipelineResult {
    fn from_state(
        state: &SessionState,
        termination: Termination,
        checkpoint: Option<CheckpointToken>,
    ) -> Self {
        Self {
            success: termination.is_success(),
            session_id: state.id(),
            termination,
            outputs: state.outputs.clone(),
            errors: state.errors().to_vec(),
            warnings: state.warnings().to_vec(),
            retry_count: state.retry_count(),
            elapsed: state.elapsed().to_std().unwrap_or_default(),
            checkpoint,
            summary: WorkflowSummary::from_state(state),
        }
    }
}

/// Entry point of the engine: creates sessions and drives them to a
/// terminal state.
pub struct DiscoveryOrchestrator {
    config: OrchestratorConfig,
    stages: Stages,
    emitter: Option<OrderedEventEmitter>,
    checkpoints: Arc<dyn CheckpointStore>,
}

impl DiscoveryOrchestrator {
    pub fn new(config: OrchestratorConfig, collaborators: Collaborators) -> Self {
        let stages = Stages::new(&collaborators, &config);
        Self {
            config,
            stages,
            emitter: None,
            checkpoints: Arc::new(NoopCheckpointStore),
        }
    }

    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.emitter = Some(OrderedEventEmitter::new(bus));
        self
    }

    pub fn with_checkpoint_store(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.checkpoints = store;
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn create_session(
        &self,
        subject: impl Into<String>,
        locale: impl Into<String>,
        detail: Option<String>,
    ) -> SessionState {
        let state =
            SessionState::new(subject, locale, detail).with_max_retries(self.config.max_retries);
        info!(
            session_id = %state.id(),
            subject = %state.subject(),
            locale = %state.locale(),
            "Created discovery session"
        );
        self.emit(Event::SessionCreated {
            session_id: state.id(),
            subject: state.subject().to_string(),
            locale: state.locale().to_string(),
        });
        state
    }

    pub fn summarize(&self, state: &SessionState) -> WorkflowSummary {
        WorkflowSummary::from_state(state)
    }

    /// Drive the session to termination, blocking the calling thread.
    ///
    /// Must not be called from inside a tokio runtime; use
    /// [`run_async`](Self::run_async) there.
    pub fn run(&self, state: &mut SessionState) -> PipelineResult {
        if tokio::runtime::Handle::try_current().is_ok() {
            return self.refuse(
                state,
                "run() called from inside an async runtime, use run_async()".to_string(),
            );
        }

        match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime.block_on(self.run_async(state)),
            Err(e) => self.refuse(state, format!("failed to start runtime: {}", e)),
        }
    }

    pub async fn run_async(&self, state: &mut SessionState) -> PipelineResult {
        let session_id = state.id();
        info!(
            session_id = %session_id,
            completed = state.completed_count(),
            retry_count = state.retry_count(),
            "Starting pipeline run"
        );
        let mut guard = RunGuard::new(session_id, self.emitter.clone());

        let termination = match self.config.session_timeout() {
            Some(limit) => {
                let outcome = tokio::time::timeout(limit, self.drive(state)).await;
                match outcome {
                    Ok(termination) => termination,
                    Err(_) => self.timed_out(state, limit),
                }
            }
            None => self.drive(state).await,
        };

        state.stamp(WORKFLOW_END);
        let checkpoint = if self.config.enable_checkpoints {
            self.checkpoint(state).await
        } else {
            None
        };

        info!(
            session_id = %session_id,
            termination = %termination,
            retry_count = state.retry_count(),
            errors = state.errors().len(),
            warnings = state.warnings().len(),
            "Pipeline finished"
        );
        self.emit(Event::PipelineFinished {
            session_id,
            success: termination.is_success(),
            termination: termination.to_string(),
        });
        guard.finish();

        PipelineResult::from_state(state, termination, checkpoint)
    }

    /// Persist the session through the configured store.
    pub async fn save_checkpoint(&self, state: &SessionState) -> Result<Option<CheckpointToken>> {
        self.checkpoints.save(state).await
    }

    pub async fn load_checkpoint(&self, token: &CheckpointToken) -> Result<SessionState> {
        self.checkpoints.load(token).await
    }

    /// Load a checkpoint and continue the run it belongs to.
    pub async fn resume(&self, token: &CheckpointToken) -> Result<PipelineResult> {
        let mut state = self.load_checkpoint(token).await?;
        info!(session_id = %state.id(), "Resuming session from checkpoint");
        Ok(self.run_async(&mut state).await)
    }

    async fn drive(&self, state: &mut SessionState) -> Termination {
        let violations = state.validate();
        if !violations.is_empty() {
            return self.fatal(state, OrchestratorError::ConsistencyViolation(violations));
        }

        let mut route = match PipelineStateMachine::entry_route(state) {
            Ok(route) => route,
            Err(e) => return self.fatal(state, e),
        };
        let mut attempts: BTreeMap<StageKind, u32> = BTreeMap::new();
        let mut boundaries = 0u32;

        loop {
            debug!(session_id = %state.id(), route = ?route, "Routing");
            route = match route {
                Route::Stage(kind) => {
                    let stage = self.stages.get(kind);
                    let attempt = attempts.entry(kind).or_insert(0);
                    *attempt += 1;
                    self.emit(Event::StageStarted {
                        session_id: state.id(),
                        stage: kind.to_string(),
                        attempt: *attempt,
                    });

                    if let Err(e) = stage.execute(state).await {
                        return self.fatal(state, e);
                    }
                    self.emit_stage_outcome(stage, state);

                    let violations = state.validate();
                    if !violations.is_empty() {
                        return self.fatal(state, OrchestratorError::ConsistencyViolation(violations));
                    }

                    boundaries += 1;
                    if self.config.checkpoint_due(boundaries) {
                        self.checkpoint(state).await;
                    }

                    PipelineStateMachine::route_after_stage(stage, state)
                }
                Route::ErrorHandler => match PipelineStateMachine::handle_error(state) {
                    Ok(Route::Stage(kind)) => {
                        self.emit(Event::RetryScheduled {
                            session_id: state.id(),
                            stage: kind.to_string(),
                            retry_count: state.retry_count(),
                        });
                        Route::Stage(kind)
                    }
                    Ok(next) => next,
                    Err(e) => return self.fatal(state, e),
                },
                Route::Done => return PipelineStateMachine::termination(state),
            };
        }
    }

    fn emit_stage_outcome(&self, stage: &dyn Stage, state: &SessionState) {
        let kind = stage.kind();
        match state.status(kind) {
            StageStatus::Completed => self.emit(Event::StageCompleted {
                session_id: state.id(),
                stage: kind.to_string(),
                confidence: state.outputs.confidence(kind),
            }),
            StageStatus::Failed => self.emit(Event::StageFailed {
                session_id: state.id(),
                stage: kind.to_string(),
                error: state.errors().last().cloned(),
                retryable: stage.should_retry(state),
            }),
            _ => {}
        }
    }

    /// Record an error that ends the run immediately.
    fn fatal(&self, state: &mut SessionState, err: OrchestratorError) -> Termination {
        error!(session_id = %state.id(), error = %err, "Pipeline aborted");
        let termination = match &err {
            OrchestratorError::MissingDependency { stage, .. } => {
                Termination::DependencyError { stage: *stage }
            }
            _ => Termination::ConsistencyViolation,
        };
        state.record_error(err.to_string());
        termination
    }

    fn timed_out(&self, state: &mut SessionState, limit: Duration) -> Termination {
        let err = OrchestratorError::SessionTimeout {
            duration_ms: limit.as_millis() as u64,
        };
        warn!(session_id = %state.id(), "{}", err);
        state.record_error(err.to_string());
        if let Err(e) = PipelineStateMachine::recover_interrupted(state) {
            state.record_error(e.to_string());
        }
        Termination::TimedOut
    }

    fn refuse(&self, state: &mut SessionState, reason: String) -> PipelineResult {
        let err = OrchestratorError::RuntimeUnavailable(reason);
        error!(session_id = %state.id(), "{}", err);
        state.record_error(err.to_string());
        PipelineResult::from_state(state, Termination::RuntimeUnavailable, None)
    }

    /// Best-effort save; failures become warnings on the session.
    async fn checkpoint(&self, state: &mut SessionState) -> Option<CheckpointToken> {
        match self.checkpoints.save(state).await {
            Ok(Some(token)) => {
                debug!(session_id = %state.id(), token = %token, "Checkpoint saved");
                self.emit(Event::CheckpointSaved {
                    session_id: state.id(),
                    token: token.to_string(),
                });
                Some(token)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(session_id = %state.id(), error = %e, "Checkpoint save failed");
                state.record_warning(format!("Checkpoint save failed: {}", e));
                None
            }
        }
    }

    fn emit(&self, event: Event) {
        if let Some(emitter) = &self.emitter {
            emitter.emit(event);
        }
    }
}

impl std::fmt::Debug for DiscoveryOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveryOrchestrator")
            .field("config", &self.config)
            .field("events", &self.emitter.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborator::ScriptedCollaborator;
    use discovery_core::{ClarificationResult, FinalReport, SearchResults, ServiceDescription};

    fn idle_collaborators() -> Collaborators {
        Collaborators {
            clarification: Arc::new(ScriptedCollaborator::<ClarificationResult>::failing("idle")),
            description: Arc::new(ScriptedCollaborator::<ServiceDescription>::failing("idle")),
            search: Arc::new(ScriptedCollaborator::<SearchResults>::failing("idle")),
            report: Arc::new(ScriptedCollaborator::<FinalReport>::failing("idle")),
        }
    }

    #[test]
    fn test_create_session_uses_config_budget() {
        let orchestrator = DiscoveryOrchestrator::new(
            OrchestratorConfig::new().with_max_retries(5),
            idle_collaborators(),
        );
        let state = orchestrator.create_session("Cloud Storage", "United States", None);

        assert_eq!(state.max_retries(), 5);
        assert_eq!(state.retry_count(), 0);
        assert_eq!(state.next_stage, Some(StageKind::Clarification));
    }

    #[test]
    fn test_summary_of_fresh_session() {
        let orchestrator =
            DiscoveryOrchestrator::new(OrchestratorConfig::default(), idle_collaborators());
        let state = orchestrator.create_session("Cloud Storage", "United States", None);

        let summary = orchestrator.summarize(&state);

        assert_eq!(summary.completed_stages, 0);
        assert_eq!(summary.total_stages, 4);
        assert_eq!(summary.progress_percentage, 0.0);
        assert_eq!(summary.next_stage, Some(StageKind::Clarification));
        assert!(!summary.is_complete);
        assert!(!summary.has_failed);
        assert_eq!(summary.elapsed_ms, 0);
        assert!(summary
            .stages
            .iter()
            .all(|s| s.status == StageStatus::Pending));
    }

    #[tokio::test]
    async fn test_inconsistent_session_is_not_run() {
        let orchestrator =
            DiscoveryOrchestrator::new(OrchestratorConfig::default(), idle_collaborators());
        let mut state = orchestrator.create_session("", "United States", None);

        let result = orchestrator.run_async(&mut state).await;

        assert!(!result.success);
        assert_eq!(result.termination, Termination::ConsistencyViolation);
        assert!(result.errors[0].contains("subject"));
        assert_eq!(state.status(StageKind::Clarification), StageStatus::Pending);
    }

    #[tokio::test]
    async fn test_run_refuses_inside_runtime() {
        let orchestrator =
            DiscoveryOrchestrator::new(OrchestratorConfig::default(), idle_collaborators());
        let mut state = orchestrator.create_session("Cloud Storage", "United States", None);

        let result = orchestrator.run(&mut state);

        assert!(!result.success);
        assert_eq!(result.termination, Termination::RuntimeUnavailable);
        assert!(result.errors[0].contains("run_async"));
    }
}
