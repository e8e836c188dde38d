use discovery_core::{SessionState, StageKind, StageStatus};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::core::Stage;
use crate::error::Result;

/// Where the pipeline goes next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Stage(StageKind),
    ErrorHandler,
    Done,
}

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Termination {
    Completed,
    Rejected { stage: StageKind },
    RetriesExhausted { stage: StageKind },
    StageFailed { stage: StageKind },
    Incomplete,
    DependencyError { stage: StageKind },
    ConsistencyViolation,
    TimedOut,
    RuntimeUnavailable,
}

impl Termination {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Rejected { .. } => "rejected",
            Self::RetriesExhausted { .. } => "retries_exhausted",
            Self::StageFailed { .. } => "stage_failed",
            Self::Incomplete => "incomplete",
            Self::DependencyError { .. } => "dependency_error",
            Self::ConsistencyViolation => "consistency_violation",
            Self::TimedOut => "timed_out",
            Self::RuntimeUnavailable => "runtime_unavailable",
        }
    }
}

impl std::fmt::Display for Termination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Routing rules of the pipeline.
///
/// All functions take the session by `&mut` and may append warnings, errors
/// and timestamps, but only [`handle_error`](Self::handle_error) and
/// [`recover_interrupted`](Self::recover_interrupted) change stage statuses.
pub struct PipelineStateMachine;

impl PipelineStateMachine {
    /// Pick the next stage to run.
    ///
    /// The `next_stage` hint wins over the first non-completed stage unless
    /// it points at a stage that already completed. Disagreement between the
    /// two is logged as a warning.
    pub fn resolve_next_stage(state: &mut SessionState) -> Option<StageKind> {
        let derived = state.first_incomplete();
        let hint = match state.next_stage {
            Some(hint) => hint,
            None => return derived,
        };

        if state.status(hint) == StageStatus::Completed {
            let message = format!(
                "Routing hint {} points at a completed stage, continuing with {}",
                hint,
                derived.map(|k| k.as_str()).unwrap_or("done")
            );
            warn!(session_id = %state.id(), "{}", message);
            state.record_warning(message);
            return derived;
        }

        if derived != Some(hint) {
            let message = format!(
                "Routing hint {} disagrees with stage statuses (expected {})",
                hint,
                derived.map(|k| k.as_str()).unwrap_or("done")
            );
            warn!(session_id = %state.id(), "{}", message);
            state.record_warning(message);
        }
        Some(hint)
    }

    /// Route after a stage has executed.
    ///
    /// A next stage that is still FAILED from an earlier attempt goes
    /// through the error handler instead of being started directly.
    pub fn route_after_stage(stage: &dyn Stage, state: &mut SessionState) -> Route {
        let kind = stage.kind();
        match state.status(kind) {
            StageStatus::Completed => match Self::resolve_next_stage(state) {
                Some(next) if state.status(next) == StageStatus::Failed => Route::ErrorHandler,
                Some(next) => Route::Stage(next),
                None => Route::Done,
            },
            StageStatus::Failed if stage.should_retry(state) => Route::ErrorHandler,
            StageStatus::Failed => {
                if !state.is_rejected(kind) {
                    state.record_error(format!(
                        "Maximum retries exceeded ({}) for {}",
                        state.max_retries(),
                        kind
                    ));
                }
                Route::Done
            }
            status => {
                state.record_error(format!(
                    "{} ended in unexpected status {}",
                    kind.label(),
                    status
                ));
                Route::Done
            }
        }
    }

    /// Retry dispatch.
    ///
    /// Picks the first FAILED stage in pipeline order, bumps the retry
    /// counter, resets the stage to PENDING and routes back to it.
    pub fn handle_error(state: &mut SessionState) -> Result<Route> {
        if state.retries_exhausted() {
            warn!(
                session_id = %state.id(),
                retry_count = state.retry_count(),
                "Retry budget exhausted"
            );
            state.record_error(format!(
                "Maximum retries exceeded ({})",
                state.max_retries()
            ));
            return Ok(Route::Done);
        }

        let kind = match state.first_failed() {
            Some(kind) => kind,
            None => {
                debug!(session_id = %state.id(), "Error handler found no failed stage");
                return Ok(Self::resolve_next_stage(state)
                    .map(Route::Stage)
                    .unwrap_or(Route::Done));
            }
        };

        if state.is_rejected(kind) {
            info!(session_id = %state.id(), stage = %kind, "Rejected stage is not retried");
            return Ok(Route::Done);
        }

        let retry = state.increment_retry();
        state.stamp(format!("error_handled_{}", retry));
        state.stamp(kind.retry_key(retry));
        state.transition(kind, StageStatus::Pending)?;
        state.next_stage = Some(kind);

        info!(
            session_id = %state.id(),
            stage = %kind,
            retry_count = retry,
            max_retries = state.max_retries(),
            "Retrying stage"
        );
        Ok(Route::Stage(kind))
    }

    /// Fail every stage left IN_PROGRESS by an abandoned run.
    pub fn recover_interrupted(state: &mut SessionState) -> Result<Vec<StageKind>> {
        let interrupted = state.in_progress();
        for kind in &interrupted {
            state.transition(*kind, StageStatus::Failed)?;
            state.record_error(format!("{} interrupted before completion", kind.label()));
            warn!(session_id = %state.id(), stage = %kind, "Recovered interrupted stage");
        }
        Ok(interrupted)
    }

    /// First route of a run, for fresh and resumed sessions alike.
    pub fn entry_route(state: &mut SessionState) -> Result<Route> {
        Self::recover_interrupted(state)?;
        if state.first_failed().is_some() {
            return Ok(Route::ErrorHandler);
        }
        Ok(Self::resolve_next_stage(state)
            .map(Route::Stage)
            .unwrap_or(Route::Done))
    }

    /// Classify a session that reached `Done`.
    pub fn termination(state: &SessionState) -> Termination {
        if state.is_complete() {
            return Termination::Completed;
        }
        match state.first_failed() {
            Some(stage) if state.is_rejected(stage) => Termination::Rejected { stage },
            Some(stage) if state.retries_exhausted() => Termination::RetriesExhausted { stage },
            Some(stage) => Termination::StageFailed { stage },
            None => Termination::Incomplete,
        }
    }
}
