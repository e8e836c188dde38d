//! Stage trait and the shared lifecycle steps every stage goes through.
//!
//! Each of the four pipeline stages (clarification, description, search,
//! report) implements [`Stage`] so the router can treat them identically.
//! The free functions in this module are the common building blocks of an
//! `execute` implementation: dependency check, start, completion, failure.

use async_trait::async_trait;
use discovery_core::{SessionState, StageKind, StageStatus};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::collaborator::Collaborator;
use crate::error::{CollaboratorError, CollaboratorResult, OrchestratorError, Result};

/// Uniform contract of a pipeline stage.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Which pipeline stage this is.
    fn kind(&self) -> StageKind;

    /// Run the stage against the session.
    ///
    /// Collaborator failures are recorded on the state (status FAILED plus an
    /// error entry) and never returned. An `Err` means the stage could not
    /// even start, e.g. an upstream output is missing.
    async fn execute(&self, state: &mut SessionState) -> Result<()>;

    /// Whether the router may send this stage back for another attempt.
    fn should_retry(&self, state: &SessionState) -> bool {
        let kind = self.kind();
        state.status(kind) == StageStatus::Failed
            && state.retry_count() < state.max_retries()
            && !state.is_rejected(kind)
    }
}

/// Fail fast when an upstream output this stage consumes is absent.
pub fn require_dependencies(state: &SessionState, kind: StageKind) -> Result<()> {
    let missing: Vec<StageKind> = kind
        .dependencies()
        .iter()
        .copied()
        .filter(|dep| !state.outputs.is_present(*dep))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(OrchestratorError::missing_dependency(kind, missing))
    }
}

/// Move the stage to IN_PROGRESS and stamp its start.
pub fn begin(state: &mut SessionState, kind: StageKind) -> Result<()> {
    state.transition(kind, StageStatus::InProgress)?;
    state.stamp(kind.start_key());
    info!(
        session_id = %state.id(),
        stage = %kind,
        retry_count = state.retry_count(),
        "Stage started"
    );
    Ok(())
}

/// Mark the stage COMPLETED and point the routing hint at the next stage.
///
/// The caller stores the output before calling this.
pub fn complete(state: &mut SessionState, kind: StageKind) -> Result<()> {
    state.transition(kind, StageStatus::Completed)?;
    state.stamp(kind.complete_key());
    state.next_stage = kind.next();
    info!(
        session_id = %state.id(),
        stage = %kind,
        next_stage = ?state.next_stage,
        "Stage completed"
    );
    Ok(())
}

/// Mark the stage FAILED and append the error to the session log.
pub fn fail(state: &mut SessionState, kind: StageKind, error: impl Into<String>) -> Result<()> {
    let error = error.into();
    state.transition(kind, StageStatus::Failed)?;
    warn!(
        session_id = %state.id(),
        stage = %kind,
        error = %error,
        "Stage failed"
    );
    state.record_error(error);
    Ok(())
}

/// Append a warning when a result's confidence is under the threshold.
pub fn warn_if_low_confidence(
    state: &mut SessionState,
    kind: StageKind,
    confidence: f64,
    threshold: f64,
) {
    if confidence < threshold {
        let message = format!(
            "Low confidence {} result ({:.2} < {:.2})",
            kind, confidence, threshold
        );
        warn!(session_id = %state.id(), stage = %kind, confidence, "{}", message);
        state.record_warning(message);
    }
}

/// Reject confidence scores outside `[0, 1]`.
pub fn check_confidence(confidence: f64) -> CollaboratorResult<f64> {
    if (0.0..=1.0).contains(&confidence) {
        Ok(confidence)
    } else {
        Err(CollaboratorError::InvalidOutput(format!(
            "confidence_score {} outside [0, 1]",
            confidence
        )))
    }
}

/// Call a collaborator under a timeout; an elapsed timeout is a failure.
pub async fn invoke_with_timeout<I, O, C>(
    collaborator: &C,
    input: &I,
    timeout: Duration,
) -> CollaboratorResult<O>
where
    C: Collaborator<I, O> + ?Sized,
    I: Send + Sync + 'static,
    O: Send + 'static,
{
    debug!(timeout_ms = timeout.as_millis() as u64, "Invoking collaborator");
    match tokio::time::timeout(timeout, collaborator.invoke(input)).await {
        Ok(result) => result,
        Err(_) => Err(CollaboratorError::Timeout {
            after_ms: timeout.as_millis() as u64,
        }),
    }
}
