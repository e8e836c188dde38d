//! Contract between stages and the external systems doing their work.
//!
//! A collaborator is whatever turns a stage input into a stage output: a
//! language-model prompt, a search API, a fixture file. The orchestrator only
//! sees [`Collaborator::invoke`], which either returns a value of the stage's
//! output schema or a [`CollaboratorError`].

use async_trait::async_trait;
use discovery_core::{
    ClarificationResult, FinalReport, SearchResults, ServiceDescription, SessionState,
};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

use crate::error::{CollaboratorError, CollaboratorResult};

#[async_trait]
pub trait Collaborator<I, O>: Send + Sync
where
    I: Send + Sync + 'static,
    O: Send + 'static,
{
    async fn invoke(&self, input: &I) -> CollaboratorResult<O>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClarificationInput {
    pub subject: String,
    pub locale: String,
    pub detail: Option<String>,
}

impl ClarificationInput {
    pub fn from_state(state: &SessionState) -> Self {
        Self {
            subject: state.subject().to_string(),
            locale: state.locale().to_string(),
            detail: state.detail().map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescriptionInput {
    pub clarification: ClarificationResult,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchInput {
    pub clarification: ClarificationResult,
    pub description: ServiceDescription,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportInput {
    pub session_id: Uuid,
    pub clarification: ClarificationResult,
    pub description: ServiceDescription,
    pub search: SearchResults,
}

pub type ClarificationCollaborator = dyn Collaborator<ClarificationInput, ClarificationResult>;
pub type DescriptionCollaborator = dyn Collaborator<DescriptionInput, ServiceDescription>;
pub type SearchCollaborator = dyn Collaborator<SearchInput, SearchResults>;
pub type ReportCollaborator = dyn Collaborator<ReportInput, FinalReport>;

/// The four collaborators a pipeline needs, one per stage.
#[derive(Clone)]
pub struct Collaborators {
    pub clarification: Arc<ClarificationCollaborator>,
    pub description: Arc<DescriptionCollaborator>,
    pub search: Arc<SearchCollaborator>,
    pub report: Arc<ReportCollaborator>,
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

/// One canned collaborator outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptedOutcome<O> {
    Ok(O),
    Error(String),
}

impl<O> From<ScriptedOutcome<O>> for CollaboratorResult<O> {
    fn from(outcome: ScriptedOutcome<O>) -> Self {
        match outcome {
            ScriptedOutcome::Ok(value) => Ok(value),
            ScriptedOutcome::Error(reason) => Err(CollaboratorError::Failed(reason)),
        }
    }
}

/// Collaborator that replays a fixed sequence of outcomes.
///
/// Outcomes are consumed in order; once one remains it is repeated for every
/// later call. An empty script fails every call.
pub struct ScriptedCollaborator<O> {
    outcomes: Mutex<VecDeque<CollaboratorResult<O>>>,
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl<O: Clone> ScriptedCollaborator<O> {
    pub fn new(outcomes: impl IntoIterator<Item = CollaboratorResult<O>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into_iter().collect()),
            calls: AtomicUsize::new(0),
            delay: None,
        }
    }

    pub fn from_outcomes(outcomes: impl IntoIterator<Item = ScriptedOutcome<O>>) -> Self {
        Self::new(outcomes.into_iter().map(Into::into))
    }

    pub fn always(value: O) -> Self {
        Self::new([Ok(value)])
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self::new([Err(CollaboratorError::Failed(reason.into()))])
    }

    /// Sleep this long before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_outcome(&self) -> CollaboratorResult<O> {
        let mut outcomes = match self.outcomes.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if outcomes.len() > 1 {
            if let Some(outcome) = outcomes.pop_front() {
                return outcome;
            }
        }
        outcomes.front().cloned().unwrap_or_else(|| {
            Err(CollaboratorError::failed("no scripted outcome available"))
        })
    }
}

#[async_trait]
impl<I, O> Collaborator<I, O> for ScriptedCollaborator<O>
where
    I: Send + Sync + 'static,
    O: Clone + Send + 'static,
{
    async fn invoke(&self, _input: &I) -> CollaboratorResult<O> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.next_outcome()
    }
}
