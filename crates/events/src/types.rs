//! Event types for the discovery pipeline event system

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Envelope wrapping all events with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique event ID
    pub id: Uuid,
    /// Position in the emitter's stream, when emitted through an ordered emitter
    #[serde(default)]
    pub sequence: Option<u64>,
    /// When the event occurred
    pub timestamp: DateTime<Utc>,
    /// The actual event
    pub event: Event,
}

impl EventEnvelope {
    /// Create a new event envelope with auto-generated ID and timestamp
    pub fn new(event: Event) -> Self {
        Self {
            id: Uuid::new_v4(),
            sequence: None,
            timestamp: Utc::now(),
            event,
        }
    }

    /// Attach a sequence number
    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = Some(sequence);
        self
    }
}

/// All possible events in the system
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    // Session events
    /// A discovery session was created
    #[serde(rename = "session.created")]
    SessionCreated {
        session_id: Uuid,
        subject: String,
        locale: String,
    },

    // Stage events
    /// A stage started executing
    #[serde(rename = "stage.started")]
    StageStarted {
        session_id: Uuid,
        stage: String,
        attempt: u32,
    },

    /// A stage completed and stored its output
    #[serde(rename = "stage.completed")]
    StageCompleted {
        session_id: Uuid,
        stage: String,
        confidence: Option<f64>,
    },

    /// A stage failed
    #[serde(rename = "stage.failed")]
    StageFailed {
        session_id: Uuid,
        stage: String,
        error: Option<String>,
        retryable: bool,
    },

    /// The error handler sent a failed stage back for another attempt
    #[serde(rename = "stage.retry_scheduled")]
    RetryScheduled {
        session_id: Uuid,
        stage: String,
        retry_count: u32,
    },

    // Checkpoint events
    /// Session state was checkpointed
    #[serde(rename = "checkpoint.saved")]
    CheckpointSaved { session_id: Uuid, token: String },

    // Pipeline events
    /// The pipeline reached a terminal state
    #[serde(rename = "pipeline.finished")]
    PipelineFinished {
        session_id: Uuid,
        success: bool,
        termination: String,
    },

    /// A run was dropped before reaching a terminal state
    #[serde(rename = "pipeline.abandoned")]
    PipelineAbandoned { session_id: Uuid },
}

impl Event {
    /// Get the session ID associated with this event
    pub fn session_id(&self) -> Uuid {
        match self {
            Event::SessionCreated { session_id, .. } => *session_id,
            Event::StageStarted { session_id, .. } => *session_id,
            Event::StageCompleted { session_id, .. } => *session_id,
            Event::StageFailed { session_id, .. } => *session_id,
            Event::RetryScheduled { session_id, .. } => *session_id,
            Event::CheckpointSaved { session_id, .. } => *session_id,
            Event::PipelineFinished { session_id, .. } => *session_id,
            Event::PipelineAbandoned { session_id } => *session_id,
        }
    }

    /// Stage name carried by stage events
    pub fn stage(&self) -> Option<&str> {
        match self {
            Event::StageStarted { stage, .. }
            | Event::StageCompleted { stage, .. }
            | Event::StageFailed { stage, .. }
            | Event::RetryScheduled { stage, .. } => Some(stage),
            _ => None,
        }
    }
}
