//! RAII guard for a pipeline run.
//!
//! A run future can be dropped at any collaborator call. The guard notices
//! that the run never reached a terminal state and announces it, so event
//! subscribers are not left waiting for a `pipeline.finished` that will
//! never come.

use tracing::{debug, warn};
use uuid::Uuid;

use events::Event;

use crate::core::OrderedEventEmitter;

/// Emits `pipeline.abandoned` when dropped before [`finish`](Self::finish).
///
/// ```ignore
/// let mut guard = RunGuard::new(session.id(), emitter.clone());
/// // ... drive the pipeline ...
/// guard.finish();
/// ```
pub struct RunGuard {
    session_id: Uuid,
    emitter: Option<OrderedEventEmitter>,
    finished: bool,
}

impl RunGuard {
    pub fn new(session_id: Uuid, emitter: Option<OrderedEventEmitter>) -> Self {
        debug!(session_id = %session_id, "Run guard created");
        Self {
            session_id,
            emitter,
            finished: false,
        }
    }

    /// The run reached a terminal state; nothing to report on drop.
    pub fn finish(&mut self) {
        self.finished = true;
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        warn!(
            session_id = %self.session_id,
            "Pipeline run dropped before termination"
        );
        if let Some(emitter) = &self.emitter {
            emitter.emit(Event::PipelineAbandoned {
                session_id: self.session_id,
            });
        }
    }
}
