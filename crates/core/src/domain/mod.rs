mod outputs;
mod session;
mod stage;

pub use outputs::*;
pub use session::{SessionInputs, SessionState, DEFAULT_MAX_RETRIES};
pub use stage::{StageKind, StageStatus};
