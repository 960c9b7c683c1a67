use thiserror::Error;

use crate::db::AlarmStatus;

/// Failures surfaced by engine operations. None of these escape
/// [`AlarmEngine::handle_event`](super::AlarmEngine::handle_event); they are
/// logged there and the event is dropped.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("alarm {0} not found")]
    NotFound(i64),

    #[error("malformed event: {0}")]
    MalformedEvent(String),

    #[error("alarm {id} ignores {input} while {status:?}")]
    InvalidTransition {
        id: i64,
        status: AlarmStatus,
        input: &'static str,
    },

    #[error("alarm {0} has snooze disabled")]
    SnoozeDisabled(i64),

    #[error("alarm {id}: {what} is out of range")]
    OutOfRange { id: i64, what: &'static str },

    #[error("dispatcher command failed: {0:#}")]
    DispatcherFailure(anyhow::Error),

    #[error("scheduler command failed: {0:#}")]
    SchedulerFailure(anyhow::Error),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl EngineError {
    /// Expected, recoverable conditions that are logged at warn level.
    pub fn is_benign(&self) -> bool {
        matches!(
            self,
            EngineError::NotFound(_)
                | EngineError::InvalidTransition { .. }
                | EngineError::SnoozeDisabled(_)
        )
    }
}
