pub mod clock;
pub mod timer;

use anyhow::Result;
use chrono::{DateTime, Utc};

pub use clock::{Clock, ManualClock, SystemClock};
pub use timer::TokioScheduler;

/// Host timer facility. Only ever sees `(id, fire_time)` pairs; alarm status
/// belongs to the engine.
pub trait Scheduler: Send + Sync {
    /// Registers a one-shot trigger that delivers `Fired(id)` no earlier than
    /// `fire_time`. Replaces any pending trigger for the same id. A time that
    /// has already passed fires immediately.
    fn arm(&self, id: i64, fire_time: DateTime<Utc>) -> Result<()>;

    /// Cancels the pending trigger for `id`. No-op when nothing is armed.
    fn disarm(&self, id: i64) -> Result<()>;

    fn is_armed(&self, id: i64) -> bool;
}
