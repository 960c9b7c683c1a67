//! Alarm lifecycle transition table.
//!
//! ```text
//!              Fired               Snooze
//!  Scheduled ─────────► Firing ─────────► Snoozed
//!      ▲                  │ ▲     Fired      │
//!      │                  │ └────────────────┘
//!      │   (recurring)    │ Dismiss          │ Dismiss
//!      └───────────── Dismissed ◄────────────┘
//! ```
//!
//! `Dismissed` is never persisted: a one-shot alarm is deleted and a
//! recurring one goes straight back to `Scheduled` for its next occurrence.

use crate::db::AlarmStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleInput {
    Fired,
    Snooze,
    Dismiss,
}

impl LifecycleInput {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleInput::Fired => "fired",
            LifecycleInput::Snooze => "snooze",
            LifecycleInput::Dismiss => "dismiss",
        }
    }
}

/// Next status for `input` in `current`, or `None` when the input does not
/// apply and must be ignored.
pub fn transition(current: AlarmStatus, input: LifecycleInput) -> Option<AlarmStatus> {
    match (current, input) {
        (AlarmStatus::Scheduled | AlarmStatus::Snoozed, LifecycleInput::Fired) => {
            Some(AlarmStatus::Firing)
        }
        (AlarmStatus::Firing, LifecycleInput::Snooze) => Some(AlarmStatus::Snoozed),
        (AlarmStatus::Firing | AlarmStatus::Snoozed, LifecycleInput::Dismiss) => {
            Some(AlarmStatus::Dismissed)
        }
        _ => None,
    }
}
