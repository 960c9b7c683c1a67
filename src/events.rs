//! Inbound and outbound event shapes at the platform boundary.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::db::{AlarmPayload, AlarmRecord, NewAlarm};

/// User action delivered from a notification button. Unrecognized action
/// names are kept as `Unknown` so they can be logged instead of failing the
/// whole event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserActionKind {
    Snooze,
    Dismiss,
    Unknown(String),
}

impl UserActionKind {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "snooze" => UserActionKind::Snooze,
            "dismiss" => UserActionKind::Dismiss,
            _ => UserActionKind::Unknown(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            UserActionKind::Snooze => "snooze",
            UserActionKind::Dismiss => "dismiss",
            UserActionKind::Unknown(raw) => raw,
        }
    }
}

impl fmt::Display for UserActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for UserActionKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for UserActionKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(UserActionKind::parse(&raw))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AlarmEvent {
    Fired { id: i64 },
    UserAction { action: UserActionKind, id: i64 },
    BootCompleted,
    CreateAlarm { alarm: NewAlarm },
    CancelAlarm { id: i64 },
    /// Show a notification now, without storing or scheduling an alarm.
    SendNotification { payload: AlarmPayload },
    StopSound,
    ClearAllNotifications,
    /// Answered with [`AppEvent::Alarms`].
    ListAlarms,
}

impl AlarmEvent {
    pub fn alarm_id(&self) -> Option<i64> {
        match self {
            AlarmEvent::Fired { id }
            | AlarmEvent::UserAction { id, .. }
            | AlarmEvent::CancelAlarm { id } => Some(*id),
            AlarmEvent::BootCompleted
            | AlarmEvent::CreateAlarm { .. }
            | AlarmEvent::SendNotification { .. }
            | AlarmEvent::StopSound
            | AlarmEvent::ClearAllNotifications
            | AlarmEvent::ListAlarms => None,
        }
    }
}

/// Events the surrounding application subscribes to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum AppEvent {
    AlarmDismissed { id: i64 },
    /// Every stored alarm, ascending by id.
    Alarms { alarms: Vec<AlarmRecord> },
}
