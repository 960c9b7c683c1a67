//! Alarm data models.
//!
//! `AlarmRecord` is the only persisted entity. `NewAlarm` is what a caller
//! hands in when scheduling; the store assigns the id and the initial status.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Longest snooze accepted when an alarm is created.
pub const MAX_SNOOZE_SECS: u64 = 24 * 60 * 60;

/// Largest recurrence multiplier accepted when an alarm is created.
pub const MAX_REPEAT_EVERY: u32 = 1_000;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum AlarmStatus {
    Scheduled,
    Firing,
    Snoozed,
    Dismissed,
}

impl AlarmStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlarmStatus::Scheduled => "Scheduled",
            AlarmStatus::Firing => "Firing",
            AlarmStatus::Snoozed => "Snoozed",
            AlarmStatus::Dismissed => "Dismissed",
        }
    }

    /// Firing and Snoozed alarms own a notification on the dispatcher side.
    pub fn holds_notification(&self) -> bool {
        matches!(self, AlarmStatus::Firing | AlarmStatus::Snoozed)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum RepeatUnit {
    Minutely,
    Hourly,
    Daily,
    Weekly,
}

impl RepeatUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepeatUnit::Minutely => "minutely",
            RepeatUnit::Hourly => "hourly",
            RepeatUnit::Daily => "daily",
            RepeatUnit::Weekly => "weekly",
        }
    }

    fn step(&self) -> Duration {
        match self {
            RepeatUnit::Minutely => Duration::minutes(1),
            RepeatUnit::Hourly => Duration::hours(1),
            RepeatUnit::Daily => Duration::days(1),
            RepeatUnit::Weekly => Duration::weeks(1),
        }
    }
}

fn default_every() -> u32 {
    1
}

/// Fixed-interval recurrence: fire again every `every` units after the anchor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Recurrence {
    pub unit: RepeatUnit,
    #[serde(default = "default_every")]
    pub every: u32,
}

impl Recurrence {
    pub fn new(unit: RepeatUnit, every: u32) -> Self {
        Self { unit, every }
    }

    /// `None` when `every` units do not fit in a duration.
    pub fn interval(&self) -> Option<Duration> {
        let every = i32::try_from(self.every.max(1)).ok()?;
        self.unit.step().checked_mul(every)
    }

    /// Smallest `anchor + k * interval` (k >= 1) that is strictly after both
    /// `anchor` and `now`. Occurrences missed while the device was off are
    /// skipped rather than replayed. `None` if that instant is not
    /// representable.
    pub fn next_after(&self, anchor: DateTime<Utc>, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let interval = self.interval()?;
        let first = anchor.checked_add_signed(interval)?;
        if first > now {
            return Some(first);
        }

        let interval_ms = interval.num_milliseconds().max(1);
        let behind_ms = (now - anchor).num_milliseconds();
        let steps = behind_ms / interval_ms + 1;
        let offset = Duration::try_milliseconds(steps.checked_mul(interval_ms)?)?;
        anchor.checked_add_signed(offset)
    }
}

fn default_true() -> bool {
    true
}

fn default_volume() -> f32 {
    1.0
}

fn default_channel() -> String {
    "alarm".into()
}

/// Everything the dispatcher needs to render and ring an alarm. The engine
/// never inspects it beyond the `play_sound` flag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AlarmPayload {
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub sound_name: Option<String>,
    #[serde(default = "default_true")]
    pub play_sound: bool,
    #[serde(default = "default_true")]
    pub loop_sound: bool,
    #[serde(default)]
    pub vibrate: bool,
    #[serde(default = "default_volume")]
    pub volume: f32,
    #[serde(default = "default_channel")]
    pub channel: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl AlarmPayload {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            sound_name: None,
            play_sound: true,
            loop_sound: true,
            vibrate: false,
            volume: default_volume(),
            channel: default_channel(),
            data: serde_json::Value::Null,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AlarmRecord {
    pub id: i64,
    pub fire_time: DateTime<Utc>,
    /// Un-snoozed time of the current occurrence; recurrence steps from here.
    pub anchor_time: DateTime<Utc>,
    pub status: AlarmStatus,
    pub snooze_interval_secs: Option<u64>,
    pub payload: AlarmPayload,
    pub recurs: Option<Recurrence>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AlarmRecord {
    /// `None` when snooze is disabled or the interval is not representable.
    pub fn snooze_interval(&self) -> Option<Duration> {
        self.snooze_interval_secs
            .filter(|secs| *secs > 0)
            .and_then(|secs| i64::try_from(secs).ok())
            .and_then(Duration::try_seconds)
    }
}

/// Input for scheduling a new alarm.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAlarm {
    pub fire_time: DateTime<Utc>,
    #[serde(default)]
    pub snooze_interval_secs: Option<u64>,
    #[serde(default)]
    pub snooze_minutes: Option<u64>,
    pub payload: AlarmPayload,
    #[serde(default)]
    pub recurs: Option<Recurrence>,
}

impl NewAlarm {
    pub fn once(fire_time: DateTime<Utc>, payload: AlarmPayload) -> Self {
        Self {
            fire_time,
            snooze_interval_secs: None,
            snooze_minutes: None,
            payload,
            recurs: None,
        }
    }

    pub fn with_snooze_secs(mut self, secs: u64) -> Self {
        self.snooze_interval_secs = Some(secs);
        self
    }

    pub fn with_recurrence(mut self, recurs: Recurrence) -> Self {
        self.recurs = Some(recurs);
        self
    }

    /// Explicit seconds win over the minutes shorthand.
    pub fn resolved_snooze_secs(&self) -> Option<u64> {
        self.snooze_interval_secs
            .or_else(|| self.snooze_minutes.map(|m| m.saturating_mul(60)))
    }
}
