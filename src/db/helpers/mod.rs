use std::convert::TryFrom;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};

use crate::db::models::{AlarmStatus, RepeatUnit};

pub fn to_i64(value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| anyhow!("value {value} exceeds SQLite INTEGER range"))
}

pub fn to_u64(value: i64, field: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| anyhow!("{field} contains negative value {value}"))
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn parse_status(value: &str) -> Result<AlarmStatus> {
    match value {
        "Scheduled" => Ok(AlarmStatus::Scheduled),
        "Firing" => Ok(AlarmStatus::Firing),
        "Snoozed" => Ok(AlarmStatus::Snoozed),
        "Dismissed" => Ok(AlarmStatus::Dismissed),
        other => Err(anyhow!("unknown alarm status {other}")),
    }
}

pub fn parse_repeat_unit(value: &str) -> Result<RepeatUnit> {
    match value {
        "minutely" => Ok(RepeatUnit::Minutely),
        "hourly" => Ok(RepeatUnit::Hourly),
        "daily" => Ok(RepeatUnit::Daily),
        "weekly" => Ok(RepeatUnit::Weekly),
        other => Err(anyhow!("unknown repeat unit {other}")),
    }
}
