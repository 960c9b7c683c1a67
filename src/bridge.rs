//! Line-delimited JSON at the platform boundary: one inbound [`AlarmEvent`]
//! per stdin line, one outbound [`AppEvent`] per stdout line.

use anyhow::{Context, Result};

use crate::{
    engine::EngineError,
    events::{AlarmEvent, AppEvent},
    settings::Settings,
};

/// Blank lines yield `Ok(None)`.
pub fn parse_event_line(line: &str) -> Result<Option<AlarmEvent>, EngineError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    serde_json::from_str(trimmed)
        .map(Some)
        .map_err(|err| EngineError::MalformedEvent(format!("{err} in `{trimmed}`")))
}

/// Fills in configured defaults the sender left out.
pub fn apply_defaults(event: AlarmEvent, settings: &Settings) -> AlarmEvent {
    match event {
        AlarmEvent::CreateAlarm { mut alarm } => {
            if alarm.resolved_snooze_secs().is_none() {
                alarm.snooze_interval_secs = settings.default_snooze_secs;
            }
            AlarmEvent::CreateAlarm { alarm }
        }
        other => other,
    }
}

pub fn encode_app_event(event: &AppEvent) -> Result<String> {
    let mut line = serde_json::to_string(event).context("failed to encode app event")?;
    line.push('\n');
    Ok(line)
}
