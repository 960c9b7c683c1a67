pub mod connection;
pub mod helpers;
mod migrations;
pub mod models;
pub mod repositories;

pub use connection::Database;
pub use models::{
    AlarmPayload, AlarmRecord, AlarmStatus, NewAlarm, Recurrence, RepeatUnit, MAX_REPEAT_EVERY,
    MAX_SNOOZE_SECS,
};
