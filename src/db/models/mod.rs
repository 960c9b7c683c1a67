pub mod alarm;

pub use alarm::{
    AlarmPayload, AlarmRecord, AlarmStatus, NewAlarm, Recurrence, RepeatUnit, MAX_REPEAT_EVERY,
    MAX_SNOOZE_SECS,
};
