//! Boot recovery: timers die with the process, records do not. After a
//! restart every pending alarm in the store is armed again.
//!
//! [`AlarmEngine::recover`](crate::engine::AlarmEngine::recover) walks the
//! store and calls [`recover_record`] for each alarm while holding that
//! alarm's lock, so recovery never interleaves with a fire or user action.

use anyhow::Result;
use log::{debug, warn};
use serde::Serialize;

use crate::{
    db::{AlarmRecord, AlarmStatus, Database},
    scheduler::{Clock, Scheduler},
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryReport {
    /// Scheduled or Snoozed alarms armed at their stored fire time.
    pub rearmed: Vec<i64>,
    /// Alarms caught mid-ring, reset to Scheduled and armed for now.
    pub refired: Vec<i64>,
    /// Not armed by this pass.
    pub skipped: Vec<i64>,
}

impl RecoveryReport {
    pub(crate) fn record(&mut self, id: i64, outcome: Recovered) {
        match outcome {
            Recovered::Rearmed => self.rearmed.push(id),
            Recovered::Refired => self.refired.push(id),
            Recovered::Skipped => self.skipped.push(id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Recovered {
    Rearmed,
    Refired,
    Skipped,
}

/// Re-arms one Scheduled/Snoozed alarm; elapsed fire times fire right away.
///
/// An alarm that was Firing when the process died lost its notification with
/// it, so on the first pass after startup (`reset_firing`) it goes back to
/// Scheduled with `fire_time = now`. Later passes leave a ringing alarm alone.
///
/// The caller must hold the alarm's lock and pass a record read under it.
pub(crate) async fn recover_record(
    db: &Database,
    scheduler: &dyn Scheduler,
    clock: &dyn Clock,
    mut alarm: AlarmRecord,
    reset_firing: bool,
) -> Result<Recovered> {
    match alarm.status {
        AlarmStatus::Scheduled | AlarmStatus::Snoozed => {
            scheduler.arm(alarm.id, alarm.fire_time)?;
            Ok(Recovered::Rearmed)
        }
        AlarmStatus::Firing if reset_firing => {
            let now = clock.now();
            alarm.status = AlarmStatus::Scheduled;
            alarm.fire_time = now;
            alarm.updated_at = now;
            db.put_alarm(&alarm).await?;
            scheduler.arm(alarm.id, now)?;
            Ok(Recovered::Refired)
        }
        AlarmStatus::Firing => {
            debug!("alarm {} is still ringing; leaving it as is", alarm.id);
            Ok(Recovered::Skipped)
        }
        AlarmStatus::Dismissed => {
            warn!("alarm {} persisted as Dismissed; leaving it unarmed", alarm.id);
            Ok(Recovered::Skipped)
        }
    }
}
