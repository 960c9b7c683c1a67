use std::sync::{
    atomic::{AtomicBool, AtomicI64, Ordering},
    Arc,
};

use chrono::Duration;
use log::{debug, error, info, warn};

use crate::{
    db::{
        AlarmPayload, AlarmRecord, AlarmStatus, Database, NewAlarm, MAX_REPEAT_EVERY,
        MAX_SNOOZE_SECS,
    },
    events::{AlarmEvent, AppEvent, UserActionKind},
    recovery::{recover_record, RecoveryReport},
    scheduler::{Clock, Scheduler},
};

use super::{
    error::EngineError,
    guard::SoundGuard,
    locks::AlarmLocks,
    state::{transition, LifecycleInput},
    AppEventEmitter, Dispatcher,
};

/// A `Fired` event this far ahead of the stored fire time is treated as stale.
const EARLY_FIRE_TOLERANCE_SECS: i64 = 2;

/// Drives the alarm lifecycle. Cheap to clone; every clone shares the same
/// store, collaborators and per-alarm locks.
#[derive(Clone)]
pub struct AlarmEngine {
    db: Database,
    scheduler: Arc<dyn Scheduler>,
    dispatcher: Arc<dyn Dispatcher>,
    emitter: Arc<dyn AppEventEmitter>,
    clock: Arc<dyn Clock>,
    locks: Arc<AlarmLocks>,
    recovered: Arc<AtomicBool>,
    /// Ids for immediate notifications count down from -1; stored alarms
    /// count up from 1.
    next_adhoc_id: Arc<AtomicI64>,
}

impl AlarmEngine {
    pub fn new(
        db: Database,
        scheduler: Arc<dyn Scheduler>,
        dispatcher: Arc<dyn Dispatcher>,
        emitter: Arc<dyn AppEventEmitter>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            db,
            scheduler,
            dispatcher,
            emitter,
            clock,
            locks: Arc::new(AlarmLocks::new()),
            recovered: Arc::new(AtomicBool::new(false)),
            next_adhoc_id: Arc::new(AtomicI64::new(-1)),
        }
    }

    /// Event boundary: every failure is logged here and goes no further.
    pub async fn handle_event(&self, event: AlarmEvent) {
        let alarm_id = event.alarm_id();
        let result = match event {
            AlarmEvent::Fired { id } => self.on_fired(id).await.map(|_| ()),
            AlarmEvent::UserAction { action, id } => match action {
                UserActionKind::Snooze => self.snooze(id).await.map(|_| ()),
                UserActionKind::Dismiss => self.dismiss(id).await.map(|_| ()),
                UserActionKind::Unknown(raw) => {
                    warn!("ignoring unknown action '{raw}' for alarm {id}");
                    Ok(())
                }
            },
            AlarmEvent::BootCompleted => self.recover().await.map(|_| ()),
            AlarmEvent::CreateAlarm { alarm } => self.create_alarm(alarm).await.map(|_| ()),
            AlarmEvent::CancelAlarm { id } => self.cancel_alarm(id).await,
            AlarmEvent::SendNotification { payload } => self.send_notification(payload).map(|_| ()),
            AlarmEvent::StopSound => self.stop_sound(),
            AlarmEvent::ClearAllNotifications => self.clear_all_notifications(),
            AlarmEvent::ListAlarms => self.publish_alarms().await,
        };

        if let Err(err) = result {
            let subject = alarm_id.map_or_else(|| "event".to_string(), |id| format!("alarm {id}"));
            if err.is_benign() {
                warn!("{subject}: {err}");
            } else {
                error!("{subject}: {err}");
            }
        }
    }

    /// Stores a new alarm and arms it. A scheduler failure does not undo the
    /// insert; the next recovery pass re-arms it.
    pub async fn create_alarm(&self, mut alarm: NewAlarm) -> Result<AlarmRecord, EngineError> {
        if alarm.payload.title.trim().is_empty() {
            return Err(EngineError::MalformedEvent("alarm title is empty".into()));
        }
        if matches!(alarm.recurs, Some(rule) if rule.every == 0 || rule.every > MAX_REPEAT_EVERY) {
            return Err(EngineError::MalformedEvent(format!(
                "recurrence interval must be between 1 and {MAX_REPEAT_EVERY}"
            )));
        }
        if matches!(alarm.resolved_snooze_secs(), Some(secs) if secs > MAX_SNOOZE_SECS) {
            return Err(EngineError::MalformedEvent(format!(
                "snooze interval exceeds {MAX_SNOOZE_SECS}s"
            )));
        }
        alarm.payload.volume = alarm.payload.volume.clamp(0.0, 1.0);

        let record = self.db.insert_alarm(&alarm, self.clock.now()).await?;
        self.arm_or_log(record.id, &record);
        info!(
            "alarm {} scheduled for {}",
            record.id,
            record.fire_time.to_rfc3339()
        );
        Ok(record)
    }

    /// Removes an alarm regardless of its status.
    pub async fn cancel_alarm(&self, id: i64) -> Result<(), EngineError> {
        let _lock = self.locks.acquire(id).await;
        let alarm = self.load(id).await?;

        if let Err(err) = self.scheduler.disarm(id) {
            error!("alarm {id}: {}", EngineError::SchedulerFailure(err));
        }

        if alarm.status.holds_notification() {
            let mut sound = SoundGuard::new(Arc::clone(&self.dispatcher), id);
            self.silence(id, &mut sound);
        }

        self.db.delete_alarm(id).await?;
        info!("alarm {id} cancelled");
        Ok(())
    }

    /// Scheduled/Snoozed -> Firing: show the notification and start the sound.
    pub async fn on_fired(&self, id: i64) -> Result<AlarmRecord, EngineError> {
        let _lock = self.locks.acquire(id).await;
        let mut alarm = self.load(id).await?;
        let next = self.check(&alarm, LifecycleInput::Fired)?;

        let now = self.clock.now();
        if alarm.fire_time - now > Duration::seconds(EARLY_FIRE_TOLERANCE_SECS) {
            warn!(
                "alarm {id} fired early (due {}); re-arming",
                alarm.fire_time.to_rfc3339()
            );
            self.arm_or_log(id, &alarm);
            return Ok(alarm);
        }

        if let Err(err) = self.dispatcher.show_notification(id, &alarm.payload) {
            error!("alarm {id}: {}", EngineError::DispatcherFailure(err));
        }
        if alarm.payload.play_sound {
            if let Err(err) = self.dispatcher.play_sound(&alarm.payload) {
                error!("alarm {id}: {}", EngineError::DispatcherFailure(err));
            }
        }

        alarm.status = next;
        alarm.updated_at = now;
        self.db.put_alarm(&alarm).await?;
        info!("alarm {id} firing: {}", alarm.payload.title);
        Ok(alarm)
    }

    /// Firing -> Snoozed: re-arm for `now + snooze interval`, silence and
    /// clear the notification.
    pub async fn snooze(&self, id: i64) -> Result<AlarmRecord, EngineError> {
        let _lock = self.locks.acquire(id).await;
        let mut sound = SoundGuard::new(Arc::clone(&self.dispatcher), id);

        let mut alarm = self.load(id).await?;
        let next = self.check(&alarm, LifecycleInput::Snooze)?;
        if alarm.snooze_interval_secs.unwrap_or(0) == 0 {
            return Err(EngineError::SnoozeDisabled(id));
        }

        let now = self.clock.now();
        alarm.fire_time = alarm
            .snooze_interval()
            .and_then(|interval| now.checked_add_signed(interval))
            .ok_or(EngineError::OutOfRange {
                id,
                what: "snooze interval",
            })?;

        let rearmed = self
            .scheduler
            .disarm(id)
            .and_then(|_| self.scheduler.arm(id, alarm.fire_time));
        if let Err(err) = rearmed {
            error!("alarm {id}: {}", EngineError::SchedulerFailure(err));
        }

        self.silence(id, &mut sound);

        alarm.status = next;
        alarm.updated_at = now;
        self.db.put_alarm(&alarm).await?;
        info!(
            "alarm {id} snoozed until {}",
            alarm.fire_time.to_rfc3339()
        );
        Ok(alarm)
    }

    /// Firing/Snoozed -> Dismissed. One-shot alarms are deleted and `None` is
    /// returned; recurring ones come back `Scheduled` for their next
    /// occurrence.
    pub async fn dismiss(&self, id: i64) -> Result<Option<AlarmRecord>, EngineError> {
        let _lock = self.locks.acquire(id).await;
        let mut sound = SoundGuard::new(Arc::clone(&self.dispatcher), id);

        let mut alarm = self.load(id).await?;
        self.check(&alarm, LifecycleInput::Dismiss)?;

        if let Err(err) = self.scheduler.disarm(id) {
            error!("alarm {id}: {}", EngineError::SchedulerFailure(err));
        }

        self.silence(id, &mut sound);

        let now = self.clock.now();
        let next_occurrence = alarm.recurs.and_then(|rule| {
            let next = rule.next_after(alarm.anchor_time, now);
            if next.is_none() {
                warn!("alarm {id}: next occurrence is out of range; treating this one as the last");
            }
            next
        });

        let stored = match next_occurrence {
            Some(next) => {
                alarm.fire_time = next;
                alarm.anchor_time = next;
                alarm.status = AlarmStatus::Scheduled;
                alarm.updated_at = now;
                self.arm_or_log(id, &alarm);
                self.db.put_alarm(&alarm).await.map(|_| Some(alarm))
            }
            None => self.db.delete_alarm(id).await.map(|_| None),
        };

        // The user dismissed regardless of whether the store write landed.
        if let Err(err) = self.emitter.emit(AppEvent::AlarmDismissed { id }) {
            error!("alarm {id}: failed to publish dismissal: {err:#}");
        }

        let outcome = stored?;
        match &outcome {
            Some(next) => info!(
                "alarm {id} dismissed; next occurrence {}",
                next.fire_time.to_rfc3339()
            ),
            None => info!("alarm {id} dismissed and removed"),
        }
        Ok(outcome)
    }

    /// Re-arms every pending alarm in the store. Only the first pass in a
    /// process resets alarms left Firing; later passes just re-arm.
    ///
    /// Each record is re-read under its alarm lock, so an alarm dismissed
    /// while recovery runs stays dismissed. A failure on one record is
    /// logged and does not stop the others.
    pub async fn recover(&self) -> Result<RecoveryReport, EngineError> {
        let first_pass = !self.recovered.swap(true, Ordering::SeqCst);
        if !first_pass {
            info!("boot recovery already ran; re-arming pending alarms only");
        }

        let ids: Vec<i64> = self
            .db
            .list_alarms()
            .await?
            .into_iter()
            .map(|alarm| alarm.id)
            .collect();
        let mut report = RecoveryReport::default();

        for id in ids {
            let _lock = self.locks.acquire(id).await;
            let alarm = match self.db.get_alarm(id).await {
                Ok(Some(alarm)) => alarm,
                Ok(None) => {
                    debug!("alarm {id} was removed before recovery reached it");
                    continue;
                }
                Err(err) => {
                    error!("recovery of alarm {id} failed: {err:#}");
                    report.skipped.push(id);
                    continue;
                }
            };

            match recover_record(
                &self.db,
                self.scheduler.as_ref(),
                self.clock.as_ref(),
                alarm,
                first_pass,
            )
            .await
            {
                Ok(outcome) => report.record(id, outcome),
                Err(err) => {
                    error!("recovery of alarm {id} failed: {err:#}");
                    report.skipped.push(id);
                }
            }
        }

        info!(
            "boot recovery: {} re-armed, {} re-fired, {} skipped",
            report.rearmed.len(),
            report.refired.len(),
            report.skipped.len()
        );
        Ok(report)
    }

    pub async fn scheduled_alarms(&self) -> Result<Vec<AlarmRecord>, EngineError> {
        Ok(self.db.list_alarms().await?)
    }

    /// Answers a listing request with an [`AppEvent::Alarms`] snapshot.
    pub async fn publish_alarms(&self) -> Result<(), EngineError> {
        let alarms = self.scheduled_alarms().await?;
        self.emitter
            .emit(AppEvent::Alarms { alarms })
            .map_err(EngineError::DispatcherFailure)
    }

    /// Shows a notification right away without storing or scheduling
    /// anything. Returns the id the notification was shown under.
    pub fn send_notification(&self, mut payload: AlarmPayload) -> Result<i64, EngineError> {
        if payload.title.trim().is_empty() {
            return Err(EngineError::MalformedEvent("notification title is empty".into()));
        }
        payload.volume = payload.volume.clamp(0.0, 1.0);

        let id = self.next_adhoc_id.fetch_sub(1, Ordering::SeqCst);
        self.dispatcher
            .show_notification(id, &payload)
            .map_err(EngineError::DispatcherFailure)?;
        if payload.play_sound {
            self.dispatcher
                .play_sound(&payload)
                .map_err(EngineError::DispatcherFailure)?;
        }
        info!("notification {id} sent: {}", payload.title);
        Ok(id)
    }

    /// Silences whatever is ringing. Alarm state is left untouched.
    pub fn stop_sound(&self) -> Result<(), EngineError> {
        self.dispatcher
            .stop_sound()
            .map_err(EngineError::DispatcherFailure)
    }

    /// Removes every visible notification. Alarm state is left untouched.
    pub fn clear_all_notifications(&self) -> Result<(), EngineError> {
        self.dispatcher
            .clear_all_notifications()
            .map_err(EngineError::DispatcherFailure)
    }

    async fn load(&self, id: i64) -> Result<AlarmRecord, EngineError> {
        self.db
            .get_alarm(id)
            .await?
            .ok_or(EngineError::NotFound(id))
    }

    fn check(&self, alarm: &AlarmRecord, input: LifecycleInput) -> Result<AlarmStatus, EngineError> {
        transition(alarm.status, input).ok_or(EngineError::InvalidTransition {
            id: alarm.id,
            status: alarm.status,
            input: input.as_str(),
        })
    }

    fn arm_or_log(&self, id: i64, alarm: &AlarmRecord) {
        if let Err(err) = self.scheduler.arm(id, alarm.fire_time) {
            error!("alarm {id}: {}", EngineError::SchedulerFailure(err));
        }
    }

    /// Stops the sound and removes the notification. Failures are logged; a
    /// failed stop is retried when `sound` drops.
    fn silence(&self, id: i64, sound: &mut SoundGuard) {
        if let Err(err) = sound.stop() {
            error!("alarm {id}: {}", EngineError::DispatcherFailure(err));
        }
        if let Err(err) = self.dispatcher.clear_notification(id) {
            error!("alarm {id}: {}", EngineError::DispatcherFailure(err));
        }
        debug!("alarm {id} silenced");
    }
}
