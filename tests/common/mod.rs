#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};

use alarmkit_lib::{
    db::{AlarmPayload, Database, NewAlarm},
    engine::{AlarmEngine, ChannelEmitter, Dispatcher},
    events::AppEvent,
    scheduler::{ManualClock, Scheduler},
};
use anyhow::{bail, Result};
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::mpsc;

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 7, 0, 0).unwrap()
}

pub fn payload() -> AlarmPayload {
    AlarmPayload::new("Alarm", "Stand up")
}

pub fn one_shot(fire_time: DateTime<Utc>) -> NewAlarm {
    NewAlarm::once(fire_time, payload()).with_snooze_secs(300)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Show(i64),
    Clear(i64),
    ClearAll,
    Play,
    Stop,
}

#[derive(Default)]
pub struct RecordingDispatcher {
    commands: Mutex<Vec<Command>>,
    pub fail_show: AtomicBool,
    pub fail_clear: AtomicBool,
}

impl RecordingDispatcher {
    pub fn commands(&self) -> Vec<Command> {
        self.commands.lock().unwrap().clone()
    }

    pub fn count(&self, command: &Command) -> usize {
        self.commands().iter().filter(|c| *c == command).count()
    }

    pub fn reset(&self) {
        self.commands.lock().unwrap().clear();
    }

    fn record(&self, command: Command) {
        self.commands.lock().unwrap().push(command);
    }
}

impl Dispatcher for RecordingDispatcher {
    fn show_notification(&self, id: i64, _payload: &AlarmPayload) -> Result<()> {
        self.record(Command::Show(id));
        if self.fail_show.load(Ordering::SeqCst) {
            bail!("notification service unavailable");
        }
        Ok(())
    }

    fn clear_notification(&self, id: i64) -> Result<()> {
        self.record(Command::Clear(id));
        if self.fail_clear.load(Ordering::SeqCst) {
            bail!("notification service unavailable");
        }
        Ok(())
    }

    fn clear_all_notifications(&self) -> Result<()> {
        self.record(Command::ClearAll);
        Ok(())
    }

    fn play_sound(&self, _payload: &AlarmPayload) -> Result<()> {
        self.record(Command::Play);
        Ok(())
    }

    fn stop_sound(&self) -> Result<()> {
        self.record(Command::Stop);
        Ok(())
    }
}

/// In-memory scheduler that only records what is armed.
#[derive(Default)]
pub struct RecordingScheduler {
    armed: Mutex<HashMap<i64, DateTime<Utc>>>,
    arm_calls: Mutex<Vec<(i64, DateTime<Utc>)>>,
    pub fail_arm: AtomicBool,
}

impl RecordingScheduler {
    pub fn armed_at(&self, id: i64) -> Option<DateTime<Utc>> {
        self.armed.lock().unwrap().get(&id).copied()
    }

    pub fn arm_calls(&self) -> Vec<(i64, DateTime<Utc>)> {
        self.arm_calls.lock().unwrap().clone()
    }

    /// Drops every pending trigger, as a process restart would.
    pub fn forget_all(&self) {
        self.armed.lock().unwrap().clear();
        self.arm_calls.lock().unwrap().clear();
    }
}

impl Scheduler for RecordingScheduler {
    fn arm(&self, id: i64, fire_time: DateTime<Utc>) -> Result<()> {
        if self.fail_arm.load(Ordering::SeqCst) {
            bail!("alarm service rejected trigger");
        }
        self.arm_calls.lock().unwrap().push((id, fire_time));
        self.armed.lock().unwrap().insert(id, fire_time);
        Ok(())
    }

    fn disarm(&self, id: i64) -> Result<()> {
        self.armed.lock().unwrap().remove(&id);
        Ok(())
    }

    fn is_armed(&self, id: i64) -> bool {
        self.armed.lock().unwrap().contains_key(&id)
    }
}

pub struct Harness {
    pub engine: AlarmEngine,
    pub db: Database,
    pub dispatcher: Arc<RecordingDispatcher>,
    pub scheduler: Arc<RecordingScheduler>,
    pub clock: Arc<ManualClock>,
    pub app_events: mpsc::UnboundedReceiver<AppEvent>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_database(Database::in_memory().unwrap())
    }

    pub fn with_database(db: Database) -> Self {
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let scheduler = Arc::new(RecordingScheduler::default());
        let clock = Arc::new(ManualClock::new(t0() - chrono::Duration::hours(1)));
        let (emitter, app_events) = ChannelEmitter::channel();

        let engine = AlarmEngine::new(
            db.clone(),
            scheduler.clone(),
            dispatcher.clone(),
            Arc::new(emitter),
            clock.clone(),
        );

        Self {
            engine,
            db,
            dispatcher,
            scheduler,
            clock,
            app_events,
        }
    }

    pub fn dismissals(&mut self) -> Vec<AppEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.app_events.try_recv() {
            events.push(event);
        }
        events
    }
}
