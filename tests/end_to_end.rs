//! Engine wired to the real tokio scheduler, with fire events pumped from
//! the scheduler channel the way the binary does it.

mod common;

use std::{sync::Arc, time::Duration as StdDuration};

use alarmkit_lib::{
    db::{AlarmRecord, AlarmStatus, Database},
    engine::{AlarmEngine, ChannelEmitter},
    events::{AlarmEvent, AppEvent, UserActionKind},
    scheduler::{ManualClock, Scheduler, TokioScheduler},
};
use chrono::Duration;
use common::{one_shot, payload, t0, Command, RecordingDispatcher};
use tokio::{sync::mpsc, time::timeout};

struct Rig {
    engine: AlarmEngine,
    db: Database,
    scheduler: Arc<TokioScheduler>,
    dispatcher: Arc<RecordingDispatcher>,
    clock: Arc<ManualClock>,
    fired: mpsc::UnboundedReceiver<AlarmEvent>,
    app_events: mpsc::UnboundedReceiver<AppEvent>,
}

fn build_rig(db: Database) -> Rig {
    let clock = Arc::new(ManualClock::new(t0()));
    let (tx, fired) = mpsc::unbounded_channel();
    let scheduler = Arc::new(TokioScheduler::new(clock.clone(), tx).unwrap());
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let (emitter, app_events) = ChannelEmitter::channel();
    let engine = AlarmEngine::new(
        db.clone(),
        scheduler.clone(),
        dispatcher.clone(),
        Arc::new(emitter),
        clock.clone(),
    );
    Rig {
        engine,
        db,
        scheduler,
        dispatcher,
        clock,
        fired,
        app_events,
    }
}

async fn next_fire(rig: &mut Rig) -> i64 {
    let event = timeout(StdDuration::from_secs(5), rig.fired.recv())
        .await
        .expect("no fire event within 5s")
        .expect("scheduler channel closed");
    match event {
        AlarmEvent::Fired { id } => id,
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn fire_then_dismiss_alarm_seven() {
    let mut rig = build_rig(Database::in_memory().unwrap());
    let fire_time = t0() + Duration::milliseconds(100);
    let record = AlarmRecord {
        id: 7,
        fire_time,
        anchor_time: fire_time,
        status: AlarmStatus::Scheduled,
        snooze_interval_secs: None,
        payload: payload(),
        recurs: None,
        created_at: t0(),
        updated_at: t0(),
    };
    rig.db.put_alarm(&record).await.unwrap();
    rig.scheduler.arm(7, fire_time).unwrap();

    let id = next_fire(&mut rig).await;
    assert_eq!(id, 7);
    rig.clock.set(fire_time);
    rig.engine.handle_event(AlarmEvent::Fired { id }).await;

    assert_eq!(rig.dispatcher.count(&Command::Show(7)), 1);
    let stored = rig.db.get_alarm(7).await.unwrap().unwrap();
    assert_eq!(stored.status, AlarmStatus::Firing);

    rig.engine
        .handle_event(AlarmEvent::UserAction {
            action: UserActionKind::Dismiss,
            id: 7,
        })
        .await;

    assert_eq!(rig.dispatcher.count(&Command::Stop), 1);
    assert_eq!(rig.dispatcher.count(&Command::Clear(7)), 1);
    assert!(rig.db.get_alarm(7).await.unwrap().is_none());
    assert!(!rig.scheduler.is_armed(7));
    assert_eq!(
        rig.app_events.try_recv().unwrap(),
        AppEvent::AlarmDismissed { id: 7 }
    );
    assert!(rig.app_events.try_recv().is_err());
}

#[tokio::test]
async fn snooze_refires_after_interval() {
    let mut rig = build_rig(Database::in_memory().unwrap());
    let alarm = rig
        .engine
        .create_alarm(one_shot(t0()).with_snooze_secs(1))
        .await
        .unwrap();

    let id = next_fire(&mut rig).await;
    rig.engine.handle_event(AlarmEvent::Fired { id }).await;
    rig.engine
        .handle_event(AlarmEvent::UserAction {
            action: UserActionKind::Snooze,
            id,
        })
        .await;
    assert!(rig.scheduler.is_armed(alarm.id));
    assert_eq!(
        rig.db.get_alarm(id).await.unwrap().unwrap().status,
        AlarmStatus::Snoozed
    );

    let id = next_fire(&mut rig).await;
    assert_eq!(id, alarm.id);
    rig.clock.advance(Duration::seconds(1));
    rig.engine.handle_event(AlarmEvent::Fired { id }).await;

    assert_eq!(
        rig.db.get_alarm(id).await.unwrap().unwrap().status,
        AlarmStatus::Firing
    );
    assert_eq!(rig.dispatcher.count(&Command::Show(id)), 2);
}

#[tokio::test]
async fn restart_recovers_elapsed_alarm_immediately() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("alarms.sqlite3");

    let alarm_id = {
        let rig = build_rig(Database::new(db_path.clone()).unwrap());
        let alarm = rig
            .engine
            .create_alarm(one_shot(t0() + Duration::hours(1)))
            .await
            .unwrap();
        alarm.id
    };

    // The device was off well past the alarm's fire time.
    let mut rig = build_rig(Database::new(db_path).unwrap());
    rig.clock.set(t0() + Duration::hours(3));
    rig.engine.handle_event(AlarmEvent::BootCompleted).await;

    let event = timeout(StdDuration::from_millis(500), rig.fired.recv())
        .await
        .expect("elapsed alarm was not fired on recovery")
        .unwrap();
    assert!(matches!(event, AlarmEvent::Fired { id } if id == alarm_id));

    rig.engine.handle_event(event).await;
    assert_eq!(
        rig.db.get_alarm(alarm_id).await.unwrap().unwrap().status,
        AlarmStatus::Firing
    );
}
