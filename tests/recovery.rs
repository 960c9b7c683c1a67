mod common;

use alarmkit_lib::{
    db::{AlarmStatus, Database},
    events::AlarmEvent,
};
use chrono::Duration;
use common::{one_shot, t0, Command, Harness};

#[tokio::test]
async fn rearms_scheduled_and_snoozed_alarms() {
    let h = Harness::new();
    let scheduled = h.engine.create_alarm(one_shot(t0())).await.unwrap();
    let snoozed = h
        .engine
        .create_alarm(one_shot(t0() + Duration::minutes(1)))
        .await
        .unwrap();

    h.clock.set(t0() + Duration::minutes(1));
    h.engine.on_fired(snoozed.id).await.unwrap();
    let snoozed = h.engine.snooze(snoozed.id).await.unwrap();

    h.scheduler.forget_all();
    let report = h.engine.recover().await.unwrap();

    assert_eq!(report.rearmed, vec![scheduled.id, snoozed.id]);
    assert!(report.refired.is_empty());
    assert_eq!(h.scheduler.armed_at(scheduled.id), Some(scheduled.fire_time));
    assert_eq!(h.scheduler.armed_at(snoozed.id), Some(snoozed.fire_time));
}

#[tokio::test]
async fn elapsed_alarm_is_armed_not_dropped() {
    let h = Harness::new();
    let alarm = h.engine.create_alarm(one_shot(t0())).await.unwrap();

    h.clock.set(t0() + Duration::hours(6));
    h.scheduler.forget_all();
    h.engine.handle_event(AlarmEvent::BootCompleted).await;

    // Arming an elapsed time is the scheduler's cue to fire immediately.
    assert_eq!(h.scheduler.armed_at(alarm.id), Some(t0()));
    let fired = h.engine.on_fired(alarm.id).await.unwrap();
    assert_eq!(fired.status, AlarmStatus::Firing);
}

#[tokio::test]
async fn firing_alarm_is_reset_and_refired_now() {
    let h = Harness::new();
    let alarm = h.engine.create_alarm(one_shot(t0())).await.unwrap();
    h.clock.set(t0());
    h.engine.on_fired(alarm.id).await.unwrap();

    let restart = t0() + Duration::minutes(42);
    h.clock.set(restart);
    h.scheduler.forget_all();
    h.dispatcher.reset();

    let report = h.engine.recover().await.unwrap();
    assert_eq!(report.refired, vec![alarm.id]);

    let stored = h.db.get_alarm(alarm.id).await.unwrap().unwrap();
    assert_eq!(stored.status, AlarmStatus::Scheduled);
    assert_eq!(stored.fire_time, restart);
    assert_eq!(h.scheduler.armed_at(alarm.id), Some(restart));

    h.engine.on_fired(alarm.id).await.unwrap();
    assert_eq!(h.dispatcher.count(&Command::Show(alarm.id)), 1);
}

#[tokio::test]
async fn second_pass_rearms_but_leaves_ringing_alarm_alone() {
    let h = Harness::new();
    let ringing = h.engine.create_alarm(one_shot(t0())).await.unwrap();
    let pending = h
        .engine
        .create_alarm(one_shot(t0() + Duration::hours(1)))
        .await
        .unwrap();
    h.engine.handle_event(AlarmEvent::BootCompleted).await;

    h.clock.set(t0());
    h.engine.on_fired(ringing.id).await.unwrap();
    h.dispatcher.reset();
    h.scheduler.forget_all();

    h.clock.advance(Duration::minutes(5));
    let report = h.engine.recover().await.unwrap();

    assert_eq!(report.rearmed, vec![pending.id]);
    assert!(report.refired.is_empty());
    assert_eq!(report.skipped, vec![ringing.id]);

    let stored = h.db.get_alarm(ringing.id).await.unwrap().unwrap();
    assert_eq!(stored.status, AlarmStatus::Firing);
    assert_eq!(stored.fire_time, t0());
    assert!(h.scheduler.armed_at(ringing.id).is_none());
    assert!(h.dispatcher.commands().is_empty());
}

#[tokio::test]
async fn stray_dismissed_record_is_skipped() {
    let h = Harness::new();
    let mut alarm = h.engine.create_alarm(one_shot(t0())).await.unwrap();
    alarm.status = AlarmStatus::Dismissed;
    h.db.put_alarm(&alarm).await.unwrap();
    h.scheduler.forget_all();

    let report = h.engine.recover().await.unwrap();
    assert_eq!(report.skipped, vec![alarm.id]);
    assert!(h.scheduler.armed_at(alarm.id).is_none());
}

#[tokio::test]
async fn arm_failure_on_one_record_does_not_stop_the_rest() {
    use std::sync::atomic::Ordering;

    let h = Harness::new();
    let first = h.engine.create_alarm(one_shot(t0())).await.unwrap();
    let second = h.engine.create_alarm(one_shot(t0())).await.unwrap();

    h.scheduler.forget_all();
    h.scheduler.fail_arm.store(true, Ordering::SeqCst);
    let report = h.engine.recover().await.unwrap();

    assert_eq!(report.skipped, vec![first.id, second.id]);
    assert!(report.rearmed.is_empty());
}

#[tokio::test]
async fn alarms_survive_process_restart() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("nested").join("alarms.sqlite3");

    let (kept, removed) = {
        let mut h = Harness::with_database(Database::new(db_path.clone()).unwrap());
        let kept = h.engine.create_alarm(one_shot(t0())).await.unwrap();
        let removed = h.engine.create_alarm(one_shot(t0())).await.unwrap();

        h.clock.set(t0());
        h.engine.on_fired(removed.id).await.unwrap();
        h.engine.dismiss(removed.id).await.unwrap();
        assert_eq!(h.dismissals().len(), 1);
        (kept, removed)
    };

    let h = Harness::with_database(Database::new(db_path.clone()).unwrap());
    assert_eq!(h.db.path(), Some(db_path.as_path()));
    assert!(h.db.get_alarm(removed.id).await.unwrap().is_none());
    assert_eq!(h.db.get_alarm(kept.id).await.unwrap(), Some(kept.clone()));

    let report = h.engine.recover().await.unwrap();
    assert_eq!(report.rearmed, vec![kept.id]);
    assert_eq!(h.scheduler.armed_at(kept.id), Some(t0()));
}
