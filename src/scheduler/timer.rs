use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard,
    },
    time::Duration,
};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tokio::{runtime::Handle, sync::mpsc, time::Instant};
use tokio_util::sync::CancellationToken;

use crate::events::AlarmEvent;

use super::{Clock, Scheduler};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

struct Trigger {
    generation: u64,
    token: CancellationToken,
}

type TriggerTable = Arc<Mutex<HashMap<i64, Trigger>>>;

fn lock_table(table: &Mutex<HashMap<i64, Trigger>>) -> MutexGuard<'_, HashMap<i64, Trigger>> {
    match table.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Scheduler backed by tokio timers: one sleeping task per armed alarm.
///
/// Fired alarms are pushed onto the event channel handed in at construction.
/// Timers live only as long as the process, which is why boot recovery
/// re-arms everything from the store on startup.
pub struct TokioScheduler {
    clock: Arc<dyn Clock>,
    events: mpsc::UnboundedSender<AlarmEvent>,
    triggers: TriggerTable,
    next_generation: AtomicU64,
    runtime: Handle,
}

impl TokioScheduler {
    /// Must be called from inside a tokio runtime; triggers are spawned onto it.
    pub fn new(clock: Arc<dyn Clock>, events: mpsc::UnboundedSender<AlarmEvent>) -> Result<Self> {
        let runtime =
            Handle::try_current().context("scheduler must be created inside a tokio runtime")?;
        Ok(Self {
            clock,
            events,
            triggers: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(1),
            runtime,
        })
    }

    pub fn pending_count(&self) -> usize {
        lock_table(&self.triggers).len()
    }
}

impl Scheduler for TokioScheduler {
    fn arm(&self, id: i64, fire_time: DateTime<Utc>) -> Result<()> {
        let delay = (fire_time - self.clock.now())
            .to_std()
            .unwrap_or(Duration::ZERO);
        let deadline = Instant::now()
            .checked_add(delay)
            .with_context(|| format!("fire time {} is too far away", fire_time.to_rfc3339()))?;
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        let token = CancellationToken::new();

        if let Some(previous) = lock_table(&self.triggers).insert(
            id,
            Trigger {
                generation,
                token: token.clone(),
            },
        ) {
            previous.token.cancel();
        }

        let triggers = Arc::clone(&self.triggers);
        let events = self.events.clone();

        self.runtime.spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => {
                    // A re-arm or disarm that raced the wakeup owns the slot now.
                    let still_current = {
                        let mut table = lock_table(&triggers);
                        match table.get(&id) {
                            Some(trigger) if trigger.generation == generation => {
                                table.remove(&id);
                                true
                            }
                            _ => false,
                        }
                    };

                    if still_current && events.send(AlarmEvent::Fired { id }).is_err() {
                        log_warn!("alarm {id} fired but the event receiver is gone");
                    }
                }
                _ = token.cancelled() => {}
            }
        });

        log_info!("armed alarm {id} for {} (in {}s)", fire_time.to_rfc3339(), delay.as_secs());
        Ok(())
    }

    fn disarm(&self, id: i64) -> Result<()> {
        if let Some(trigger) = lock_table(&self.triggers).remove(&id) {
            trigger.token.cancel();
            log_info!("disarmed alarm {id}");
        }
        Ok(())
    }

    fn is_armed(&self, id: i64) -> bool {
        lock_table(&self.triggers).contains_key(&id)
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        for (_, trigger) in lock_table(&self.triggers).drain() {
            trigger.token.cancel();
        }
    }
}
