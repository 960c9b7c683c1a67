use std::sync::Arc;

use anyhow::Result;
use log::{debug, error};

use super::Dispatcher;

/// Keeps the alarm sound accountable for the length of a snooze or dismiss
/// handler. Unless [`SoundGuard::stop`] succeeds first, dropping the guard
/// stops the sound, so early returns and panics still silence the alarm.
pub struct SoundGuard {
    dispatcher: Arc<dyn Dispatcher>,
    id: i64,
    stopped: bool,
}

impl SoundGuard {
    pub fn new(dispatcher: Arc<dyn Dispatcher>, id: i64) -> Self {
        Self {
            dispatcher,
            id,
            stopped: false,
        }
    }

    /// On failure the guard stays armed and retries when dropped.
    pub fn stop(&mut self) -> Result<()> {
        self.dispatcher.stop_sound()?;
        self.stopped = true;
        Ok(())
    }
}

impl Drop for SoundGuard {
    fn drop(&mut self) {
        if self.stopped {
            return;
        }
        debug!("stopping sound for alarm {} on handler exit", self.id);
        if let Err(err) = self.dispatcher.stop_sound() {
            error!("fail-safe sound stop for alarm {} failed: {err:#}", self.id);
        }
    }
}
