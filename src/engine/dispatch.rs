//! Collaborators the engine talks to but does not own: the notification and
//! sound layer, and the application that wants to hear about dismissals.

use anyhow::{anyhow, Result};
use log::info;
use tokio::sync::mpsc;

use crate::{db::AlarmPayload, events::AppEvent};

/// Renders notifications and plays alarm sounds. Commands are fire-and-forget:
/// the engine does not wait for the UI to catch up.
pub trait Dispatcher: Send + Sync {
    fn show_notification(&self, id: i64, payload: &AlarmPayload) -> Result<()>;
    fn clear_notification(&self, id: i64) -> Result<()>;
    fn clear_all_notifications(&self) -> Result<()>;
    fn play_sound(&self, payload: &AlarmPayload) -> Result<()>;
    fn stop_sound(&self) -> Result<()>;
}

/// Dispatcher for headless hosts: every command is only logged.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDispatcher;

impl Dispatcher for LogDispatcher {
    fn show_notification(&self, id: i64, payload: &AlarmPayload) -> Result<()> {
        info!(
            "notification {id} [{}]: {} - {}",
            payload.channel, payload.title, payload.message
        );
        Ok(())
    }

    fn clear_notification(&self, id: i64) -> Result<()> {
        info!("notification {id} cleared");
        Ok(())
    }

    fn clear_all_notifications(&self) -> Result<()> {
        info!("all notifications cleared");
        Ok(())
    }

    fn play_sound(&self, payload: &AlarmPayload) -> Result<()> {
        info!(
            "playing {} at volume {:.2} (loop: {})",
            payload.sound_name.as_deref().unwrap_or("default"),
            payload.volume.clamp(0.0, 1.0),
            payload.loop_sound
        );
        Ok(())
    }

    fn stop_sound(&self) -> Result<()> {
        info!("alarm sound stopped");
        Ok(())
    }
}

/// Outbound application events, passed to the engine at construction.
pub trait AppEventEmitter: Send + Sync {
    fn emit(&self, event: AppEvent) -> Result<()>;
}

/// Emitter that forwards events into a channel for the host to drain.
#[derive(Debug, Clone)]
pub struct ChannelEmitter {
    tx: mpsc::UnboundedSender<AppEvent>,
}

impl ChannelEmitter {
    pub fn new(tx: mpsc::UnboundedSender<AppEvent>) -> Self {
        Self { tx }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<AppEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl AppEventEmitter for ChannelEmitter {
    fn emit(&self, event: AppEvent) -> Result<()> {
        self.tx
            .send(event)
            .map_err(|err| anyhow!("failed to emit {:?}: receiver dropped", err.0))
    }
}
