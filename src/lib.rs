pub mod bridge;
pub mod db;
pub mod engine;
pub mod events;
pub mod recovery;
pub mod scheduler;
pub mod settings;
mod utils;

use std::sync::Arc;

use anyhow::{Context, Result};
use log::{error, info, warn};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    sync::mpsc,
};

use db::Database;
use engine::{AlarmEngine, ChannelEmitter, LogDispatcher};
use events::AlarmEvent;
use scheduler::{Clock, SystemClock, TokioScheduler};
use settings::SettingsStore;

pub fn run() -> Result<()> {
    // Initialize logging (reads RUST_LOG env var)
    let default_level = if settings::debug_enabled() {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(default_level)
        .parse_default_env()
        .init();

    info!("alarmkit starting up...");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("alarmkit")
        .build()
        .context("failed to build tokio runtime")?;

    runtime.block_on(serve())
}

async fn serve() -> Result<()> {
    let settings_store = SettingsStore::from_env()?;
    let settings = settings_store.settings().clone();
    let database = Database::new(settings_store.database_path())?;
    info!(
        "settings from {}, alarms in {}",
        settings_store.path().display(),
        database
            .path()
            .map_or_else(|| "memory".to_string(), |path| path.display().to_string())
    );

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<AlarmEvent>();
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let scheduler = Arc::new(TokioScheduler::new(Arc::clone(&clock), event_tx)?);
    let (emitter, mut app_events) = ChannelEmitter::channel();

    let engine = AlarmEngine::new(
        database,
        scheduler,
        Arc::new(LogDispatcher),
        Arc::new(emitter),
        clock,
    );

    // Re-arm everything that was pending when the process last exited.
    if settings.recover_on_start {
        engine.handle_event(AlarmEvent::BootCompleted).await;
    }

    tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(event) = app_events.recv().await {
            let line = match bridge::encode_app_event(&event) {
                Ok(line) => line,
                Err(err) => {
                    error!("{err:#}");
                    continue;
                }
            };
            if let Err(err) = stdout.write_all(line.as_bytes()).await {
                error!("failed to write app event: {err}");
            }
            if let Err(err) = stdout.flush().await {
                error!("failed to flush app event: {err}");
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            Some(event) = event_rx.recv() => spawn_handler(&engine, event),
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => match bridge::parse_event_line(&line) {
                    Ok(Some(event)) => spawn_handler(&engine, bridge::apply_defaults(event, &settings)),
                    Ok(None) => {}
                    Err(err) => warn!("{err}"),
                },
                Ok(None) => {
                    stdin_open = false;
                    info!("stdin closed; still serving scheduled alarms (ctrl-c to exit)");
                }
                Err(err) => {
                    stdin_open = false;
                    error!("failed to read stdin: {err}");
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("alarmkit shutting down");
                break;
            }
        }
    }

    Ok(())
}

/// Each event gets its own task; the engine serializes per alarm id.
fn spawn_handler(engine: &AlarmEngine, event: AlarmEvent) {
    let engine = engine.clone();
    tokio::spawn(async move {
        engine.handle_event(event).await;
    });
}
