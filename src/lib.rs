pub mod audio;
pub mod commands;
pub mod config;
pub mod error;
pub mod events;
pub mod models;
pub mod session;
pub mod source;
pub mod util;
pub mod view;

use audio::player::NativeEngine;
use audio::queue::TrackSequencer;
use commands::{parse_command, PlayerHandle, UserIntent};
use config::AppConfig;
use error::{AppError, AppResult};
use events::PlayerEvent;
use session::PlayerSession;
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use view::PlayerView;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

pub fn run() {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("driveplayer=info"),
    )
    .init();

    // Panic reports go to ~/.driveplayer/crash.log as well as stderr.
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        if let Ok(dir) = AppConfig::config_dir() {
            let _ = append_crash_log(&dir.join("crash.log"), &format!("{}\n", info));
        }
        default_hook(info);
    }));

    if let Err(e) = try_run() {
        log::error!("driveplayer stopped: {}", e);
        std::process::exit(1);
    }
}

fn append_crash_log(path: &Path, report: &str) -> std::io::Result<()> {
    use std::io::Write;
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    file.write_all(report.as_bytes())
}

fn load_config() -> AppConfig {
    AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config: {}. Using defaults.", e);
        let default_config = AppConfig::default()
            .with_api_key_override(std::env::var(config::API_KEY_ENV).ok());
        // Save defaults so the config file exists for next launch
        if let Err(save_err) = default_config.save() {
            log::error!("Failed to save default config: {}", save_err);
        }
        default_config
    })
}

fn try_run() -> AppResult<()> {
    let config = load_config();
    config.validate()?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let result = runtime.block_on(async move {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        let engine = NativeEngine::new(client)?;
        if !NativeEngine::has_output_device() {
            log::warn!("No audio output device found; playback will be rejected");
        }

        let sequencer = TrackSequencer::new(config.playlist.clone())?;
        let (session, handle) = PlayerSession::new(
            engine,
            config.resolver(),
            sequencer,
            config.session_options(),
        );

        log::info!(
            "Loaded {} tracks ({:?} mode, api key {})",
            config.playlist.len(),
            config.source_mode,
            if config.credential().is_some() { "set" } else { "not set" }
        );
        log::info!("Commands: p play/pause, n next, b back, s <sec> seek, v <0..1> volume, +/- volume, m mute, r retry, q quit");

        let renderer = tokio::spawn(render_views(handle.clone()));
        let notifications = tokio::spawn(log_events(handle.clone()));
        let input = tokio::spawn(read_commands(handle));

        session.run().await;

        renderer.abort();
        notifications.abort();
        input.abort();
        Ok::<(), AppError>(())
    });
    // A pending stdin read must not keep the process alive.
    runtime.shutdown_timeout(Duration::from_secs(1));
    result
}

/// Logs the rendered player line whenever something other than the clock changes.
async fn render_views(handle: PlayerHandle) {
    let mut state = handle.watch();
    let mut last: Option<PlayerView> = None;

    while state.changed().await.is_ok() {
        let view = PlayerView::render(&state.borrow_and_update());
        let significant = match &last {
            Some(prev) => {
                prev.title != view.title
                    || prev.position != view.position
                    || prev.transport != view.transport
                    || prev.volume != view.volume
                    || prev.status != view.status
            }
            None => true,
        };
        if significant {
            log::info!("{}", view);
        } else {
            log::debug!("{}", view);
        }
        last = Some(view);
    }
}

async fn log_events(handle: PlayerHandle) {
    let mut rx = handle.subscribe();
    loop {
        match rx.recv().await {
            Ok(PlayerEvent::Failed(payload)) => {
                log::error!("{}: {}", events::PLAYBACK_FAILED, payload.message);
            }
            Ok(PlayerEvent::Progress(_)) => {}
            Ok(event) => match serde_json::to_string(&event) {
                Ok(json) => log::debug!("{} {}", event.name(), json),
                Err(e) => log::warn!("Failed to serialize {}: {}", event.name(), e),
            },
            Err(RecvError::Lagged(skipped)) => {
                log::debug!("Event log lagged, skipped {} events", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }
}

async fn read_commands(handle: PlayerHandle) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                log::info!("stdin closed");
                let _ = handle.shutdown();
                break;
            }
            Err(e) => {
                log::error!("Failed to read command: {}", e);
                break;
            }
        };

        let Some(intent) = parse_command(&line) else {
            if !line.trim().is_empty() {
                log::warn!("Unknown command: {:?}", line.trim());
            }
            continue;
        };
        let quitting = intent == UserIntent::Shutdown;
        if handle.dispatch(intent).is_err() || quitting {
            break;
        }
    }
}
