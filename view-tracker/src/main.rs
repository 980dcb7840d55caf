use crate::args::TrackerArgs;
use crate::errors::Result;
use crate::player::{PlaybackScript, ScriptedPlayer};
use clap::Parser;
use fx_callback::{Callback, Subscription};
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::select;
use tokio::time;
use tokio_util::sync::CancellationToken;
use view_tracker_core::core::config::{TrackerSettings, TrackerSettingsBuilder};
use view_tracker_core::core::tracker::{TrackerEvent, VideoTracker};
use view_tracker_core::core::tracking::PlaybackState;
use view_tracker_logging::TrackerLogger;

mod args;
mod errors;
mod player;

/// The max time to wait for a pending update after the replay has ended.
const PENDING_UPDATE_TIMEOUT: Duration = Duration::from_secs(5);
/// The response field from which the session token is adopted.
const SESSION_HASH_FIELD: &str = "view_session_hash";

#[tokio::main]
async fn main() -> Result<()> {
    let args = TrackerArgs::parse();
    init_logger(&args)?;
    info!("Starting view tracker with {}", args);

    let script = PlaybackScript::from_file(&args.script).await?;
    let settings = with_update_callbacks(args.settings_builder()).build()?;
    let player = Arc::new(ScriptedPlayer::new(script));
    let shutdown = CancellationToken::new();

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received interrupt, stopping the replay");
            signal_token.cancel();
        }
    });

    let state = run(player.clone(), settings, &shutdown).await;
    info!(
        "Replay ended with a watch time of {} seconds, furthest reached {} of {} seconds, completed {}",
        state.total_watch_time, state.furthest_reached, state.duration, state.video_completed
    );
    let corrections = player.corrections();
    if !corrections.is_empty() {
        info!("Player has been moved back {} times", corrections.len());
    }

    Ok(())
}

fn init_logger(args: &TrackerArgs) -> Result<()> {
    let mut builder = TrackerLogger::builder();
    builder
        .root_level(args.log_level)
        .logger("hyper", log::LevelFilter::Info)
        .logger("hyper_util", log::LevelFilter::Info)
        .logger("reqwest", log::LevelFilter::Info)
        .logger("fx_callback", log::LevelFilter::Info);

    if let Some(path) = args.log_path.as_ref() {
        builder.log_path(path);
    }
    if let Some(path) = args.log_config.as_ref() {
        builder.config_path(path);
    }

    builder.build()?;
    Ok(())
}

/// Register the update callbacks which log the collector responses,
/// and adopt the session token returned by the collector.
fn with_update_callbacks(builder: TrackerSettingsBuilder) -> TrackerSettingsBuilder {
    builder
        .update_success_callback(Box::new(|tracker, response| {
            debug!("Collector accepted update with status {}", response.status);
            if let Some(hash) = response
                .json()
                .and_then(|e| e.get(SESSION_HASH_FIELD))
                .and_then(|e| e.as_str())
            {
                if hash != tracker.view_session_hash() {
                    info!("Adopting view session hash {}", hash);
                    tracker.set_view_session_hash(hash);
                }
            }
        }))
        .update_error_callback(Box::new(|_, error| {
            warn!("Collector update failed, {}", error);
        }))
}

/// Replay the script of the player through a new tracker.
/// It returns the final watch progress of the tracking session.
async fn run(
    player: Arc<ScriptedPlayer>,
    settings: TrackerSettings,
    shutdown: &CancellationToken,
) -> PlaybackState {
    let tracker = VideoTracker::builder()
        .player(player.clone())
        .settings(settings)
        .build();
    let mut events = tracker.subscribe();

    if wait_for_init(&mut events, shutdown).await {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                info!("Tracker event {}", event);
            }
        });

        player.replay(shutdown).await;
        wait_for_pending_update(&tracker, shutdown).await;
    }

    let state = tracker.state().await;
    tracker.close();
    state
}

async fn wait_for_init(events: &mut Subscription<TrackerEvent>, shutdown: &CancellationToken) -> bool {
    loop {
        select! {
            _ = shutdown.cancelled() => return false,
            event = events.recv() => match event {
                Some(event) if *event == TrackerEvent::InitEnd => return true,
                Some(event) => debug!("Tracker event {} received before initialization", event),
                None => return false,
            },
        }
    }
}

async fn wait_for_pending_update(tracker: &VideoTracker, shutdown: &CancellationToken) {
    if !tracker.is_update_in_flight() {
        return;
    }

    debug!("Waiting for the pending tracking update");
    select! {
        _ = shutdown.cancelled() => {},
        _ = time::sleep(PENDING_UPDATE_TIMEOUT) => warn!("Pending tracking update did not complete in time"),
        _ = async {
            while tracker.is_update_in_flight() {
                time::sleep(Duration::from_millis(50)).await;
            }
        } => {},
    }
}
