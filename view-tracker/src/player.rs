use crate::errors::{Error, Result};
use async_trait::async_trait;
use fx_callback::{Callback, MultiThreadedCallback, Subscriber, Subscription};
use log::{debug, info, trace};
use serde::Deserialize;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use tokio::select;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use view_tracker_core::core::players::{PlayerError, PlayerEvent, VideoPlayer};

/// The metadata of the scripted video.
/// Missing values are reported as unavailable by the player.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ScriptedVideo {
    pub id: Option<String>,
    pub title: Option<String>,
    pub duration: Option<f64>,
}

/// A player action within the playback script.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ScriptedAction {
    Play,
    Pause,
    TimeUpdate { seconds: f64, duration: f64 },
}

impl From<&ScriptedAction> for PlayerEvent {
    fn from(value: &ScriptedAction) -> Self {
        match value {
            ScriptedAction::Play => PlayerEvent::Play,
            ScriptedAction::Pause => PlayerEvent::Pause,
            ScriptedAction::TimeUpdate { seconds, duration } => PlayerEvent::TimeUpdate {
                seconds: *seconds,
                duration: *duration,
            },
        }
    }
}

/// A player action which is emitted at the given offset since the start of the replay.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScriptedEvent {
    pub at_ms: u64,
    #[serde(flatten)]
    pub action: ScriptedAction,
}

/// A recorded playback session.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PlaybackScript {
    #[serde(default)]
    pub video: ScriptedVideo,
    #[serde(default)]
    pub events: Vec<ScriptedEvent>,
}

impl PlaybackScript {
    /// Read the playback script from the given json file.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::ScriptIo(path.to_path_buf(), e))?;

        Self::from_json(contents.as_str())
    }

    /// Parse the playback script from the given json.
    pub fn from_json(json: &str) -> Result<Self> {
        let script: PlaybackScript =
            serde_json::from_str(json).map_err(|e| Error::InvalidScript(e.to_string()))?;

        if script
            .events
            .windows(2)
            .any(|e| e[1].at_ms < e[0].at_ms)
        {
            return Err(Error::InvalidScript(
                "events must be ordered by their offset".to_string(),
            ));
        }

        Ok(script)
    }
}

/// A video player which replays a recorded playback script.
///
/// Corrective seeks issued by the tracker are recorded, the script itself is never altered by them.
#[derive(Debug)]
pub struct ScriptedPlayer {
    script: PlaybackScript,
    corrections: Mutex<Vec<f64>>,
    callbacks: MultiThreadedCallback<PlayerEvent>,
}

impl ScriptedPlayer {
    pub fn new(script: PlaybackScript) -> Self {
        Self {
            script,
            corrections: Default::default(),
            callbacks: MultiThreadedCallback::new(),
        }
    }

    /// Returns the positions to which the tracker moved the player back.
    pub fn corrections(&self) -> Vec<f64> {
        self.corrections
            .lock()
            .map(|e| e.clone())
            .unwrap_or_default()
    }

    /// Emit the scripted events at their offsets.
    /// This future completes when all events have been emitted, or the replay has been cancelled.
    pub async fn replay(&self, cancellation_token: &CancellationToken) {
        let start = Instant::now();

        for event in self.script.events.iter() {
            select! {
                _ = cancellation_token.cancelled() => {
                    debug!("Playback script replay has been cancelled");
                    return;
                },
                _ = time::sleep_until(start + Duration::from_millis(event.at_ms)) => {},
            }

            let event = PlayerEvent::from(&event.action);
            trace!("Emitting scripted player event {}", event);
            self.callbacks.invoke(event);
        }

        debug!("Playback script replay has completed");
    }

    fn unavailable(metadata: &'static str) -> PlayerError {
        PlayerError::Metadata(metadata, "not present in the playback script".to_string())
    }
}

#[async_trait]
impl VideoPlayer for ScriptedPlayer {
    async fn ready(&self) -> std::result::Result<(), PlayerError> {
        Ok(())
    }

    async fn video_id(&self) -> std::result::Result<String, PlayerError> {
        self.script
            .video
            .id
            .clone()
            .ok_or_else(|| Self::unavailable("id"))
    }

    async fn video_title(&self) -> std::result::Result<String, PlayerError> {
        self.script
            .video
            .title
            .clone()
            .ok_or_else(|| Self::unavailable("title"))
    }

    async fn duration(&self) -> std::result::Result<f64, PlayerError> {
        self.script
            .video
            .duration
            .ok_or_else(|| Self::unavailable("duration"))
    }

    async fn set_current_time(&self, seconds: f64) -> std::result::Result<(), PlayerError> {
        info!("Player has been moved back to {} seconds", seconds);
        self.corrections
            .lock()
            .map_err(|e| PlayerError::Command(e.to_string()))?
            .push(seconds);
        Ok(())
    }
}

impl Callback<PlayerEvent> for ScriptedPlayer {
    fn subscribe(&self) -> Subscription<PlayerEvent> {
        self.callbacks.subscribe()
    }

    fn subscribe_with(&self, subscriber: Subscriber<PlayerEvent>) {
        self.callbacks.subscribe_with(subscriber)
    }
}
