use crate::core::players::PlayerError;
use async_trait::async_trait;
use derive_more::Display;
use fx_callback::Callback;
use std::fmt::Debug;

/// The events emitted by a video player during playback.
#[derive(Debug, Display, Clone, PartialEq)]
pub enum PlayerEvent {
    /// Invoked when the playback has been started or resumed.
    #[display("playback started")]
    Play,
    /// Invoked when the playback has been paused.
    #[display("playback paused")]
    Pause,
    /// Invoked periodically with the current playback position in seconds,
    /// along with the duration of the video as known by the player.
    #[display("playback time {} of {}", seconds, duration)]
    TimeUpdate { seconds: f64, duration: f64 },
}

/// An embedded video player which can be tracked.
///
/// The player is an external collaborator, any implementation which is able to report
/// its lifecycle events through [PlayerEvent] can be tracked.
#[async_trait]
pub trait VideoPlayer: Debug + Callback<PlayerEvent> + Send + Sync {
    /// Wait for the player to be ready for use.
    ///
    /// # Returns
    ///
    /// It returns an error when the player can't be attached.
    async fn ready(&self) -> Result<(), PlayerError>;

    /// Retrieve the unique identifier of the loaded video.
    async fn video_id(&self) -> Result<String, PlayerError>;

    /// Retrieve the title of the loaded video.
    async fn video_title(&self) -> Result<String, PlayerError>;

    /// Retrieve the duration in seconds of the loaded video.
    async fn duration(&self) -> Result<f64, PlayerError>;

    /// Move the playback position to the given time in seconds.
    async fn set_current_time(&self, seconds: f64) -> Result<(), PlayerError>;
}
