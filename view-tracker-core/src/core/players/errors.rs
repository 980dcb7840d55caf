use thiserror::Error;

/// The errors which can be returned by a video player.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PlayerError {
    /// The player, or the element it should be attached to, is not available.
    #[error("video player is unavailable, {0}")]
    Unavailable(String),
    /// The requested metadata could not be retrieved from the player.
    #[error("failed to retrieve the video {0}, {1}")]
    Metadata(&'static str, String),
    /// The player failed to execute the given command.
    #[error("failed to execute player command, {0}")]
    Command(String),
}
