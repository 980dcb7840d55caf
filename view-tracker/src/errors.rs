use std::path::PathBuf;
use std::{io, result};
use thiserror::Error;
use view_tracker_core::core::config::ConfigError;

/// The result type of the view tracker application.
pub type Result<T> = result::Result<T, Error>;

/// The errors which abort the view tracker application.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read playback script {0:?}, {1}")]
    ScriptIo(PathBuf, io::Error),
    #[error("playback script is invalid, {0}")]
    InvalidScript(String),
    #[error("tracker settings are invalid, {0}")]
    Settings(#[from] ConfigError),
    #[error("failed to initialize the logger, {0}")]
    Logging(#[from] view_tracker_logging::Error),
}
