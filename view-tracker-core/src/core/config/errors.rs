use std::result;
use thiserror::Error;

/// The result type of configuration operations.
pub type Result<T> = result::Result<T, ConfigError>;

/// The errors which can occur while building the tracker settings.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    /// The completion fraction is outside the `[0, 1]` range.
    #[error("completed at value {0} is invalid, expected a value between 0 and 1")]
    InvalidCompletion(f64),
    /// The initial seek limit is negative or not a finite number.
    #[error("initial seek limit {0} is invalid")]
    InvalidSeekLimit(f64),
    /// The seek detection threshold is negative or not a finite number.
    #[error("seek detection threshold {0} is invalid")]
    InvalidSeekThreshold(f64),
    /// The update url could not be parsed.
    #[error("update url {0} is invalid, {1}")]
    InvalidUrl(String, String),
    /// The given value is not a known option of the setting.
    #[error("{0} is not a supported {1}")]
    UnsupportedValue(String, &'static str),
}
