use std::result;
use thiserror::Error;

/// The result type of update transport operations.
pub type Result<T> = result::Result<T, TransportError>;

/// The errors which can occur while delivering an update to the collector.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TransportError {
    /// The request could not be sent or no response has been received.
    #[error("failed to send update request, {0}")]
    Request(String),
    /// The collector responded with an unsuccessful status code.
    #[error("collector responded with status {0}, {1}")]
    Status(u16, String),
    /// The collector response could not be parsed.
    #[error("failed to parse collector response, {0}")]
    Parsing(String),
}
