use std::path::PathBuf;
use std::{io, result};
use thiserror::Error;

/// The result type of logging operations.
pub type Result<T> = result::Result<T, Error>;

/// The errors of the logging crate.
#[derive(Debug, Error)]
pub enum Error {
    #[error("a logger instance has already been initialized")]
    AlreadyInitialized,
    #[error("logging config {0:?} does not exist")]
    NotFound(PathBuf),
    #[error("log level {0} is invalid")]
    InvalidLevel(String),
    #[error("configuration is invalid, {0}")]
    InvalidConfig(String),
    #[error("an io error occurred, {0}")]
    Io(io::Error),
}

impl PartialEq for Error {
    fn eq(&self, other: &Error) -> bool {
        match (self, other) {
            (Error::AlreadyInitialized, Error::AlreadyInitialized) => true,
            (Error::NotFound(a), Error::NotFound(b)) => a == b,
            (Error::InvalidLevel(a), Error::InvalidLevel(b)) => a == b,
            (Error::InvalidConfig(_), Error::InvalidConfig(_)) => true,
            (Error::Io(a), Error::Io(b)) => a.kind() == b.kind(),
            _ => false,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}
