use std::io;

use thiserror::Error;

/// The fatal error kinds this crate can surface. Queue termination
/// ("closed"/"canceled") is deliberately not a variant here (it is clean
/// end-of-stream, represented as `Option::None`, never an `Err`).
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("network error: {0}")]
    Network(String),
}

pub type StreamResult<T> = Result<T, StreamError>;
