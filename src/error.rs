//! Error taxonomy shared by sensors and the publisher.
//!
//! Errors never cross a component boundary: `RateLimitedSource` and
//! `Publisher` log them and fall back to a benign value. Only constructors
//! (settings loaders, `RateLimitedSource::open`, `GhostClient::connect`)
//! hand a `PipelineError` back to the caller.

use std::io;
use thiserror::Error;

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Settings document missing or corrupt
    #[error("config error in '{path}': {message}")]
    Config { path: String, message: String },

    /// Network or connection failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Non-success response or provider-side failure
    #[error("remote api error (status {status}): {message}")]
    RemoteApi { status: u16, message: String },

    /// Record is missing a required field
    #[error("invalid record: missing {field}")]
    Validation { field: &'static str },

    /// Buffer or settings file could not be read or written
    #[error("storage error at '{path}': {source}")]
    Storage {
        path: String,
        #[source]
        source: io::Error,
    },
}

impl PipelineError {
    pub fn config(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn remote(status: u16, message: impl Into<String>) -> Self {
        Self::RemoteApi {
            status,
            message: message.into(),
        }
    }

    pub fn storage(path: impl Into<String>, source: io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }

    /// Wraps a (de)serialization failure of a stored document as a storage error.
    pub fn corrupt(path: impl Into<String>, err: serde_json::Error) -> Self {
        Self::storage(path, io::Error::new(io::ErrorKind::InvalidData, err))
    }
}

impl From<reqwest::Error> for PipelineError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => Self::remote(status.as_u16(), e.to_string()),
            None if e.is_decode() => Self::remote(0, format!("undecodable response: {e}")),
            None => Self::Transport(e.to_string()),
        }
    }
}
