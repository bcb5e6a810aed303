//! Error types module
//!
//! All failures of a transcode pipeline are unified under [`StreamError`]. There is
//! no classification beyond what the caller needs to report the failure: the
//! pipeline either ended normally or it did not.

use std::io;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like bad arguments
    Debug,
    /// Warning level - for failures caused by the input media
    Warn,
    /// Error level - for unexpected failures
    Error,
}

#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cannot play video: {0}")]
    Transcode(String),

    #[error("Probe failed: {0}")]
    Probe(String),

    #[error("Sink error: {message}")]
    Sink {
        message: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl StreamError {
    pub fn sink(source: anyhow::Error) -> Self {
        StreamError::Sink {
            message: source.to_string(),
            source,
        }
    }

    /// Machine-readable error code (e.g., "TRANSCODE_FAILED")
    pub fn error_code(&self) -> &'static str {
        match self {
            StreamError::InvalidInput(_) => "INVALID_INPUT",
            StreamError::Config(_) => "CONFIG_ERROR",
            StreamError::Transcode(_) => "TRANSCODE_FAILED",
            StreamError::Probe(_) => "PROBE_FAILED",
            StreamError::Sink { .. } => "SINK_ERROR",
            StreamError::Io(_) => "IO_ERROR",
        }
    }

    pub fn log_level(&self) -> LogLevel {
        match self {
            StreamError::InvalidInput(_) | StreamError::Config(_) => LogLevel::Debug,
            StreamError::Transcode(_) | StreamError::Probe(_) => LogLevel::Warn,
            StreamError::Sink { .. } | StreamError::Io(_) => LogLevel::Error,
        }
    }
}

pub type StreamResult<T> = std::result::Result<T, StreamError>;
