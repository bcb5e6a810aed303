//! Callstream Core Library
//!
//! This crate provides the stream options, input classification, configuration
//! and error types shared by the processing pipeline and the CLI.

pub mod config;
pub mod error;
pub mod input;
pub mod options;

// Re-export commonly used types
pub use config::{validate_binary_path, Config};
pub use error::{LogLevel, StreamError, StreamResult};
pub use input::{ByteStream, MediaSource};
pub use options::{LaunchOptions, StreamOptions, VideoCodec};
