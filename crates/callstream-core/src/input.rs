//! Media input handed to the transcoder

use std::fmt;
use std::path::Path;
use std::pin::Pin;

use tokio::io::AsyncRead;

use crate::error::StreamError;

/// In-process byte stream fed to the transcoder on stdin
pub type ByteStream = Pin<Box<dyn AsyncRead + Send>>;

/// What ffmpeg reads from: a local path / URL, or an in-process byte stream.
pub enum MediaSource {
    Location(String),
    Stream(ByteStream),
}

impl MediaSource {
    pub fn location(location: impl Into<String>) -> Self {
        MediaSource::Location(location.into())
    }

    pub fn stream<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + 'static,
    {
        MediaSource::Stream(Box::pin(reader))
    }

    pub fn as_location(&self) -> Option<&str> {
        match self {
            MediaSource::Location(location) => Some(location.as_str()),
            MediaSource::Stream(_) => None,
        }
    }

    pub fn is_stream(&self) -> bool {
        matches!(self, MediaSource::Stream(_))
    }

    /// HTTP or HTTPS source (the `http` prefix covers both)
    pub fn is_http(&self) -> bool {
        self.as_location()
            .is_some_and(|location| location.starts_with("http"))
    }

    /// HLS playlist (`.m3u8` / `.m3u`) source
    pub fn is_hls(&self) -> bool {
        self.as_location()
            .is_some_and(|location| location.contains("m3u"))
    }

    pub fn is_rtsp(&self) -> bool {
        self.as_location()
            .is_some_and(|location| location.starts_with("rtsp://"))
    }

    /// Value passed to ffmpeg's `-i`
    pub fn input_arg(&self) -> &str {
        match self {
            MediaSource::Location(location) => location.as_str(),
            MediaSource::Stream(_) => "pipe:0",
        }
    }

    pub fn validate(&self) -> Result<(), StreamError> {
        match self {
            MediaSource::Location(location) if location.trim().is_empty() => Err(
                StreamError::InvalidInput("input location is empty".to_string()),
            ),
            _ => Ok(()),
        }
    }

    pub fn into_stream(self) -> Option<ByteStream> {
        match self {
            MediaSource::Location(_) => None,
            MediaSource::Stream(reader) => Some(reader),
        }
    }
}

impl fmt::Debug for MediaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaSource::Location(location) => f.debug_tuple("Location").field(location).finish(),
            MediaSource::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl fmt::Display for MediaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaSource::Location(location) => f.write_str(location),
            MediaSource::Stream(_) => f.write_str("<stream>"),
        }
    }
}

impl From<&str> for MediaSource {
    fn from(location: &str) -> Self {
        MediaSource::location(location)
    }
}

impl From<String> for MediaSource {
    fn from(location: String) -> Self {
        MediaSource::Location(location)
    }
}

impl From<&Path> for MediaSource {
    fn from(path: &Path) -> Self {
        MediaSource::Location(path.to_string_lossy().into_owned())
    }
}
