//! Callstream Media Processing Library
//!
//! This crate drives ffmpeg to turn a media input into the elementary video and
//! audio streams a call transport sends, and wraps ffprobe for input inspection.

pub mod command;
pub mod probe;
pub mod stream;
pub mod traits;

// Re-export commonly used types
pub use command::{ffmpeg_args, OutputTargets, BROWSER_USER_AGENT};
pub use probe::{input_has_audio, input_has_video, ProbeData, ProbeFormat, ProbeStream, Prober};
pub use stream::{RunningStream, StreamEnded, Streamer};
pub use traits::{Framer, MediaSink, RawChunks, StreamTransport};
