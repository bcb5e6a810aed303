//! Transcode-and-stream pipeline
//!
//! ffmpeg writes each elementary stream to its own Unix socket; every socket is
//! pumped through the transport's framer into the matching sink.

mod launcher;
mod pump;

pub use launcher::{RunningStream, StreamEnded, Streamer};
