//! Collaborator traits
//!
//! The transport session, its stream writers and the codec framers live in the
//! caller's media library. This module defines the seams the pipeline drives them
//! through.

use async_trait::async_trait;
use bytes::Bytes;
use callstream_core::VideoCodec;

/// Sink for one kind of media (the transport's video or audio writer)
#[async_trait]
pub trait MediaSink: Send {
    /// Send one frame (or raw chunk) to the transport
    async fn send(&mut self, frame: Bytes) -> Result<(), anyhow::Error>;
}

/// Splits raw transcoder output into frames (e.g. H264 NAL units, IVF frames)
pub trait Framer: Send {
    /// Feed bytes read from the transcoder, returning any completed frames
    fn push(&mut self, chunk: &[u8]) -> Vec<Bytes>;

    /// Called once the transcoder output ends
    fn flush(&mut self) -> Vec<Bytes> {
        Vec::new()
    }
}

/// Caller-owned transport session
///
/// The session outlives a single pipeline: sinks are handed out per launch and
/// are never closed by the pipeline.
pub trait StreamTransport: Send + Sync {
    /// Framer matching the codec ffmpeg is asked to produce
    fn video_framer(&self, codec: VideoCodec) -> Box<dyn Framer>;

    fn video_sink(&self, fps: u32) -> Box<dyn MediaSink>;

    fn audio_sink(&self) -> Box<dyn MediaSink>;
}

/// Pass-through framer: every chunk read is forwarded as-is
#[derive(Debug, Default, Clone, Copy)]
pub struct RawChunks;

impl Framer for RawChunks {
    fn push(&mut self, chunk: &[u8]) -> Vec<Bytes> {
        if chunk.is_empty() {
            return Vec::new();
        }
        vec![Bytes::copy_from_slice(chunk)]
    }
}
