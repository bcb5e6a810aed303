use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use callstream_core::{LogLevel, StreamError, VideoCodec};
use callstream_processing::{Framer, MediaSink, RawChunks, StreamTransport};
use tokio::io::AsyncWriteExt;

/// Initialize tracing for CLI binaries.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

/// Log a pipeline error at the level its kind calls for.
pub fn report_error(err: &StreamError) {
    match err.log_level() {
        LogLevel::Debug => tracing::debug!(code = err.error_code(), "{}", err),
        LogLevel::Warn => tracing::warn!(code = err.error_code(), "{}", err),
        LogLevel::Error => tracing::error!(code = err.error_code(), "{}", err),
    }
}

/// Transport that writes each elementary stream to a file in `out_dir`.
///
/// Frames are written unmodified, so the video file is a playable raw
/// `.h264` / `.ivf` stream.
#[derive(Debug, Clone)]
pub struct FileTransport {
    out_dir: PathBuf,
    codec: VideoCodec,
}

impl FileTransport {
    pub fn new(out_dir: impl Into<PathBuf>, codec: VideoCodec) -> Self {
        Self {
            out_dir: out_dir.into(),
            codec,
        }
    }

    pub fn video_path(&self) -> PathBuf {
        self.out_dir.join(format!("video.{}", self.codec.muxer()))
    }

    pub fn audio_path(&self) -> PathBuf {
        self.out_dir.join("audio.raw")
    }
}

impl StreamTransport for FileTransport {
    fn video_framer(&self, _codec: VideoCodec) -> Box<dyn Framer> {
        Box::new(RawChunks)
    }

    fn video_sink(&self, fps: u32) -> Box<dyn MediaSink> {
        tracing::debug!(fps, path = %self.video_path().display(), "Writing video");
        Box::new(FileSink::new(self.video_path()))
    }

    fn audio_sink(&self) -> Box<dyn MediaSink> {
        Box::new(FileSink::new(self.audio_path()))
    }
}

/// Appends every frame to a file, created on the first frame
pub struct FileSink {
    path: PathBuf,
    file: Option<tokio::fs::File>,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl MediaSink for FileSink {
    async fn send(&mut self, frame: Bytes) -> Result<(), anyhow::Error> {
        let file = match self.file.take() {
            Some(file) => file,
            None => tokio::fs::File::create(&self.path).await.map_err(|e| {
                anyhow::anyhow!("Failed to create {}: {}", self.path.display(), e)
            })?,
        };
        let file = self.file.insert(file);
        file.write_all(&frame).await?;
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_follow_codec() {
        let h264 = FileTransport::new("/tmp/out", VideoCodec::H264);
        assert_eq!(h264.video_path(), PathBuf::from("/tmp/out/video.h264"));
        assert_eq!(h264.audio_path(), PathBuf::from("/tmp/out/audio.raw"));

        let vp8 = FileTransport::new("/tmp/out", VideoCodec::Vp8);
        assert_eq!(vp8.video_path(), PathBuf::from("/tmp/out/video.ivf"));
    }

    #[tokio::test]
    async fn file_sink_appends_frames() {
        let dir = tempfile::tempdir().unwrap();
        let transport = FileTransport::new(dir.path(), VideoCodec::H264);

        let mut sink = transport.video_sink(30);
        sink.send(Bytes::from_static(b"\x00\x00\x00\x01\x09")).await.unwrap();
        sink.send(Bytes::from_static(b"\x00\x00\x00\x01\x67")).await.unwrap();

        let written = std::fs::read(transport.video_path()).unwrap();
        assert_eq!(written, b"\x00\x00\x00\x01\x09\x00\x00\x00\x01\x67");
    }

    #[tokio::test]
    async fn unused_sink_creates_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let transport = FileTransport::new(dir.path(), VideoCodec::H264);

        let _sink = transport.audio_sink();
        assert!(!transport.audio_path().exists());
    }

    #[tokio::test]
    async fn missing_directory_fails_on_send() {
        let sink_path = PathBuf::from("/nonexistent/callstream/video.h264");
        let mut sink = FileSink::new(&sink_path);
        assert_eq!(sink.path(), sink_path.as_path());

        let err = sink.send(Bytes::from_static(b"x")).await.unwrap_err();
        assert!(err.to_string().contains("Failed to create"));
    }
}
