//! Input inspection through ffprobe

use std::process::Stdio;

use callstream_core::{validate_binary_path, ByteStream, MediaSource, StreamError, StreamResult};
use serde::{Deserialize, Serialize};
use tokio::process::{ChildStdin, Command};

/// ffprobe's `-show_format -show_streams` output, reduced to what callers inspect
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProbeData {
    #[serde(default)]
    pub streams: Vec<ProbeStream>,
    pub format: Option<ProbeFormat>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProbeStream {
    #[serde(default)]
    pub index: u32,
    pub codec_type: Option<String>,
    pub codec_name: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub r_frame_rate: Option<String>,
    pub sample_rate: Option<String>,
    pub channels: Option<u32>,
    pub duration: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProbeFormat {
    pub filename: Option<String>,
    pub format_name: Option<String>,
    pub duration: Option<String>,
    pub bit_rate: Option<String>,
}

impl ProbeData {
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    pub fn has_audio(&self) -> bool {
        self.has_codec_type("audio")
    }

    pub fn has_video(&self) -> bool {
        self.has_codec_type("video")
    }

    fn has_codec_type(&self, codec_type: &str) -> bool {
        self.streams
            .iter()
            .any(|s| s.codec_type.as_deref() == Some(codec_type))
    }

    pub fn first_video(&self) -> Option<&ProbeStream> {
        self.streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some("video"))
    }

    /// Container duration in seconds
    pub fn duration_secs(&self) -> Option<f64> {
        self.format
            .as_ref()
            .and_then(|f| f.duration.as_ref())
            .and_then(|d| d.parse::<f64>().ok())
    }
}

impl ProbeStream {
    /// `r_frame_rate` ("30000/1001") as frames per second
    pub fn frame_rate(&self) -> Option<f32> {
        let (num, den) = self.r_frame_rate.as_deref()?.split_once('/')?;
        let num: f32 = num.trim().parse().ok()?;
        let den: f32 = den.trim().parse().ok()?;
        if den != 0.0 {
            Some(num / den)
        } else {
            None
        }
    }
}

pub fn input_has_audio(metadata: &ProbeData) -> bool {
    metadata.has_audio()
}

pub fn input_has_video(metadata: &ProbeData) -> bool {
    metadata.has_video()
}

/// Runs ffprobe against a media input
#[derive(Debug, Clone)]
pub struct Prober {
    ffprobe_path: String,
}

impl Prober {
    pub fn new(ffprobe_path: impl Into<String>) -> StreamResult<Self> {
        let ffprobe_path = ffprobe_path.into();
        validate_binary_path(&ffprobe_path)?;
        Ok(Self { ffprobe_path })
    }

    #[tracing::instrument(skip(self, source), fields(
        process.executable.name = "ffprobe",
        process.executable.path = %self.ffprobe_path,
        ffmpeg.operation = "probe",
        input = %source
    ))]
    pub async fn get_input_metadata(&self, source: MediaSource) -> StreamResult<ProbeData> {
        let start = std::time::Instant::now();
        source.validate()?;

        let stdin = if source.is_stream() {
            Stdio::piped()
        } else {
            Stdio::null()
        };
        let mut child = Command::new(&self.ffprobe_path)
            .args([
                "-v",
                "error",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(source.input_arg())
            .stdin(stdin)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                StreamError::Probe(format!("failed to spawn {}: {}", self.ffprobe_path, e))
            })?;

        let feeder = match (source.into_stream(), child.stdin.take()) {
            (Some(reader), Some(stdin)) => Some(tokio::spawn(feed_stdin(reader, stdin))),
            _ => None,
        };

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| StreamError::Probe(format!("failed to wait for ffprobe: {}", e)))?;

        if let Some(feeder) = feeder {
            feeder.abort();
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::error!(status = %output.status, "ffprobe failed: {}", stderr.trim());
            return Err(StreamError::Probe(format!(
                "ffprobe exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let metadata = ProbeData::from_json(&output.stdout)
            .map_err(|e| StreamError::Probe(format!("failed to parse ffprobe output: {}", e)))?;

        tracing::info!(
            duration_ms = start.elapsed().as_millis(),
            streams = metadata.streams.len(),
            has_audio = metadata.has_audio(),
            has_video = metadata.has_video(),
            "Input probe completed"
        );

        Ok(metadata)
    }
}

async fn feed_stdin(mut reader: ByteStream, mut stdin: ChildStdin) {
    // ffprobe closes stdin once it has seen enough
    if let Err(e) = tokio::io::copy(&mut reader, &mut stdin).await {
        tracing::debug!(error = %e, "Probe input copy ended");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "streams": [
            {
                "index": 0,
                "codec_name": "h264",
                "codec_type": "video",
                "width": 1920,
                "height": 1080,
                "r_frame_rate": "30000/1001",
                "duration": "120.120000"
            },
            {
                "index": 1,
                "codec_name": "aac",
                "codec_type": "audio",
                "sample_rate": "48000",
                "channels": 2,
                "r_frame_rate": "0/0"
            }
        ],
        "format": {
            "filename": "movie.mp4",
            "format_name": "mov,mp4,m4a,3gp,3g2,mj2",
            "duration": "120.120000",
            "bit_rate": "5000000",
            "tags": { "encoder": "Lavf60.3.100" }
        }
    }"#;

    #[test]
    fn parses_streams_and_format() {
        let data = ProbeData::from_json(SAMPLE.as_bytes()).unwrap();

        assert_eq!(data.streams.len(), 2);
        assert!(input_has_video(&data));
        assert!(input_has_audio(&data));

        let video = data.first_video().unwrap();
        assert_eq!(video.width, Some(1920));
        assert_eq!(video.codec_name.as_deref(), Some("h264"));
        let fps = video.frame_rate().unwrap();
        assert!((fps - 29.97).abs() < 0.01);

        assert_eq!(data.streams[1].channels, Some(2));
        assert_eq!(data.streams[1].frame_rate(), None);
        assert_eq!(data.duration_secs(), Some(120.12));
    }

    #[test]
    fn audio_only_input() {
        let data = ProbeData::from_json(
            br#"{"streams":[{"index":0,"codec_type":"audio","codec_name":"mp3"}]}"#,
        )
        .unwrap();

        assert!(input_has_audio(&data));
        assert!(!input_has_video(&data));
        assert!(data.format.is_none());
        assert!(data.first_video().is_none());
    }

    #[test]
    fn empty_output_has_no_streams() {
        let data = ProbeData::from_json(b"{}").unwrap();
        assert!(!input_has_audio(&data));
        assert!(!input_has_video(&data));
    }

    #[test]
    fn malformed_output_is_an_error() {
        assert!(ProbeData::from_json(b"not json").is_err());
    }

    #[test]
    fn binary_path_is_validated() {
        assert!(Prober::new("ffprobe").is_ok());
        assert!(Prober::new("ffprobe | tee").is_err());
    }
}
