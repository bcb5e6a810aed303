//! Output characteristics requested from the transcoder

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StreamError;

pub const DEFAULT_WIDTH: u32 = 1280;
pub const DEFAULT_HEIGHT: u32 = 720;
pub const DEFAULT_FPS: u32 = 30;
pub const DEFAULT_BITRATE_KBPS: u32 = 1000;

/// Video codec sent over the call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VideoCodec {
    #[default]
    H264,
    Vp8,
}

impl VideoCodec {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoCodec::H264 => "H264",
            VideoCodec::Vp8 => "VP8",
        }
    }

    /// ffmpeg muxer producing the elementary stream for this codec
    pub fn muxer(&self) -> &'static str {
        match self {
            VideoCodec::H264 => "h264",
            VideoCodec::Vp8 => "ivf",
        }
    }
}

impl fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VideoCodec {
    type Err = StreamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("h264") {
            Ok(VideoCodec::H264)
        } else if s.eq_ignore_ascii_case("vp8") {
            Ok(VideoCodec::Vp8)
        } else {
            Err(StreamError::InvalidInput(format!(
                "unsupported video codec '{}', expected H264 or VP8",
                s
            )))
        }
    }
}

/// Desired output characteristics of the video stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamOptions {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub bitrate_kbps: u32,
    pub video_codec: VideoCodec,
    pub hardware_acceleration: bool,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            fps: DEFAULT_FPS,
            bitrate_kbps: DEFAULT_BITRATE_KBPS,
            video_codec: VideoCodec::default(),
            hardware_acceleration: false,
        }
    }
}

impl StreamOptions {
    /// `WxH`, as used in logs and resolution strings
    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }

    pub fn validate(&self) -> Result<(), StreamError> {
        for (name, value) in [
            ("width", self.width),
            ("height", self.height),
            ("fps", self.fps),
            ("bitrate_kbps", self.bitrate_kbps),
        ] {
            if value == 0 {
                return Err(StreamError::InvalidInput(format!(
                    "{} must be greater than zero",
                    name
                )));
            }
        }

        // yuv420p needs even dimensions
        if self.width % 2 != 0 || self.height % 2 != 0 {
            return Err(StreamError::InvalidInput(format!(
                "resolution {} must have even width and height",
                self.resolution()
            )));
        }

        Ok(())
    }
}

/// Per-launch switches that are not part of the transport's stream options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchOptions {
    pub include_audio: bool,
    /// Pass the source H264 bitstream through untouched. Ignored for VP8.
    pub copy_h264_codec: bool,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            include_audio: true,
            copy_h264_codec: false,
        }
    }
}
