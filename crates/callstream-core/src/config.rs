//! Configuration module
//!
//! Binary locations and default stream options, read from the environment
//! (with `.env` support).

use std::env;
use std::str::FromStr;

use anyhow::{anyhow, Context};

use crate::error::StreamError;
use crate::options::{
    StreamOptions, VideoCodec, DEFAULT_BITRATE_KBPS, DEFAULT_FPS, DEFAULT_HEIGHT, DEFAULT_WIDTH,
};

const DANGEROUS_CHARS: [char; 11] = [';', '|', '&', '$', '`', '(', ')', '<', '>', '\n', '\r'];

#[derive(Clone, Debug)]
pub struct Config {
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    pub stream: StreamOptions,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            stream: StreamOptions::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let video_codec = match lookup("STREAM_VIDEO_CODEC") {
            Some(value) => value
                .parse::<VideoCodec>()
                .context("STREAM_VIDEO_CODEC must be H264 or VP8")?,
            None => VideoCodec::default(),
        };

        let stream = StreamOptions {
            width: parse_var(&lookup, "STREAM_WIDTH", DEFAULT_WIDTH)?,
            height: parse_var(&lookup, "STREAM_HEIGHT", DEFAULT_HEIGHT)?,
            fps: parse_var(&lookup, "STREAM_FPS", DEFAULT_FPS)?,
            bitrate_kbps: parse_var(&lookup, "STREAM_BITRATE_KBPS", DEFAULT_BITRATE_KBPS)?,
            video_codec,
            hardware_acceleration: lookup("STREAM_HARDWARE_ACCELERATION")
                .unwrap_or_else(|| "false".to_string())
                .to_lowercase()
                .parse()
                .unwrap_or(false),
        };

        Ok(Self {
            ffmpeg_path: lookup("FFMPEG_PATH").unwrap_or_else(|| "ffmpeg".to_string()),
            ffprobe_path: lookup("FFPROBE_PATH").unwrap_or_else(|| "ffprobe".to_string()),
            stream,
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        validate_binary_path(&self.ffmpeg_path).context("Invalid FFMPEG_PATH")?;
        validate_binary_path(&self.ffprobe_path).context("Invalid FFPROBE_PATH")?;
        self.stream
            .validate()
            .map_err(|e| anyhow!("Invalid stream options: {}", e))?;
        Ok(())
    }
}

fn parse_var<T, F>(lookup: &F, name: &str, default: T) -> Result<T, anyhow::Error>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| anyhow!("{} must be a valid number, got '{}'", name, value)),
        None => Ok(default),
    }
}

/// Reject binary paths that are empty or carry shell metacharacters
pub fn validate_binary_path(path: &str) -> Result<(), StreamError> {
    if path.trim().is_empty() {
        return Err(StreamError::Config("binary path is empty".to_string()));
    }

    if path.chars().any(|c| DANGEROUS_CHARS.contains(&c)) {
        return Err(StreamError::Config(format!(
            "binary path contains dangerous characters: {}",
            path
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.ffmpeg_path, "ffmpeg");
        assert_eq!(config.ffprobe_path, "ffprobe");
        assert_eq!(config.stream, StreamOptions::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn reads_stream_options() {
        let config = Config::from_lookup(lookup_from(&[
            ("FFMPEG_PATH", "/usr/local/bin/ffmpeg"),
            ("STREAM_WIDTH", "1920"),
            ("STREAM_HEIGHT", "1080"),
            ("STREAM_FPS", "60"),
            ("STREAM_BITRATE_KBPS", "4500"),
            ("STREAM_VIDEO_CODEC", "vp8"),
            ("STREAM_HARDWARE_ACCELERATION", "TRUE"),
        ]))
        .unwrap();

        assert_eq!(config.ffmpeg_path, "/usr/local/bin/ffmpeg");
        assert_eq!(config.stream.resolution(), "1920x1080");
        assert_eq!(config.stream.fps, 60);
        assert_eq!(config.stream.bitrate_kbps, 4500);
        assert_eq!(config.stream.video_codec, VideoCodec::Vp8);
        assert!(config.stream.hardware_acceleration);
    }

    #[test]
    fn malformed_numbers_name_the_variable() {
        let err = Config::from_lookup(lookup_from(&[("STREAM_FPS", "thirty")])).unwrap_err();
        assert!(err.to_string().contains("STREAM_FPS"));
    }

    #[test]
    fn unknown_codec_is_rejected() {
        assert!(Config::from_lookup(lookup_from(&[("STREAM_VIDEO_CODEC", "hevc")])).is_err());
    }

    #[test]
    fn dangerous_binary_paths_fail_validation() {
        let config = Config {
            ffmpeg_path: "ffmpeg; rm -rf /".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());

        assert!(validate_binary_path("").is_err());
        assert!(validate_binary_path("/opt/ffmpeg-6.1/bin/ffmpeg").is_ok());
    }

    #[test]
    fn invalid_stream_options_fail_validation() {
        let config = Config::from_lookup(lookup_from(&[("STREAM_WIDTH", "0")])).unwrap();
        assert!(config.validate().is_err());
    }
}
