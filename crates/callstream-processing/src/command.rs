//! ffmpeg argument construction
//!
//! Maps the requested stream characteristics onto ffmpeg flags. Kept free of any
//! process handling so the resulting flag set can be checked directly.

use callstream_core::{LaunchOptions, MediaSource, StreamOptions, VideoCodec};

pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/107.0.0.0 Safari/537.3";

/// Maximum reconnect delay ffmpeg accepts for HTTP inputs, in seconds
const RECONNECT_DELAY_MAX_SECS: u32 = 4294;

/// Where ffmpeg writes each elementary stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTargets {
    pub video: String,
    /// `None` when audio is not sent
    pub audio: Option<String>,
}

impl OutputTargets {
    /// Symbolic targets, for showing a command line without launching it
    pub fn placeholder(include_audio: bool) -> Self {
        Self {
            video: "unix:video.sock".to_string(),
            audio: include_audio.then(|| "unix:audio.sock".to_string()),
        }
    }
}

/// Full ffmpeg argument vector: input options, input, video output, audio output.
///
/// Audio is only mapped when `launch.include_audio` is set and an audio target exists.
pub fn ffmpeg_args(
    source: &MediaSource,
    targets: &OutputTargets,
    opts: &StreamOptions,
    launch: &LaunchOptions,
) -> Vec<String> {
    let mut args = input_args(source, opts);

    args.extend(video_output_args(opts, launch));
    args.push(targets.video.clone());

    if launch.include_audio {
        if let Some(audio) = &targets.audio {
            args.extend(audio_output_args());
            args.push(audio.clone());
        }
    }

    args
}

fn input_args(source: &MediaSource, opts: &StreamOptions) -> Vec<String> {
    let mut args = strings(&[
        "-loglevel",
        "error",
        "-flags",
        "low_delay",
        "-analyzeduration",
        "0",
        "-thread_queue_size",
        "10",
    ]);

    if source.is_rtsp() {
        args.extend(strings(&[
            "-reorder_queue_size",
            "100",
            "-buffer_size",
            "4194304",
            "-err_detect",
            "ignore_err",
        ]));
    }

    if opts.hardware_acceleration {
        args.extend(strings(&["-hwaccel", "auto"]));
    }

    if source.is_http() {
        args.push("-headers".to_string());
        args.push(http_headers());

        // Playlists reconnect per segment on their own
        if !source.is_hls() {
            args.extend(strings(&[
                "-reconnect",
                "1",
                "-reconnect_at_eof",
                "1",
                "-reconnect_streamed",
                "1",
                "-reconnect_delay_max",
            ]));
            args.push(RECONNECT_DELAY_MAX_SECS.to_string());
        }
    }

    args.push("-i".to_string());
    args.push(source.input_arg().to_string());
    args
}

fn http_headers() -> String {
    [
        ("User-Agent", BROWSER_USER_AGENT),
        ("Connection", "keep-alive"),
    ]
    .iter()
    .map(|(key, value)| format!("{}: {}", key, value))
    .collect::<Vec<_>>()
    .join("\r\n")
}

fn video_output_args(opts: &StreamOptions, launch: &LaunchOptions) -> Vec<String> {
    let mut args = strings(&["-map", "0:v"]);

    match opts.video_codec {
        VideoCodec::Vp8 => {
            args.extend(encode_args(opts));
            args.extend(strings(&["-f", "ivf", "-deadline", "realtime"]));
        }
        VideoCodec::H264 if launch.copy_h264_codec => {
            args.extend(strings(&[
                "-c:v",
                "copy",
                "-f",
                "h264",
                "-bsf:v",
                "h264_metadata=aud=insert",
            ]));
        }
        VideoCodec::H264 => {
            args.extend(encode_args(opts));
            args.extend(strings(&[
                "-f",
                "h264",
                "-tune",
                "zerolatency",
                "-pix_fmt",
                "yuv420p",
                "-preset",
                "ultrafast",
                "-profile:v",
                "baseline",
            ]));
            args.push("-g".to_string());
            args.push(opts.fps.to_string());
            args.push("-x264-params".to_string());
            args.push(format!("keyint={0}:min-keyint={0}", opts.fps));
            args.extend(strings(&["-bsf:v", "h264_metadata=aud=insert"]));
        }
    }

    args
}

/// Scale, frame rate and bitrate shared by both re-encoding paths
fn encode_args(opts: &StreamOptions) -> Vec<String> {
    vec![
        "-vf".to_string(),
        format!("scale={}:{}", opts.width, opts.height),
        "-r".to_string(),
        opts.fps.to_string(),
        "-b:v".to_string(),
        format!("{}k", opts.bitrate_kbps),
    ]
}

fn audio_output_args() -> Vec<String> {
    strings(&[
        "-map", "0:a", "-ac", "2", "-ar", "48000", "-c:a", "libopus", "-f", "data",
    ])
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
