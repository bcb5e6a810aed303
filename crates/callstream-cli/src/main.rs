//! Callstream CLI: transcode media into call-ready elementary streams.
//!
//! Binary locations and default stream options come from the environment
//! (FFMPEG_PATH, FFPROBE_PATH, STREAM_*); flags override the stream options.

use std::path::PathBuf;

use anyhow::Context;
use callstream_cli::{init_tracing, report_error, FileTransport};
use callstream_core::{Config, LaunchOptions, MediaSource, StreamOptions, VideoCodec};
use callstream_processing::{ffmpeg_args, input_has_audio, OutputTargets, Prober, Streamer};
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "callstream", about = "Transcode media into call-ready streams")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print ffprobe stream metadata as JSON
    Probe {
        /// File path or URL; `-` reads stdin
        input: String,
    },
    /// Print the ffmpeg command line without running it
    Args {
        /// File path or URL; `-` reads stdin
        input: String,
        #[command(flatten)]
        launch: LaunchArgs,
        #[command(flatten)]
        stream: StreamArgs,
    },
    /// Transcode and write the elementary streams to a directory
    Stream {
        /// File path or URL; `-` reads stdin
        input: String,
        /// Directory receiving video.h264 / video.ivf and audio.raw
        #[arg(long)]
        out_dir: PathBuf,
        #[command(flatten)]
        launch: LaunchArgs,
        #[command(flatten)]
        stream: StreamArgs,
    },
}

#[derive(Args)]
struct LaunchArgs {
    /// Do not send audio
    #[arg(long)]
    no_audio: bool,
    /// Pass the source H264 bitstream through without re-encoding
    #[arg(long)]
    copy: bool,
}

impl LaunchArgs {
    fn to_launch_options(&self) -> LaunchOptions {
        LaunchOptions {
            include_audio: !self.no_audio,
            copy_h264_codec: self.copy,
        }
    }
}

#[derive(Args)]
struct StreamArgs {
    #[arg(long)]
    width: Option<u32>,
    #[arg(long)]
    height: Option<u32>,
    #[arg(long)]
    fps: Option<u32>,
    #[arg(long)]
    bitrate_kbps: Option<u32>,
    /// H264 or VP8
    #[arg(long)]
    codec: Option<VideoCodec>,
    /// Let ffmpeg pick a hardware decoder
    #[arg(long)]
    hwaccel: bool,
}

impl StreamArgs {
    fn apply(&self, mut opts: StreamOptions) -> StreamOptions {
        if let Some(width) = self.width {
            opts.width = width;
        }
        if let Some(height) = self.height {
            opts.height = height;
        }
        if let Some(fps) = self.fps {
            opts.fps = fps;
        }
        if let Some(bitrate_kbps) = self.bitrate_kbps {
            opts.bitrate_kbps = bitrate_kbps;
        }
        if let Some(codec) = self.codec {
            opts.video_codec = codec;
        }
        if self.hwaccel {
            opts.hardware_acceleration = true;
        }
        opts
    }
}

fn source_from_arg(input: &str) -> MediaSource {
    if input == "-" {
        MediaSource::stream(tokio::io::stdin())
    } else {
        MediaSource::from(input)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate()?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Probe { input } => {
            let prober = Prober::new(config.ffprobe_path.as_str())?;
            let metadata = prober
                .get_input_metadata(source_from_arg(&input))
                .await
                .inspect_err(report_error)?;
            let out = serde_json::to_string_pretty(&metadata).context("Serialize metadata")?;
            println!("{}", out);
        }
        Commands::Args {
            input,
            launch,
            stream,
        } => {
            let opts = stream.apply(config.stream.clone());
            opts.validate()?;
            let launch = launch.to_launch_options();
            let args = ffmpeg_args(
                &source_from_arg(&input),
                &OutputTargets::placeholder(launch.include_audio),
                &opts,
                &launch,
            );
            println!("{} {}", config.ffmpeg_path, shell_join(&args));
        }
        Commands::Stream {
            input,
            out_dir,
            launch,
            stream,
        } => {
            let opts = stream.apply(config.stream.clone());
            let mut launch = launch.to_launch_options();
            let source = source_from_arg(&input);

            // A stream can only be read once, so only locations are probed
            if launch.include_audio && !source.is_stream() {
                let prober = Prober::new(config.ffprobe_path.as_str())?;
                match prober.get_input_metadata(MediaSource::from(input.as_str())).await {
                    Ok(metadata) => {
                        launch.include_audio = input_has_audio(&metadata);
                        if !launch.include_audio {
                            tracing::info!("Input has no audio stream, sending video only");
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "Probe failed, keeping audio enabled"),
                }
            }

            tokio::fs::create_dir_all(&out_dir)
                .await
                .with_context(|| format!("Failed to create {}", out_dir.display()))?;
            let transport = FileTransport::new(&out_dir, opts.video_codec);

            let streamer = Streamer::new(config.ffmpeg_path.as_str())?;
            let running = streamer
                .start(source, &transport, &opts, &launch)
                .inspect_err(report_error)?;

            let stop = running.stop_token();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("Interrupted, stopping ffmpeg");
                    stop.cancel();
                }
            });

            let ended = running.wait().await.inspect_err(report_error)?;
            println!("{}", ended);
            println!("Video written to {}", transport.video_path().display());
            if launch.include_audio {
                println!("Audio written to {}", transport.audio_path().display());
            }
        }
    }

    Ok(())
}

/// Quote arguments that a shell would split or interpret
fn shell_join(args: &[String]) -> String {
    args.iter()
        .map(|arg| {
            let plain = !arg.is_empty()
                && arg
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || "-_:/.=,+@%".contains(c));
            if plain {
                arg.clone()
            } else {
                format!("'{}'", arg.replace('\'', r"'\''"))
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
