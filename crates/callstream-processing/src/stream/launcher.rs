//! ffmpeg process lifecycle for a transcode-and-stream pipeline

use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::process::{ExitStatus, Stdio};

use callstream_core::{
    validate_binary_path, ByteStream, LaunchOptions, MediaSource, StreamError, StreamOptions,
    StreamResult,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::UnixListener;
use tokio::process::{ChildStderr, ChildStdin, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use super::pump::{pump_output, OutputKind, PumpStats};
use crate::command::{ffmpeg_args, OutputTargets};
use crate::traits::{Framer, MediaSink, RawChunks, StreamTransport};

/// ffmpeg stderr lines kept for the failure message
const STDERR_TAIL_LINES: usize = 20;

/// How a pipeline ended without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnded {
    /// ffmpeg consumed the whole input and exited cleanly
    Finished,
    /// The process was terminated through [`RunningStream::stop`]
    Stopped,
}

impl fmt::Display for StreamEnded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("video ended")
    }
}

/// Launches ffmpeg pipelines
#[derive(Debug, Clone)]
pub struct Streamer {
    ffmpeg_path: String,
}

impl Streamer {
    pub fn new(ffmpeg_path: impl Into<String>) -> StreamResult<Self> {
        let ffmpeg_path = ffmpeg_path.into();
        validate_binary_path(&ffmpeg_path)?;
        Ok(Self { ffmpeg_path })
    }

    pub fn ffmpeg_path(&self) -> &str {
        &self.ffmpeg_path
    }

    /// Launch the pipeline and wait for it to end.
    pub async fn stream_livestream_video(
        &self,
        source: MediaSource,
        transport: &dyn StreamTransport,
        opts: &StreamOptions,
        launch: &LaunchOptions,
    ) -> StreamResult<StreamEnded> {
        self.start(source, transport, opts, launch)?.wait().await
    }

    /// Spawn ffmpeg and wire its outputs to the transport's sinks.
    ///
    /// Must be called from within a Tokio runtime. The returned stream runs in the
    /// background until ffmpeg exits or [`RunningStream::stop`] is called.
    pub fn start(
        &self,
        source: MediaSource,
        transport: &dyn StreamTransport,
        opts: &StreamOptions,
        launch: &LaunchOptions,
    ) -> StreamResult<RunningStream> {
        opts.validate()?;
        source.validate()?;

        let id = Uuid::new_v4();
        let span = tracing::info_span!(
            "stream",
            stream_id = %id,
            input = %source,
            codec = %opts.video_codec,
            resolution = %opts.resolution(),
        );
        let _entered = span.enter();

        let socket_dir = tempfile::Builder::new()
            .prefix("callstream-")
            .tempdir()?;
        let video_path = socket_dir.path().join("video.sock");
        let video_listener = UnixListener::bind(&video_path)?;
        let audio = if launch.include_audio {
            let audio_path = socket_dir.path().join("audio.sock");
            let listener = UnixListener::bind(&audio_path)?;
            Some((listener, audio_path))
        } else {
            None
        };

        let targets = OutputTargets {
            video: format!("unix:{}", video_path.display()),
            audio: audio
                .as_ref()
                .map(|(_, path)| format!("unix:{}", path.display())),
        };
        let args = ffmpeg_args(&source, &targets, opts, launch);
        tracing::debug!(args = ?args, "Spawning ffmpeg");

        let stdin = if source.is_stream() {
            Stdio::piped()
        } else {
            Stdio::null()
        };
        let mut child = Command::new(&self.ffmpeg_path)
            .args(&args)
            .stdin(stdin)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                StreamError::Transcode(format!("failed to spawn {}: {}", self.ffmpeg_path, e))
            })?;

        tracing::info!(pid = child.id(), "ffmpeg started");

        let feeder = match (source.into_stream(), child.stdin.take()) {
            (Some(reader), Some(stdin)) => Some(tokio::spawn(
                feed_stdin(reader, stdin).instrument(span.clone()),
            )),
            _ => None,
        };
        let stderr = child
            .stderr
            .take()
            .map(|stderr| tokio::spawn(collect_stderr(stderr).instrument(span.clone())));

        let cancel = CancellationToken::new();
        let accept_closed = CancellationToken::new();
        let pump_failed = CancellationToken::new();

        let mut pumps = Vec::with_capacity(2);
        pumps.push(spawn_pump(
            OutputKind::Video,
            video_listener,
            transport.video_framer(opts.video_codec),
            transport.video_sink(opts.fps),
            &accept_closed,
            &pump_failed,
            &span,
        ));
        if let Some((listener, _)) = audio {
            pumps.push(spawn_pump(
                OutputKind::Audio,
                listener,
                Box::new(RawChunks),
                transport.audio_sink(),
                &accept_closed,
                &pump_failed,
                &span,
            ));
        }

        let supervisor = Supervisor {
            child,
            cancel: cancel.clone(),
            accept_closed,
            pump_failed,
            pumps,
            feeder,
            stderr,
            _socket_dir: socket_dir,
        };
        let task = tokio::spawn(supervisor.run().instrument(span.clone()));

        Ok(RunningStream { id, cancel, task })
    }
}

/// Handle to a launched pipeline
///
/// Resolves exactly once through [`RunningStream::wait`].
#[derive(Debug)]
pub struct RunningStream {
    id: Uuid,
    cancel: CancellationToken,
    task: JoinHandle<StreamResult<StreamEnded>>,
}

impl RunningStream {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Terminate the ffmpeg process. The stream then resolves as ended.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Token that stops the stream when cancelled, for use from other tasks
    pub fn stop_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn wait(self) -> StreamResult<StreamEnded> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(StreamError::Transcode(format!("stream task failed: {}", e))),
        }
    }
}

enum Interrupt {
    Exited(io::Result<ExitStatus>),
    /// Stop requested or a sink failed; the process gets killed
    Terminated,
}

struct Supervisor {
    child: tokio::process::Child,
    cancel: CancellationToken,
    accept_closed: CancellationToken,
    pump_failed: CancellationToken,
    pumps: Vec<JoinHandle<Result<PumpStats, anyhow::Error>>>,
    feeder: Option<JoinHandle<()>>,
    stderr: Option<JoinHandle<Vec<String>>>,
    // sockets live here until ffmpeg is gone
    _socket_dir: tempfile::TempDir,
}

impl Supervisor {
    async fn run(mut self) -> StreamResult<StreamEnded> {
        let interrupt = tokio::select! {
            status = self.child.wait() => Interrupt::Exited(status),
            _ = self.cancel.cancelled() => Interrupt::Terminated,
            _ = self.pump_failed.cancelled() => Interrupt::Terminated,
        };

        if matches!(interrupt, Interrupt::Terminated) {
            if let Err(e) = self.child.kill().await {
                tracing::warn!(error = %e, "Failed to kill ffmpeg");
            }
        }
        self.accept_closed.cancel();

        if let Some(feeder) = self.feeder.take() {
            feeder.abort();
        }

        let mut sink_error = None;
        for pump in self.pumps.drain(..) {
            match pump.await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    sink_error.get_or_insert(e);
                }
                Err(e) => {
                    sink_error.get_or_insert(anyhow::anyhow!("output task failed: {}", e));
                }
            }
        }

        let stderr_tail = match self.stderr.take() {
            Some(handle) => handle.await.unwrap_or_default(),
            None => Vec::new(),
        };

        match (interrupt, sink_error) {
            (_, Some(e)) => {
                tracing::error!(error = %format!("{:#}", e), "Stream sink failed");
                Err(StreamError::sink(e))
            }
            (Interrupt::Terminated, None) => {
                tracing::info!("Stream stopped");
                Ok(StreamEnded::Stopped)
            }
            (Interrupt::Exited(Ok(status)), None) if status.success() => {
                tracing::info!("Stream ended");
                Ok(StreamEnded::Finished)
            }
            (Interrupt::Exited(Ok(status)), None) => {
                let message = failure_message(&status.to_string(), &stderr_tail);
                tracing::warn!(reason = %message, "ffmpeg failed");
                Err(StreamError::Transcode(message))
            }
            (Interrupt::Exited(Err(e)), None) => Err(StreamError::Transcode(format!(
                "failed to wait for ffmpeg: {}",
                e
            ))),
        }
    }
}

fn failure_message(status: &str, stderr_tail: &[String]) -> String {
    if stderr_tail.is_empty() {
        format!("ffmpeg exited with {}", status)
    } else {
        format!("ffmpeg exited with {}: {}", status, stderr_tail.join("\n"))
    }
}

fn spawn_pump(
    kind: OutputKind,
    listener: UnixListener,
    framer: Box<dyn Framer>,
    sink: Box<dyn MediaSink>,
    accept_closed: &CancellationToken,
    pump_failed: &CancellationToken,
    span: &tracing::Span,
) -> JoinHandle<Result<PumpStats, anyhow::Error>> {
    let accept_closed = accept_closed.clone();
    let pump_failed = pump_failed.clone();
    tokio::spawn(
        async move {
            let result = pump_output(kind, listener, framer, sink, accept_closed).await;
            if result.is_err() {
                pump_failed.cancel();
            }
            result
        }
        .instrument(span.clone()),
    )
}

async fn feed_stdin(mut reader: ByteStream, mut stdin: ChildStdin) {
    match tokio::io::copy(&mut reader, &mut stdin).await {
        Ok(bytes) => tracing::debug!(bytes, "Input stream fully written to ffmpeg"),
        // ffmpeg stops reading when it exits early
        Err(e) => tracing::debug!(error = %e, "Input stream copy ended"),
    }
}

async fn collect_stderr(stderr: ChildStderr) -> Vec<String> {
    let mut reader = BufReader::new(stderr);
    let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
    let mut buf = Vec::new();

    // Drain to EOF: a closed pipe would kill ffmpeg on its next write
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(error = %e, "ffmpeg stderr read failed");
                break;
            }
        }

        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(|c| c == '\r' || c == '\n');
        if line.trim().is_empty() {
            continue;
        }
        tracing::warn!(target: "callstream::ffmpeg", "{}", line);
        if tail.len() == STDERR_TAIL_LINES {
            tail.pop_front();
        }
        tail.push_back(line.to_string());
    }

    tail.into()
}
