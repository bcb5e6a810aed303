//! Copies one ffmpeg output connection into its sink

use std::fmt;

use anyhow::Context;
use tokio::io::AsyncReadExt;
use tokio::net::UnixListener;
use tokio_util::sync::CancellationToken;

use crate::traits::{Framer, MediaSink};

const READ_BUFFER_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OutputKind {
    Video,
    Audio,
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputKind::Video => f.write_str("video"),
            OutputKind::Audio => f.write_str("audio"),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PumpStats {
    pub connected: bool,
    pub bytes: u64,
    pub frames: u64,
}

/// Accept ffmpeg's connection on `listener` and forward everything it writes.
///
/// Returns early with empty stats once `accept_closed` fires without a connection.
/// Only sink failures are errors; a broken read just ends the output.
pub(crate) async fn pump_output(
    kind: OutputKind,
    listener: UnixListener,
    mut framer: Box<dyn Framer>,
    mut sink: Box<dyn MediaSink>,
    accept_closed: CancellationToken,
) -> Result<PumpStats, anyhow::Error> {
    let mut stats = PumpStats::default();

    let mut conn = tokio::select! {
        biased;
        accepted = listener.accept() => {
            let (conn, _) = accepted.with_context(|| format!("Failed to accept {} output", kind))?;
            conn
        }
        _ = accept_closed.cancelled() => {
            tracing::debug!(output = %kind, "ffmpeg never opened output");
            return Ok(stats);
        }
    };
    stats.connected = true;
    tracing::debug!(output = %kind, "ffmpeg output connected");

    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    loop {
        let n = match conn.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(output = %kind, error = %e, "ffmpeg output read failed");
                break;
            }
        };
        stats.bytes += n as u64;

        for frame in framer.push(&buf[..n]) {
            sink.send(frame)
                .await
                .with_context(|| format!("{} sink rejected frame", kind))?;
            stats.frames += 1;
        }
    }

    for frame in framer.flush() {
        sink.send(frame)
            .await
            .with_context(|| format!("{} sink rejected frame", kind))?;
        stats.frames += 1;
    }

    tracing::debug!(
        output = %kind,
        bytes = stats.bytes,
        frames = stats.frames,
        "ffmpeg output finished"
    );
    Ok(stats)
}
