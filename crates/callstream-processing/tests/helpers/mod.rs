//! Shared fixtures: fake ffmpeg/ffprobe scripts and an in-memory transport.

#![allow(dead_code)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use callstream_core::VideoCodec;
use callstream_processing::{Framer, MediaSink, RawChunks, StreamTransport};

/// Write an executable `/bin/sh` script standing in for ffmpeg or ffprobe
pub fn fake_binary(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).expect("write fake binary");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("chmod fake binary");
    path
}

/// Fake ffmpeg in Python that connects to its `video.sock` output and writes
/// `payload`, then runs `after` (Python statements)
pub fn fake_socket_writer(dir: &Path, payload: &[u8], after: &str) -> PathBuf {
    let payload: Vec<String> = payload.iter().map(|b| b.to_string()).collect();
    let script = format!(
        "#!/usr/bin/env python3\n\
         import socket, sys, time\n\
         target = next(a for a in sys.argv[1:] if a.endswith('video.sock'))\n\
         conn = socket.socket(socket.AF_UNIX, socket.SOCK_STREAM)\n\
         conn.connect(target[len('unix:'):])\n\
         conn.sendall(bytes([{}]))\n\
         {}\n",
        payload.join(", "),
        after
    );
    let path = dir.join("ffmpeg");
    std::fs::write(&path, script).expect("write fake binary");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("chmod fake binary");
    path
}

#[derive(Default)]
struct Calls {
    framers: Vec<VideoCodec>,
    video_fps: Vec<u32>,
    audio_sinks: usize,
}

/// Transport that records what the pipeline asked for and what it sent
#[derive(Clone, Default)]
pub struct RecordingTransport {
    calls: Arc<Mutex<Calls>>,
    pub video: Arc<Mutex<Vec<Bytes>>>,
    pub audio: Arc<Mutex<Vec<Bytes>>>,
}

impl RecordingTransport {
    pub fn framers(&self) -> Vec<VideoCodec> {
        self.calls.lock().unwrap().framers.clone()
    }

    pub fn video_fps(&self) -> Vec<u32> {
        self.calls.lock().unwrap().video_fps.clone()
    }

    pub fn audio_sinks(&self) -> usize {
        self.calls.lock().unwrap().audio_sinks
    }
}

struct VecSink(Arc<Mutex<Vec<Bytes>>>);

#[async_trait]
impl MediaSink for VecSink {
    async fn send(&mut self, frame: Bytes) -> Result<(), anyhow::Error> {
        self.0.lock().unwrap().push(frame);
        Ok(())
    }
}

impl StreamTransport for RecordingTransport {
    fn video_framer(&self, codec: VideoCodec) -> Box<dyn Framer> {
        self.calls.lock().unwrap().framers.push(codec);
        Box::new(RawChunks)
    }

    fn video_sink(&self, fps: u32) -> Box<dyn MediaSink> {
        self.calls.lock().unwrap().video_fps.push(fps);
        Box::new(VecSink(self.video.clone()))
    }

    fn audio_sink(&self) -> Box<dyn MediaSink> {
        self.calls.lock().unwrap().audio_sinks += 1;
        Box::new(VecSink(self.audio.clone()))
    }
}

struct RefusingSink;

#[async_trait]
impl MediaSink for RefusingSink {
    async fn send(&mut self, _frame: Bytes) -> Result<(), anyhow::Error> {
        Err(anyhow::anyhow!("transport closed"))
    }
}

/// Transport whose video sink rejects every frame
pub struct RefusingTransport;

impl StreamTransport for RefusingTransport {
    fn video_framer(&self, _codec: VideoCodec) -> Box<dyn Framer> {
        Box::new(RawChunks)
    }

    fn video_sink(&self, _fps: u32) -> Box<dyn MediaSink> {
        Box::new(RefusingSink)
    }

    fn audio_sink(&self) -> Box<dyn MediaSink> {
        Box::new(RefusingSink)
    }
}
