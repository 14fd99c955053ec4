use anyhow::{Context, Result};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{FrameDecoder, VideoFrame};

/// Decodes the compressed elementary stream by piping it through one
/// long-lived `ffmpeg` process (keeps Rust dependencies small; same approach
/// as grabbing camera frames through an external tool). A reader task slices
/// stdout into fixed-size rgb24 frames and hands them over a bounded channel,
/// so `decode` never blocks on the child's output.
pub struct PipeDecoder {
    child: Child,
    stdin: ChildStdin,
    frames: mpsc::Receiver<VideoFrame>,
}

impl PipeDecoder {
    pub fn spawn(ffmpeg_bin: &str, width: u32, height: u32) -> Result<Self> {
        let mut cmd = Command::new(ffmpeg_bin);
        cmd.args([
            "-hide_banner", "-loglevel", "error",
            "-fflags", "nobuffer",
            "-f", "h264",
            "-i", "pipe:0",
            "-f", "rawvideo",
            "-pix_fmt", "rgb24",
            "pipe:1",
        ])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null());

        let mut child = cmd.spawn().with_context(|| format!("spawn {}", ffmpeg_bin))?;
        let stdin = child.stdin.take().context("decoder stdin")?;
        let mut stdout = child.stdout.take().context("decoder stdout")?;
        info!("video: decoder '{}' running ({}x{})", ffmpeg_bin, width, height);

        let frame_len = (width * height * 3) as usize;
        let (tx, rx) = mpsc::channel(4);
        tokio::spawn(async move {
            let mut buf = vec![0u8; frame_len];
            loop {
                match stdout.read_exact(&mut buf).await {
                    Ok(_) => {
                        let frame = VideoFrame {
                            data: buf.clone(),
                            width,
                            height,
                            linesize: width * 3,
                        };
                        // only the newest frame matters downstream
                        if tx.try_send(frame).is_err() {
                            debug!("video: decoder frame dropped, consumer behind");
                        }
                    }
                    Err(e) => {
                        warn!("video: decoder output closed: {}", e);
                        return;
                    }
                }
            }
        });

        Ok(Self { child, stdin, frames: rx })
    }
}

#[async_trait]
impl FrameDecoder for PipeDecoder {
    async fn decode(&mut self, access_unit: &[u8]) -> Result<Vec<VideoFrame>> {
        self.stdin
            .write_all(access_unit)
            .await
            .context("feed access unit to decoder")?;

        // Drain whatever complete frames the reader produced so far. The
        // child buffers across access units, so this can legitimately be
        // empty or hold frames from earlier units.
        let mut out = Vec::new();
        while let Ok(frame) = self.frames.try_recv() {
            out.push(frame);
        }
        Ok(out)
    }
}

impl Drop for PipeDecoder {
    fn drop(&mut self) {
        self.child.start_kill().ok();
    }
}
