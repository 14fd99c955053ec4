use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use aero_video::{FrameDecoder, VideoConfig, VideoFrame};

use crate::assemble::{AccessUnitAssembler, VIDEO_DATAGRAM_MAX};

/// The UDP video channel. A background listener reassembles datagrams into
/// access units, runs each completed unit through the decode capability and
/// keeps only the most recent frame. Readers pull copies at their own pace;
/// there is no frame queue.
pub struct VideoLink {
    frame: Arc<Mutex<Option<VideoFrame>>>,
    local_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
}

impl VideoLink {
    pub async fn start(cfg: &VideoConfig, decoder: Box<dyn FrameDecoder>) -> Result<Self> {
        let socket = UdpSocket::bind(("0.0.0.0", cfg.port))
            .await
            .with_context(|| format!("bind video port {}", cfg.port))?;
        let local_addr = socket.local_addr().context("video socket local addr")?;

        let frame = Arc::new(Mutex::new(None));
        let (shutdown, shutdown_rx) = watch::channel(false);
        tokio::spawn(video_listener(socket, decoder, frame.clone(), shutdown_rx));
        info!("video: listening on {}", local_addr);

        Ok(Self { frame, local_addr, shutdown })
    }

    /// The most recently decoded frame, by value; `None` until the first
    /// complete access unit decodes. A decode failure keeps the previous
    /// frame in place.
    pub fn current_frame(&self) -> Option<VideoFrame> {
        self.frame.lock().unwrap().clone()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops the listener. Dropping the link has the same effect.
    pub fn close(&self) {
        let _ = self.shutdown.send(true);
    }
}

async fn video_listener(
    socket: UdpSocket,
    mut decoder: Box<dyn FrameDecoder>,
    cell: Arc<Mutex<Option<VideoFrame>>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut buf = [0u8; VIDEO_DATAGRAM_MAX];
    let mut assembler = AccessUnitAssembler::new();
    loop {
        tokio::select! {
            res = shutdown.changed() => {
                if res.is_err() || *shutdown.borrow() {
                    debug!("video: listener stopped");
                    return;
                }
            }
            res = socket.recv_from(&mut buf) => match res {
                Ok((n, _from)) => {
                    let Some(unit) = assembler.push(&buf[..n]) else { continue };
                    match decoder.decode(&unit).await {
                        // a bundled decode can yield several frames; only the
                        // last one becomes the current frame
                        Ok(frames) => {
                            if let Some(frame) = frames.into_iter().last() {
                                *cell.lock().unwrap() = Some(frame);
                            }
                        }
                        Err(e) => debug!("video: decode failed, keeping previous frame: {:#}", e),
                    }
                }
                Err(e) => warn!("video: recv failed: {}", e),
            },
        }
    }
}
