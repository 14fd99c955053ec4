use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use aero_proto::command::Command;

use crate::LinkConfig;

/// Largest acknowledgement datagram the vehicle sends.
const ACK_BUF_LEN: usize = 3000;

/// The UDP command channel. Sending is fire-and-forget; acknowledgements are
/// drained by a background listener into a single-slot cell that each new
/// arrival overwrites. There is deliberately no queue: under back-to-back
/// commands the vehicle's older acknowledgements are dropped, which is how
/// the real protocol behaves.
pub struct CommandLink {
    socket: Arc<UdpSocket>,
    vehicle_addr: SocketAddr,
    response: Arc<Mutex<Option<Vec<u8>>>>,
    shutdown: watch::Sender<bool>,
}

impl CommandLink {
    /// Binds the local command port, starts the acknowledgement listener and
    /// places the vehicle into SDK mode with its video stream enabled (the
    /// `command` and `streamon` setup datagrams).
    pub async fn connect(cfg: &LinkConfig) -> Result<Self> {
        let vehicle_addr: SocketAddr = format!("{}:{}", cfg.addr, cfg.command_port)
            .parse()
            .with_context(|| format!("vehicle command address {}:{}", cfg.addr, cfg.command_port))?;
        let socket = UdpSocket::bind(("0.0.0.0", cfg.local_port))
            .await
            .with_context(|| format!("bind local command port {}", cfg.local_port))?;
        let socket = Arc::new(socket);

        let response = Arc::new(Mutex::new(None));
        let (shutdown, shutdown_rx) = watch::channel(false);
        tokio::spawn(ack_listener(socket.clone(), response.clone(), shutdown_rx));

        let link = Self { socket, vehicle_addr, response, shutdown };
        link.send(&Command::EnterSdk).await?;
        link.send(&Command::StreamOn).await?;
        info!("cmdlink: connected to {}", link.vehicle_addr);
        Ok(link)
    }

    /// Exactly one datagram per call. Delivery is best-effort by design; a
    /// lost command is never resent.
    pub async fn send(&self, cmd: &Command) -> Result<()> {
        let wire = cmd.wire();
        debug!("cmdlink: send '{}'", wire);
        self.socket
            .send_to(wire.as_bytes(), self.vehicle_addr)
            .await
            .with_context(|| format!("send '{}'", wire))?;
        Ok(())
    }

    /// Returns and clears the latest unconsumed acknowledgement.
    pub fn take_response(&self) -> Option<Vec<u8>> {
        self.response.lock().unwrap().take()
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket.local_addr().context("command socket local addr")
    }

    /// Stops the listener. Dropping the link has the same effect.
    pub fn close(&self) {
        let _ = self.shutdown.send(true);
    }
}

async fn ack_listener(
    socket: Arc<UdpSocket>,
    cell: Arc<Mutex<Option<Vec<u8>>>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut buf = [0u8; ACK_BUF_LEN];
    loop {
        tokio::select! {
            res = shutdown.changed() => {
                if res.is_err() || *shutdown.borrow() {
                    debug!("cmdlink: listener stopped");
                    return;
                }
            }
            res = socket.recv_from(&mut buf) => match res {
                Ok((n, _from)) => {
                    // single slot: a new arrival overwrites an unconsumed one
                    *cell.lock().unwrap() = Some(buf[..n].to_vec());
                }
                Err(e) => warn!("cmdlink: recv failed: {}", e),
            },
        }
    }
}
