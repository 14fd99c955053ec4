use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use aero_link::{CommandLink, VideoLink};
use aero_proto::command::Command;
use aero_video::VideoFrame;

use crate::plan::{Engaged, PlanRunner, PlanState};
use crate::{LinkMode, VehicleConfig};

#[derive(Debug, Error)]
pub enum CommandError {
    /// A revert is draining the trace; nothing may be transmitted until it
    /// finishes.
    #[error("revert in progress, command refused")]
    RevertInProgress,
    #[error(transparent)]
    Link(#[from] anyhow::Error),
}

/// Acknowledgement outcome of one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Ack(String),
    /// Nothing arrived within the wait window. Normal over a lossy link,
    /// not an error; the operator just issues the next command.
    NoResponse,
}

/// The public command surface. One operation per command kind, each funneled
/// through [`Vehicle::dispatch`] and its two gates: refuse everything while a
/// revert runs, and route through the override path while a plan is active.
pub struct Vehicle {
    link: Arc<CommandLink>,
    video: Option<VideoLink>,
    runner: PlanRunner,
    mode: LinkMode,
    ack_wait: Duration,
    distance_cm: u32,
    turn_deg: u32,
}

impl Vehicle {
    pub fn new(
        cfg: &VehicleConfig,
        link: Arc<CommandLink>,
        video: Option<VideoLink>,
        runner: PlanRunner,
    ) -> Self {
        Self {
            link,
            video,
            runner,
            mode: cfg.mode,
            ack_wait: Duration::from_millis(cfg.ack_wait_ms),
            distance_cm: cfg.default_distance_cm,
            turn_deg: cfg.turn_deg,
        }
    }

    pub async fn take_off(&self) -> Result<Reply, CommandError> {
        self.dispatch(Command::Takeoff).await
    }

    pub async fn land(&self) -> Result<Reply, CommandError> {
        self.dispatch(Command::Land).await
    }

    pub async fn hover(&self) -> Result<Reply, CommandError> {
        self.dispatch(Command::Stop).await
    }

    pub async fn turn_cw(&self) -> Result<Reply, CommandError> {
        self.dispatch(Command::RotateCw { deg: self.turn_deg }).await
    }

    pub async fn turn_ccw(&self) -> Result<Reply, CommandError> {
        self.dispatch(Command::RotateCcw { deg: self.turn_deg }).await
    }

    pub async fn up(&self) -> Result<Reply, CommandError> {
        self.dispatch(Command::Up { cm: self.distance_cm }).await
    }

    pub async fn down(&self) -> Result<Reply, CommandError> {
        self.dispatch(Command::Down { cm: self.distance_cm }).await
    }

    pub async fn forward(&self) -> Result<Reply, CommandError> {
        self.dispatch(Command::Forward { cm: self.distance_cm }).await
    }

    pub async fn back(&self) -> Result<Reply, CommandError> {
        self.dispatch(Command::Back { cm: self.distance_cm }).await
    }

    pub async fn left(&self) -> Result<Reply, CommandError> {
        self.dispatch(Command::Left { cm: self.distance_cm }).await
    }

    pub async fn right(&self) -> Result<Reply, CommandError> {
        self.dispatch(Command::Right { cm: self.distance_cm }).await
    }

    /// Starts the configured plan, or requests a revert when one is active.
    pub fn engage_plan(&self) -> Engaged {
        self.runner.engage()
    }

    pub fn plan_state(&self) -> PlanState {
        self.runner.state()
    }

    /// Latest decoded frame for the display or persistence collaborator.
    pub fn current_frame(&self) -> Option<VideoFrame> {
        self.video.as_ref().and_then(|v| v.current_frame())
    }

    /// Sends one command through the gates, waits the fixed acknowledgement
    /// window and consumes the response cell. The wait is deliberate
    /// throttling: at most one command per window.
    pub async fn dispatch(&self, cmd: Command) -> Result<Reply, CommandError> {
        if self.runner.is_reverting() {
            warn!("vehicle: '{}' refused, revert in progress", cmd);
            return Err(CommandError::RevertInProgress);
        }

        let overrode = self.runner.is_active();
        if overrode {
            self.runner.record_override(&cmd);
        }

        self.link.send(&cmd).await?;
        tokio::time::sleep(self.ack_wait).await;
        let raw = self.link.take_response();

        if overrode {
            self.runner.rearm();
        }

        let reply = match self.mode {
            LinkMode::Rehearsal => Reply::Ack(cmd.wire()),
            LinkMode::Live => match raw {
                Some(bytes) => Reply::Ack(String::from_utf8_lossy(&bytes).trim().to_string()),
                None => Reply::NoResponse,
            },
        };
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FlightConfig;
    use aero_link::LinkConfig;
    use std::time::Duration;
    use tokio::net::UdpSocket;
    use tokio::time::timeout;

    async fn setup(mode: LinkMode) -> (UdpSocket, Vehicle) {
        let sock = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let link_cfg = LinkConfig {
            addr: "127.0.0.1".to_string(),
            command_port: sock.local_addr().unwrap().port(),
            local_port: 0,
        };
        let link = Arc::new(CommandLink::connect(&link_cfg).await.unwrap());

        // drain the two setup datagrams
        let mut buf = [0u8; 64];
        sock.recv_from(&mut buf).await.unwrap();
        sock.recv_from(&mut buf).await.unwrap();

        let runner = PlanRunner::new(
            &FlightConfig { step_delay_ms: 100, plan: vec![Command::Takeoff] },
            link.clone(),
        );
        let cfg = VehicleConfig {
            mode,
            ack_wait_ms: 200,
            default_distance_cm: 100,
            turn_deg: 90,
        };
        (sock, Vehicle::new(&cfg, link, None, runner))
    }

    #[tokio::test]
    async fn live_mode_returns_the_vehicle_acknowledgement() {
        let (sock, vehicle) = setup(LinkMode::Live).await;

        let echo = tokio::spawn(async move {
            let mut buf = [0u8; 64];
            let (_, from) = sock.recv_from(&mut buf).await.unwrap();
            sock.send_to(b"ok", from).await.unwrap();
        });

        assert_eq!(vehicle.forward().await.unwrap(), Reply::Ack("ok".to_string()));
        echo.await.unwrap();
    }

    #[tokio::test]
    async fn live_mode_reports_a_silent_vehicle_as_no_response() {
        let (_sock, vehicle) = setup(LinkMode::Live).await;
        assert_eq!(vehicle.hover().await.unwrap(), Reply::NoResponse);
    }

    #[tokio::test]
    async fn rehearsal_mode_echoes_the_wire_text() {
        let (sock, vehicle) = setup(LinkMode::Rehearsal).await;
        assert_eq!(vehicle.turn_cw().await.unwrap(), Reply::Ack("cw 90".to_string()));

        // the datagram still went out even though no hardware answers
        let mut buf = [0u8; 64];
        let (n, _) = timeout(Duration::from_secs(1), sock.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&buf[..n], b"cw 90");
    }
}
