pub mod doctor;
pub mod plan;
pub mod vehicle;

pub use plan::{Engaged, PlanRunner, PlanState};
pub use vehicle::{CommandError, Reply, Vehicle};

use aero_proto::command::Command;
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkMode {
    /// Real acknowledgements from the vehicle.
    Live,
    /// No hardware attached: every command echoes its own wire text back, so
    /// the whole control path can be exercised on a desk.
    Rehearsal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VehicleConfig {
    pub mode: LinkMode,

    /// How long to wait for an acknowledgement after each send. Doubles as
    /// the command rate limit: at most one command per window.
    pub ack_wait_ms: u64,

    /// Distance for the facade's fixed-size motion operations.
    pub default_distance_cm: u32,
    pub turn_deg: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FlightConfig {
    /// Pause between autonomous steps. Pacing is purely time-based; the link
    /// cannot confirm that a step finished.
    pub step_delay_ms: u64,
    pub plan: Vec<Command>,
}
