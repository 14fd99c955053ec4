use anyhow::Result;

use aero_proto::command::Command;

use crate::{FlightConfig, VehicleConfig};

pub fn check_vehicle(cfg: &VehicleConfig) -> Result<()> {
    anyhow::ensure!(
        (100..=5000).contains(&cfg.ack_wait_ms),
        "vehicle.ack_wait_ms should be 100..5000"
    );
    anyhow::ensure!(
        (20..=500).contains(&cfg.default_distance_cm),
        "vehicle.default_distance_cm outside the accepted 20..500 cm"
    );
    anyhow::ensure!(
        (1..=360).contains(&cfg.turn_deg),
        "vehicle.turn_deg outside the accepted 1..360 degrees"
    );
    Ok(())
}

pub fn check_plan(cfg: &FlightConfig) -> Result<()> {
    anyhow::ensure!(!cfg.plan.is_empty(), "flight.plan is empty");
    anyhow::ensure!(
        cfg.step_delay_ms >= 100,
        "flight.step_delay_ms too small; steps need time to complete"
    );
    for (i, cmd) in cfg.plan.iter().enumerate() {
        anyhow::ensure!(
            !cmd.is_setup(),
            "flight.plan[{}]: setup verb '{}' does not belong in a plan",
            i,
            cmd
        );
        match *cmd {
            Command::Up { cm }
            | Command::Down { cm }
            | Command::Forward { cm }
            | Command::Back { cm }
            | Command::Left { cm }
            | Command::Right { cm } => {
                anyhow::ensure!(
                    (20..=500).contains(&cm),
                    "flight.plan[{}]: '{}' outside the accepted 20..500 cm",
                    i,
                    cmd
                );
            }
            Command::RotateCw { deg } | Command::RotateCcw { deg } => {
                anyhow::ensure!(
                    (1..=360).contains(&deg),
                    "flight.plan[{}]: '{}' outside the accepted 1..360 degrees",
                    i,
                    cmd
                );
            }
            _ => {}
        }
    }
    Ok(())
}
