use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncBufReadExt;
use tracing::{info, warn};

use aero_flight::{doctor as flight_doctor, FlightConfig, PlanRunner, Reply, Vehicle, VehicleConfig};
use aero_link::{doctor as link_doctor, CommandLink, LinkConfig, VideoLink};
use aero_video::pipe::PipeDecoder;
use aero_video::VideoConfig;

#[derive(Debug, Parser)]
#[command(name = "aero", version, about = "AEROlink - Quadcopter Command Link & Flight Sequencing")]
struct Cli {
    #[arg(long)]
    config: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Sanity-check the config before going anywhere near the hardware.
    Doctor,
    /// Print the configured plan and the inverse sequence a revert would send.
    Plan,
    /// Connect to the vehicle and take commands from stdin.
    Run,
}

#[derive(Debug, serde::Deserialize)]
struct Config {
    link: LinkConfig,
    vehicle: VehicleConfig,
    video: VideoConfig,
    flight: FlightConfig,
}

fn load_config(path: &str) -> Result<Config> {
    let s = std::fs::read_to_string(path).context("read config")?;
    Ok(toml::from_str(&s).context("parse config toml")?)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;

    match cli.cmd {
        Command::Doctor => doctor(&cfg)?,
        Command::Plan => plan(&cfg),
        Command::Run => run(&cfg).await?,
    }
    Ok(())
}

fn doctor(cfg: &Config) -> Result<()> {
    info!("doctor: starting");

    link_doctor::check_link(&cfg.link, cfg.video.port)?;
    flight_doctor::check_vehicle(&cfg.vehicle)?;
    flight_doctor::check_plan(&cfg.flight)?;

    if cfg.video.enable {
        anyhow::ensure!(cfg.video.width > 0 && cfg.video.height > 0, "video geometry invalid");
        let dir = Path::new(&cfg.video.capture_dir);
        if dir.exists() {
            anyhow::ensure!(dir.is_dir(), "video.capture_dir is not a dir: {}", cfg.video.capture_dir);
        }
    }

    info!("doctor: OK");
    Ok(())
}

fn plan(cfg: &Config) {
    println!("plan ({} steps):", cfg.flight.plan.len());
    for (i, cmd) in cfg.flight.plan.iter().enumerate() {
        println!("  {:2}  {}", i, cmd.wire());
    }
    println!("a full revert would send:");
    for cmd in cfg.flight.plan.iter().rev() {
        println!("      {}", cmd.inverse().wire());
    }
}

async fn run(cfg: &Config) -> Result<()> {
    info!("run: starting in {:?} mode", cfg.vehicle.mode);

    let link = Arc::new(CommandLink::connect(&cfg.link).await?);

    let video = if cfg.video.enable {
        let bin = cfg.video.ffmpeg_bin.as_deref().unwrap_or("ffmpeg");
        let decoder = PipeDecoder::spawn(bin, cfg.video.width, cfg.video.height)?;
        Some(VideoLink::start(&cfg.video, Box::new(decoder)).await?)
    } else {
        None
    };

    let runner = PlanRunner::new(&cfg.flight, link.clone());
    let vehicle = Vehicle::new(&cfg.vehicle, link.clone(), video, runner);

    println!("aero console ready.");
    println!("commands: takeoff land hover up down forward back left right cw ccw plan snap quit");

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("run: interrupted, closing links");
                break;
            }
            line = lines.next_line() => match line? {
                Some(line) => line,
                None => break,
            },
        };

        match line.trim() {
            "" => continue,
            "quit" | "exit" => break,
            "plan" => {
                println!("plan: {:?}", vehicle.engage_plan());
                continue;
            }
            "snap" => {
                match vehicle.current_frame() {
                    Some(frame) => match frame.save_timestamped(Path::new(&cfg.video.capture_dir)) {
                        Ok(path) => println!("saved {}", path.display()),
                        Err(e) => warn!("run: snapshot failed: {:#}", e),
                    },
                    None => println!("no frame yet"),
                }
                continue;
            }
            word => {
                let result = match word {
                    "takeoff" => vehicle.take_off().await,
                    "land" => vehicle.land().await,
                    "hover" => vehicle.hover().await,
                    "up" => vehicle.up().await,
                    "down" => vehicle.down().await,
                    "forward" => vehicle.forward().await,
                    "back" => vehicle.back().await,
                    "left" => vehicle.left().await,
                    "right" => vehicle.right().await,
                    "cw" => vehicle.turn_cw().await,
                    "ccw" => vehicle.turn_ccw().await,
                    other => {
                        println!("unknown command: {}", other);
                        continue;
                    }
                };
                match result {
                    Ok(Reply::Ack(text)) => println!("{}", text),
                    Ok(Reply::NoResponse) => println!("No response..."),
                    Err(e) => println!("refused: {}", e),
                }
            }
        }
    }

    link.close();
    Ok(())
}
