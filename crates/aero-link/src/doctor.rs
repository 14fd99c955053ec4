use anyhow::Result;
use std::net::IpAddr;

use crate::LinkConfig;

pub fn check_link(cfg: &LinkConfig, video_port: u16) -> Result<()> {
    anyhow::ensure!(
        cfg.addr.parse::<IpAddr>().is_ok(),
        "link.addr is not an IP address: {}",
        cfg.addr
    );
    anyhow::ensure!(cfg.command_port != 0, "link.command_port must be nonzero");
    anyhow::ensure!(
        cfg.command_port != video_port,
        "link.command_port and video.port must differ"
    );
    Ok(())
}
