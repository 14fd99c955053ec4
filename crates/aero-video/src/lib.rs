pub mod pipe;

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use time::macros::format_description;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct VideoConfig {
    pub enable: bool,
    pub port: u16,

    /// Stream geometry. Fixed by the vehicle's encoder (960x720 on the
    /// reference hardware); the raw decoder output is framed with it.
    pub width: u32,
    pub height: u32,

    /// Where `snap` drops timestamped JPEGs.
    pub capture_dir: String,

    /// Decoder binary, defaults to `ffmpeg` on PATH.
    pub ffmpeg_bin: Option<String>,
}

/// One decoded frame: 3 bytes per pixel, rows at `linesize` stride. Readers
/// get their own copy; the link's cell only ever keeps the newest frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub linesize: u32,
}

/// Decode capability: one complete access unit in, zero or more frames out.
/// A decoder may buffer internally, so frames from an earlier unit can
/// surface on a later call.
#[async_trait]
pub trait FrameDecoder: Send {
    async fn decode(&mut self, access_unit: &[u8]) -> Result<Vec<VideoFrame>>;
}

impl VideoFrame {
    /// Crops each row from `linesize` stride down to the visible width.
    pub fn to_rgb(&self) -> Result<image::RgbImage> {
        let w = self.width as usize;
        let h = self.height as usize;
        let stride = self.linesize as usize;
        anyhow::ensure!(stride >= w * 3, "linesize {} below row width {}", stride, w * 3);
        anyhow::ensure!(self.data.len() >= stride * h, "frame buffer truncated");

        let mut rgb = Vec::with_capacity(w * h * 3);
        for row in 0..h {
            let start = row * stride;
            rgb.extend_from_slice(&self.data[start..start + w * 3]);
        }
        image::RgbImage::from_raw(self.width, self.height, rgb).context("assemble rgb image")
    }

    /// Writes the frame as a timestamped JPEG and returns its path.
    pub fn save_timestamped(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("create capture dir {}", dir.display()))?;
        let fmt = format_description!("[year]-[month]-[day]_[hour]-[minute]-[second]");
        let stamp = time::OffsetDateTime::now_utc()
            .format(&fmt)
            .context("format snapshot timestamp")?;
        let path = dir.join(format!("{}.jpg", stamp));
        self.to_rgb()?
            .save(&path)
            .with_context(|| format!("write snapshot {}", path.display()))?;
        Ok(path)
    }
}
