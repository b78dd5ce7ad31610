// src/debug.rs

use crate::perception::BandLayout;
use crate::types::{BandMidpoints, DebugConfig, Frame};
use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::{debug, info};

const ACTIVE_BAND: [u8; 3] = [0, 0, 255];
const INACTIVE_BAND: [u8; 3] = [128, 128, 128];
const MIDPOINT: [u8; 3] = [0, 255, 0];
const CENTER_LINE: [u8; 3] = [255, 0, 0];

/// Saves every Nth annotated frame as a PNG.
pub struct DebugRecorder {
    save_dir: PathBuf,
    every_n_frames: u64,
}

impl DebugRecorder {
    /// None when no save directory is configured.
    pub fn from_config(config: &DebugConfig) -> Result<Option<Self>> {
        let Some(dir) = &config.save_dir else {
            return Ok(None);
        };
        let save_dir = PathBuf::from(dir);
        std::fs::create_dir_all(&save_dir)
            .with_context(|| format!("Failed to create debug dir {}", save_dir.display()))?;

        info!("🖼️  Debug snapshots -> {} (every {} frames)", save_dir.display(), config.every_n_frames);
        Ok(Some(Self {
            save_dir,
            every_n_frames: config.every_n_frames.max(1),
        }))
    }

    pub fn should_record(&self, frame_index: u64) -> bool {
        frame_index % self.every_n_frames == 0
    }

    /// Annotates a copy of `frame` and writes it when `frame_index` is due.
    pub fn record(
        &self,
        frame_index: u64,
        frame: &Frame,
        layout: &BandLayout,
        active_bands: &[usize],
        midpoints: &BandMidpoints,
    ) -> Result<Option<PathBuf>> {
        if !self.should_record(frame_index) {
            return Ok(None);
        }

        let annotated = annotate(frame, layout, active_bands, midpoints);
        let path = self.save_dir.join(format!("frame_{:06}.png", frame_index));

        let img = image::RgbImage::from_raw(
            annotated.width as u32,
            annotated.height as u32,
            annotated.data,
        )
        .context("Frame buffer does not match its dimensions")?;
        img.save(&path)
            .with_context(|| format!("Failed to save {}", path.display()))?;

        debug!("Saved debug frame {}", path.display());
        Ok(Some(path))
    }
}

/// Draws band outlines, midpoints and the vertical center line.
pub fn annotate(
    frame: &Frame,
    layout: &BandLayout,
    active_bands: &[usize],
    midpoints: &BandMidpoints,
) -> Frame {
    let mut out = frame.clone();

    for band in layout.bands() {
        if band.height() == 0 {
            continue;
        }
        let color = if active_bands.contains(&band.index) {
            ACTIVE_BAND
        } else {
            INACTIVE_BAND
        };
        draw_rect(&mut out, band.y_start, band.y_end - 1, color);
    }

    let center_x = out.width / 2;
    for y in 0..out.height {
        out.set_pixel(center_x, y, CENTER_LINE);
    }

    for m in midpoints.values().flatten() {
        draw_dot(&mut out, m.x, m.y, 3, MIDPOINT);
    }

    out
}

fn draw_rect(frame: &mut Frame, y_top: usize, y_bottom: usize, color: [u8; 3]) {
    if frame.width == 0 {
        return;
    }
    let x_right = frame.width - 1;
    for x in 0..frame.width {
        frame.set_pixel(x, y_top, color);
        frame.set_pixel(x, y_bottom, color);
    }
    for y in y_top..=y_bottom {
        frame.set_pixel(0, y, color);
        frame.set_pixel(x_right, y, color);
    }
}

fn draw_dot(frame: &mut Frame, cx: usize, cy: usize, radius: usize, color: [u8; 3]) {
    let r2 = (radius * radius) as i64;
    for y in cy.saturating_sub(radius)..=cy + radius {
        for x in cx.saturating_sub(radius)..=cx + radius {
            let dx = x as i64 - cx as i64;
            let dy = y as i64 - cy as i64;
            if dx * dx + dy * dy <= r2 {
                frame.set_pixel(x, y, color);
            }
        }
    }
}
