// src/main.rs

mod config;
mod control;
mod debug;
mod dispatch;
mod perception;
mod pipeline;
mod preprocessing;
mod types;
mod video_processor;

use anyhow::{Context, Result};
use clap::Parser;
use pipeline::ControlLoop;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use types::Config;

/// Camera-driven line follower for a differential-drive robot
#[derive(Parser, Debug)]
#[command(name = "lane-pilot", version, about)]
struct Cli {
    /// Path to the YAML configuration
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Stop after this many frames (overrides run.max_frames)
    #[arg(long)]
    max_frames: Option<u64>,

    /// Log filter, e.g. "lane_pilot=debug" (RUST_LOG wins when set)
    #[arg(long)]
    log: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Config is loaded before logging so its level can seed the filter
    let config = Config::load(&cli.config);
    let default_filter = cli.log.clone().unwrap_or_else(|| match &config {
        Ok(c) => c.logging.level.clone(),
        Err(_) => "lane_pilot=info".to_string(),
    });
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&default_filter)),
        )
        .init();

    info!("🤖 Lane Pilot Starting");

    let mut config = match config {
        Ok(c) => c,
        Err(e) => {
            error!("❌ {:#}", e);
            return Err(e);
        }
    };
    if let Some(max) = cli.max_frames {
        config.run.max_frames = Some(max);
    }
    info!("✓ Configuration loaded from {}", cli.config.display());

    let mut source = video_processor::open_source(&config.source)
        .context("Failed to open frame source")?;
    info!("✓ Frame source ready ({:?})", config.source.kind);

    let mask = perception::build_mask_producer(&config.mask)?;
    let transport = dispatch::build_transport(&config.dispatch)?;
    let mut control = ControlLoop::new(&config, mask, transport)?;

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Ctrl-C received, stopping after current frame");
                    stop.store(true, Ordering::Relaxed);
                }
                Err(e) => warn!("Failed to listen for Ctrl-C: {}", e),
            }
        });
    }

    let summary = control.run(source.as_mut(), &stop, &config.run).await?;

    info!("\n========================================");
    info!("✓ Run finished");
    info!("  Frames processed: {}", summary.total_frames);
    info!("  Commands sent: {}", summary.commands_sent);
    info!("  ⚠️  Send failures: {}", summary.send_failures);
    info!("  Processing Speed: {:.1} FPS", summary.fps);
    match serde_json::to_string(&summary) {
        Ok(json) => info!("Metrics: {}", json),
        Err(e) => warn!("Failed to serialize metrics: {}", e),
    }
    info!("========================================\n");

    Ok(())
}
