use crate::config::Mode;
use clap::Parser;
use std::path::PathBuf;

/// Logs per-frame FPS and periodic FPS rollups of a VR compositor.
#[derive(Parser, Debug)]
#[command(name = "vr-fps-logger", version, about)]
pub struct Args {
    /// CSV file to append rows to.
    pub output: Option<PathBuf>,

    /// Config file path.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Report individual frames or periodic rollups.
    #[arg(short, long, value_enum)]
    pub mode: Option<Mode>,

    /// Frame rate of the simulated compositor.
    #[arg(long)]
    pub simulate_fps: Option<f64>,

    /// Log level override (debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,
}

pub fn parse() -> Args {
    Args::parse()
}
