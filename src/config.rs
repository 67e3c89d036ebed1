use crate::history::HistoryBuffer;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// What the logger reports.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// One row per frame with FPS over the trailing second.
    #[default]
    Frames,
    /// Periodic min/max/avg over spot FPS samples.
    Rollup,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sampling: SamplingConfig,
    pub rollup: RollupConfig,
    pub output: OutputConfig,
    pub simulation: SimulationConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Highest frame rate the history is sized for.
    pub max_fps: usize,
    /// Number of frames requested from the compositor per poll.
    pub batch_size: usize,
    pub measurements_per_second: usize,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            max_fps: 160,
            batch_size: 128,
            measurements_per_second: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RollupConfig {
    pub sampling_interval_ms: u64,
    pub interval_secs: u64,
}

impl Default for RollupConfig {
    fn default() -> Self {
        Self {
            sampling_interval_ms: 100,
            interval_secs: 10,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub mode: Mode,
    /// CSV file rows are appended to. Console only if unset.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub fps: f64,
    /// Frames after which the simulated session is lost.
    pub session_frames: Option<u32>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            fps: 90.0,
            session_frames: None,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path)?;
        let config = Self::parse(&content)?;
        info!("loaded config from {}", path.display());
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let sampling = &self.sampling;
        if sampling.max_fps == 0 || sampling.batch_size == 0 {
            return Err(ConfigError::Invalid(
                "max_fps and batch_size must be positive".into(),
            ));
        }
        if sampling.measurements_per_second == 0 || sampling.measurements_per_second > 1000 {
            return Err(ConfigError::Invalid(
                "measurements_per_second must be between 1 and 1000".into(),
            ));
        }
        // Every frame of a poll has to fit into the history to be logged.
        if self.output.mode == Mode::Frames && sampling.batch_size > self.history_capacity() {
            return Err(ConfigError::Invalid(format!(
                "batch_size of {} exceeds the history of {} frames sized for max_fps {}",
                sampling.batch_size,
                self.history_capacity(),
                sampling.max_fps
            )));
        }

        let rollup = &self.rollup;
        if rollup.sampling_interval_ms == 0 || rollup.interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "rollup intervals must be positive".into(),
            ));
        }
        let interval_ms = rollup.interval_secs.checked_mul(1000).ok_or_else(|| {
            ConfigError::Invalid(format!(
                "rollup interval of {}s is too large",
                rollup.interval_secs
            ))
        })?;
        if interval_ms % rollup.sampling_interval_ms != 0 {
            return Err(ConfigError::Invalid(format!(
                "rollup interval of {}s is not a multiple of the {}ms sampling interval",
                rollup.interval_secs, rollup.sampling_interval_ms
            )));
        }

        if !(self.simulation.fps.is_finite() && self.simulation.fps > 0.0) {
            return Err(ConfigError::Invalid(
                "simulated fps must be positive".into(),
            ));
        }

        Ok(())
    }

    pub fn history_capacity(&self) -> usize {
        HistoryBuffer::capacity_for(
            self.sampling.max_fps,
            self.sampling.measurements_per_second,
        )
    }

    /// Frames requested per poll in rollup mode: at least one second at `max_fps`,
    /// so spot samples are not capped by the batch.
    pub fn rollup_batch_size(&self) -> usize {
        self.sampling.batch_size.max(self.sampling.max_fps + 1)
    }

    /// Delay between polls when logging individual frames.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(1000 / self.sampling.measurements_per_second.max(1) as u64)
    }

    pub fn sampling_interval(&self) -> Duration {
        Duration::from_millis(self.rollup.sampling_interval_ms)
    }

    pub fn samples_per_rollup(&self) -> usize {
        let interval_ms = self.rollup.interval_secs.saturating_mul(1000);
        (interval_ms / self.rollup.sampling_interval_ms.max(1)) as usize
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),
    #[error(transparent)]
    Read(#[from] std::io::Error),
    #[error(transparent)]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}
