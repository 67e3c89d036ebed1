mod cli;
mod config;
mod fps_counter;
mod history;
mod logger;
mod rollup;
mod sink;
mod source;
mod timing;
mod window;

use crate::config::{Config, ConfigError, Mode};
use crate::logger::{FpsLogger, LoggerError, Settings};
use crate::sink::{ConsoleSink, CsvSink, RowKind, Sinks};
use crate::source::SimulatedCompositor;
use std::process::ExitCode;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_DIRECTIVE: &str = "vr_fps_logger=info";
const STOP_CHECK_INTERVAL: Duration = Duration::from_millis(200);

fn main() -> ExitCode {
    let args = cli::parse();

    let filter = match args.log_level.as_deref() {
        Some(level) => EnvFilter::try_new(level).ok(),
        None => EnvFilter::try_from_default_env().ok(),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter.unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_DIRECTIVE)))
        .with_writer(std::io::stderr)
        .init();

    println!("VR FPS Logger");
    match run(args) {
        Ok(()) => {
            println!("Bye");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: cli::Args) -> Result<(), AppError> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(path) = args.output {
        config.output.path = Some(path);
    }
    if let Some(mode) = args.mode {
        config.output.mode = mode;
    }
    if let Some(fps) = args.simulate_fps {
        config.simulation.fps = fps;
    }
    config.validate()?;

    let mut sinks = Sinks::new().with(ConsoleSink::stdout());
    if let Some(path) = &config.output.path {
        let kind = match config.output.mode {
            Mode::Frames => RowKind::Frames,
            Mode::Rollup => RowKind::Rollups,
        };
        let file = CsvSink::append_to(path, kind).map_err(|e| AppError::Output {
            path: path.display().to_string(),
            source: e,
        })?;
        println!("Logging to {}", path.display());
        sinks = sinks.with(file);
    }

    let source = SimulatedCompositor::new(config.simulation.fps)
        .with_session_frames(config.simulation.session_frames);
    info!(fps = config.simulation.fps, "using simulated compositor");

    let logger = FpsLogger::spawn(source, sinks, Settings::from(&config))?;

    let (stop_tx, stop_rx) = mpsc::channel();
    thread::spawn(move || {
        let mut line = String::new();
        std::io::stdin().read_line(&mut line).ok();
        stop_tx.send(()).ok();
    });

    println!("Press Enter to stop");
    loop {
        match stop_rx.recv_timeout(STOP_CHECK_INTERVAL) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) if logger.is_finished() => break,
            Err(RecvTimeoutError::Timeout) => {}
        }
    }

    println!("Exiting...");
    logger.stop()?;
    Ok(())
}

#[derive(Debug, thiserror::Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Logger(#[from] LoggerError),
    #[error("failed to open {path}: {source}")]
    Output {
        path: String,
        source: std::io::Error,
    },
}
