use crate::config::{Config, Mode};
use crate::fps_counter::spot_fps;
use crate::history::HistoryBuffer;
use crate::rollup::PeriodicRollup;
use crate::sink::{Row, Sinks};
use crate::source::{SourceError, TimingSource};
use crate::timing::FrameTiming;
use crate::window::WindowAggregator;
use chrono::Local;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info};

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub mode: Mode,
    pub batch_size: usize,
    pub history_capacity: usize,
    pub poll_interval: Duration,
    pub sampling_interval: Duration,
    pub samples_per_rollup: usize,
}

impl From<&Config> for Settings {
    fn from(config: &Config) -> Self {
        Self {
            mode: config.output.mode,
            batch_size: match config.output.mode {
                Mode::Frames => config.sampling.batch_size,
                Mode::Rollup => config.rollup_batch_size(),
            },
            history_capacity: config.history_capacity(),
            poll_interval: config.poll_interval(),
            sampling_interval: config.sampling_interval(),
            samples_per_rollup: config.samples_per_rollup(),
        }
    }
}

impl Settings {
    /// Sleep between two cycles of the worker loop.
    pub fn cycle_interval(&self) -> Duration {
        match self.mode {
            Mode::Frames => self.poll_interval,
            Mode::Rollup => self.sampling_interval,
        }
    }
}

/// Outcome of a single poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cycle {
    /// The source returned fewer frames than requested.
    NotReady,
    /// Every polled frame had already been ingested.
    NoNewData,
    /// A spot sample was taken but no rollup is due yet.
    Sampled { fps: u32 },
    /// Rows for this many frames (or rollups) were written.
    Emitted(usize),
}

enum Pipeline {
    Frames {
        history: HistoryBuffer,
        window: WindowAggregator,
    },
    Rollup(PeriodicRollup),
}

/// Worker state: everything the polling loop owns exclusively.
pub struct Aggregator<S> {
    source: S,
    sinks: Sinks,
    batch: Vec<FrameTiming>,
    pipeline: Pipeline,
}

impl<S: TimingSource> Aggregator<S> {
    pub fn new(source: S, sinks: Sinks, settings: &Settings) -> Self {
        let pipeline = match settings.mode {
            Mode::Frames => Pipeline::Frames {
                history: HistoryBuffer::new(settings.history_capacity),
                window: WindowAggregator::new(),
            },
            Mode::Rollup => Pipeline::Rollup(PeriodicRollup::new(settings.samples_per_rollup)),
        };

        Self {
            source,
            sinks,
            batch: vec![FrameTiming::default(); settings.batch_size.max(1)],
            pipeline,
        }
    }

    /// Polls the source once and forwards whatever became available to the sinks.
    pub fn step(&mut self) -> Result<Cycle, LoggerError> {
        let count = self.source.poll(&mut self.batch)?;
        if count < self.batch.len() {
            debug!(count, requested = self.batch.len(), "timing source not ready");
            return Ok(Cycle::NotReady);
        }

        let sinks = &mut self.sinks;
        let cycle = match &mut self.pipeline {
            Pipeline::Frames { history, window } => {
                let new_frames = history.merge(&self.batch);
                if new_frames == 0 {
                    return Ok(Cycle::NoNewData);
                }

                let summary = window.drain_new(history, |frame| {
                    sinks.write(&Row::Frame(frame));
                });
                match summary {
                    Some(summary) => {
                        sinks.write(&Row::Summary(summary));
                        Cycle::Emitted(summary.frames)
                    }
                    None => Cycle::NoNewData,
                }
            }
            Pipeline::Rollup(rollup) => {
                let fps = spot_fps(&self.batch);
                match rollup.push(fps, Local::now()) {
                    Some(row) => {
                        sinks.write(&Row::Rollup(row));
                        Cycle::Emitted(1)
                    }
                    None => Cycle::Sampled { fps },
                }
            }
        };

        sinks.flush();
        Ok(cycle)
    }

    #[cfg(test)]
    pub fn history(&self) -> Option<&HistoryBuffer> {
        match &self.pipeline {
            Pipeline::Frames { history, .. } => Some(history),
            Pipeline::Rollup(_) => None,
        }
    }
}

/// Polls a timing source on a dedicated thread until stopped.
pub struct FpsLogger {
    cancellation: Arc<AtomicBool>,
    handle: Option<JoinHandle<Result<(), LoggerError>>>,
}

impl FpsLogger {
    pub fn spawn<S>(source: S, sinks: Sinks, settings: Settings) -> Result<Self, LoggerError>
    where
        S: TimingSource + Send + 'static,
    {
        let cancellation = Arc::new(AtomicBool::new(false));
        let interval = settings.cycle_interval();
        let aggregator = Aggregator::new(source, sinks, &settings);

        let handle = thread::Builder::new()
            .name("fps-logger".into())
            .spawn({
                let cancellation = cancellation.clone();
                move || Self::run_thread(aggregator, cancellation, interval)
            })
            .map_err(LoggerError::SpawnFailed)?;

        info!(mode = ?settings.mode, ?interval, "fps logger started");
        Ok(Self {
            cancellation,
            handle: Some(handle),
        })
    }

    /// Whether the worker has exited, either because it was stopped or because the source was lost.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Signals the worker to stop and waits for it; a sleep in progress completes first.
    pub fn stop(mut self) -> Result<(), LoggerError> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<(), LoggerError> {
        self.cancellation.store(true, Ordering::Release);
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| LoggerError::WorkerPanicked)?,
            None => Ok(()),
        }
    }

    fn run_thread<S: TimingSource>(
        mut aggregator: Aggregator<S>,
        cancellation: Arc<AtomicBool>,
        interval: Duration,
    ) -> Result<(), LoggerError> {
        while !cancellation.load(Ordering::Acquire) {
            match aggregator.step() {
                Ok(cycle) => debug!(?cycle, "cycle complete"),
                Err(e) => {
                    error!("stopping fps logger: {e}");
                    aggregator.sinks.flush();
                    return Err(e);
                }
            }

            thread::sleep(interval);
        }

        aggregator.sinks.flush();
        info!("fps logger stopped");
        Ok(())
    }
}

impl Drop for FpsLogger {
    fn drop(&mut self) {
        self.shutdown().ok();
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    #[error(transparent)]
    SourceUnavailable(#[from] SourceError),
    #[error("failed to start worker thread: {0}")]
    SpawnFailed(std::io::Error),
    #[error("worker thread panicked")]
    WorkerPanicked,
}
