use chrono::{DateTime, Local};

/// Min/max/average over one completed batch of FPS samples.
#[derive(Debug, Clone, PartialEq)]
pub struct Rollup {
    pub at: DateTime<Local>,
    pub min: u32,
    pub max: u32,
    pub avg: f64,
}

impl Rollup {
    pub fn epoch_seconds(&self) -> i64 {
        self.at.timestamp()
    }
}

/// Collects FPS samples into non-overlapping batches of a fixed size.
#[derive(Debug)]
pub struct PeriodicRollup {
    samples: Vec<u32>,
    samples_per_rollup: usize,
}

impl PeriodicRollup {
    pub fn new(samples_per_rollup: usize) -> Self {
        let samples_per_rollup = samples_per_rollup.max(1);
        Self {
            samples: Vec::with_capacity(samples_per_rollup),
            samples_per_rollup,
        }
    }

    #[cfg(test)]
    pub fn pending(&self) -> usize {
        self.samples.len()
    }

    /// Records a sample; returns the rollup once the batch is complete.
    pub fn push(&mut self, fps: u32, at: DateTime<Local>) -> Option<Rollup> {
        self.samples.push(fps);
        if self.samples.len() < self.samples_per_rollup {
            return None;
        }

        let min = self.samples.iter().copied().min().unwrap_or_default();
        let max = self.samples.iter().copied().max().unwrap_or_default();
        let sum: u64 = self.samples.iter().map(|&fps| fps as u64).sum();
        let avg = sum as f64 / self.samples.len() as f64;
        self.samples.clear();

        Some(Rollup { at, min, max, avg })
    }
}
