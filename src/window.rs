use crate::history::HistoryBuffer;
use crate::timing::FrameTiming;

/// A frame together with the number of frames presented in the second leading up to it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameFps {
    pub fps: u32,
    pub timing: FrameTiming,
}

/// Aggregate over all frames surfaced by a single poll.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollSummary {
    pub frames: usize,
    pub min: u32,
    pub max: u32,
    pub avg: f64,
}

impl PollSummary {
    fn new(fps: u32) -> Self {
        Self {
            frames: 1,
            min: fps,
            max: fps,
            avg: fps as f64,
        }
    }

    fn add(&mut self, fps: u32) {
        // Running mean.
        self.frames += 1;
        self.min = self.min.min(fps);
        self.max = self.max.max(fps);
        self.avg += (fps as f64 - self.avg) / self.frames as f64;
    }
}

/// Computes per-frame FPS over a trailing one second window for frames
/// that have not been surfaced yet.
#[derive(Debug, Default)]
pub struct WindowAggregator {
    last_logged_index: Option<u32>,
}

impl WindowAggregator {
    pub const WINDOW_SECONDS: f64 = 1.0;

    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn last_logged_index(&self) -> Option<u32> {
        self.last_logged_index
    }

    /// Emits every frame in `history` newer than the last one emitted, oldest first.
    ///
    /// Returns `None` without touching any state if there is nothing new.
    pub fn drain_new<F>(&mut self, history: &HistoryBuffer, mut emit: F) -> Option<PollSummary>
    where
        F: FnMut(FrameFps),
    {
        let last_logged = self.last_logged_index;
        let first_new = history
            .iter()
            .position(|timing| last_logged.map_or(true, |last| timing.frame_index > last))?;

        let mut summary: Option<PollSummary> = None;
        let mut window_start = 0;

        for current in first_new..history.len() {
            let Some(timing) = history.get(current) else {
                break;
            };

            while window_start < current
                && history.get(window_start).map_or(false, |oldest| {
                    timing.system_time_seconds - oldest.system_time_seconds
                        >= Self::WINDOW_SECONDS
                })
            {
                window_start += 1;
            }

            let fps = (current - window_start + 1) as u32;
            emit(FrameFps {
                fps,
                timing: *timing,
            });
            self.last_logged_index = Some(timing.frame_index);

            match summary.as_mut() {
                Some(summary) => summary.add(fps),
                None => summary = Some(PollSummary::new(fps)),
            }
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BATCH: u32 = 128;

    fn batch_ending_at(newest: u32, spacing: impl Fn(u32) -> f64) -> Vec<FrameTiming> {
        (newest.saturating_sub(BATCH - 1).max(1)..=newest)
            .map(|index| FrameTiming::new(index, spacing(index)))
            .collect()
    }

    fn brute_force_fps(history: &HistoryBuffer, frame_index: u32) -> u32 {
        let frames: Vec<_> = history.iter().copied().collect();
        let current = frames
            .iter()
            .position(|timing| timing.frame_index == frame_index)
            .expect("frame is in history");
        let now = frames[current].system_time_seconds;
        frames[..=current]
            .iter()
            .filter(|timing| now - timing.system_time_seconds < WindowAggregator::WINDOW_SECONDS)
            .count() as u32
    }

    #[test]
    fn steady_90_hz_reports_90_fps() {
        let mut history = HistoryBuffer::new(200);
        let mut aggregator = WindowAggregator::new();
        let mut last_fps = None;

        for newest in (45..=300).step_by(45).chain(std::iter::once(300)) {
            history.merge(&batch_ending_at(newest, |index| index as f64 / 90.0));
            aggregator.drain_new(&history, |row| last_fps = Some((row.timing.frame_index, row.fps)));
        }

        let (index, fps) = last_fps.expect("frames were emitted");
        assert_eq!(index, 300);
        assert!((89..=91).contains(&fps), "fps was {fps}");
    }

    #[test]
    fn emits_each_frame_once_in_order() {
        let mut history = HistoryBuffer::new(200);
        let mut aggregator = WindowAggregator::new();
        let mut emitted = Vec::new();

        for newest in [128, 128, 170, 171, 171, 260, 300] {
            history.merge(&batch_ending_at(newest, |index| index as f64 / 120.0));
            aggregator.drain_new(&history, |row| emitted.push(row.timing.frame_index));
        }

        assert_eq!(emitted, (1..=300).collect::<Vec<_>>());
        assert_eq!(aggregator.last_logged_index(), Some(300));
    }

    #[test]
    fn matches_brute_force_window_count() {
        let mut history = HistoryBuffer::new(240);
        let mut aggregator = WindowAggregator::new();

        // Irregular pacing: bursts of fast frames followed by stalls.
        let time = |index: u32| index as f64 / 100.0 + (index / 25) as f64 * 0.07;

        for newest in [128, 190, 250, 251, 400] {
            history.merge(&batch_ending_at(newest, time));
            let mut rows = Vec::new();
            aggregator.drain_new(&history, |row| rows.push(row));

            for row in rows {
                assert_eq!(row.fps, brute_force_fps(&history, row.timing.frame_index));
            }
        }
    }

    #[test]
    fn nothing_new_leaves_state_untouched() {
        let mut history = HistoryBuffer::new(200);
        let mut aggregator = WindowAggregator::new();
        history.merge(&batch_ending_at(128, |index| index as f64 / 90.0));
        aggregator.drain_new(&history, |_| {});

        let mut emitted = 0;
        let summary = aggregator.drain_new(&history, |_| emitted += 1);

        assert_eq!(summary, None);
        assert_eq!(emitted, 0);
        assert_eq!(aggregator.last_logged_index(), Some(128));
    }

    #[test]
    fn summary_bounds_the_average() {
        let mut history = HistoryBuffer::new(200);
        let mut aggregator = WindowAggregator::new();
        history.merge(&batch_ending_at(128, |index| index as f64 / 60.0));

        let summary = aggregator
            .drain_new(&history, |_| {})
            .expect("summary for new frames");

        assert_eq!(summary.frames, 128);
        assert_eq!(summary.min, 1);
        assert!((59..=61).contains(&summary.max));
        assert!(summary.min as f64 <= summary.avg && summary.avg <= summary.max as f64);
    }
}
