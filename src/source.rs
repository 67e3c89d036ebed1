use crate::timing::FrameTiming;
use std::time::Instant;
use tracing::debug;

/// Provider of the most recent frame timings known to the presentation subsystem.
pub trait TimingSource {
    /// Fills `batch` with up to `batch.len()` of the most recent frames,
    /// oldest first, and returns how many were written.
    ///
    /// Fewer frames than requested means the subsystem does not have enough
    /// history yet; that is not an error.
    fn poll(&mut self, batch: &mut [FrameTiming]) -> Result<usize, SourceError>;
}

impl<T: TimingSource + ?Sized> TimingSource for Box<T> {
    fn poll(&mut self, batch: &mut [FrameTiming]) -> Result<usize, SourceError> {
        (**self).poll(batch)
    }
}

/// In-process stand-in for a compositor presenting frames at a fixed rate.
#[derive(Debug)]
pub struct SimulatedCompositor {
    fps: f64,
    retained: usize,
    session_frames: Option<u32>,
    started: Instant,
}

impl SimulatedCompositor {
    /// Number of frames the simulated compositor keeps around for polling.
    pub const RETAINED_FRAMES: usize = 1024;

    pub fn new(fps: f64) -> Self {
        Self {
            fps: fps.max(f64::MIN_POSITIVE),
            retained: Self::RETAINED_FRAMES,
            session_frames: None,
            started: Instant::now(),
        }
    }

    /// Ends the session after `frames` frames have been presented.
    pub fn with_session_frames(mut self, frames: Option<u32>) -> Self {
        self.session_frames = frames;
        self
    }

    /// Polls as if `elapsed_seconds` had passed since the session started.
    pub fn poll_at(
        &self,
        elapsed_seconds: f64,
        batch: &mut [FrameTiming],
    ) -> Result<usize, SourceError> {
        let presented = (elapsed_seconds.max(0.0) * self.fps).floor() as u32;
        if let Some(limit) = self.session_frames {
            if presented > limit {
                return Err(SourceError::Unavailable(format!(
                    "session ended after {limit} frames"
                )));
            }
        }

        let available = (presented as usize).min(self.retained);
        let count = available.min(batch.len());
        let first = presented - count as u32 + 1;

        for (slot, frame_index) in batch.iter_mut().zip(first..=presented) {
            *slot = self.frame(frame_index);
        }

        debug!(presented, count, "simulated poll");
        Ok(count)
    }

    fn frame(&self, frame_index: u32) -> FrameTiming {
        let interval_ms = (1000.0 / self.fps) as f32;
        let render_ms = interval_ms * 0.7;
        FrameTiming {
            num_frame_presents: 1,
            pre_submit_gpu_ms: render_ms * 0.6,
            post_submit_gpu_ms: render_ms * 0.1,
            total_render_gpu_ms: render_ms,
            compositor_render_gpu_ms: 1.2,
            compositor_render_cpu_ms: 0.4,
            compositor_idle_cpu_ms: interval_ms - render_ms,
            client_frame_interval_ms: interval_ms,
            new_poses_ready_ms: 0.5,
            new_frame_ready_ms: render_ms,
            compositor_update_start_ms: render_ms + 0.2,
            compositor_update_end_ms: render_ms + 0.4,
            compositor_render_start_ms: render_ms + 0.5,
            ..FrameTiming::new(frame_index, frame_index as f64 / self.fps)
        }
    }
}

impl TimingSource for SimulatedCompositor {
    fn poll(&mut self, batch: &mut [FrameTiming]) -> Result<usize, SourceError> {
        self.poll_at(self.started.elapsed().as_secs_f64(), batch)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("timing source unavailable: {0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_ready_until_enough_frames() {
        let compositor = SimulatedCompositor::new(90.0);
        let mut batch = [FrameTiming::default(); 128];

        assert_eq!(compositor.poll_at(0.0, &mut batch).ok(), Some(0));
        assert_eq!(compositor.poll_at(0.5, &mut batch).ok(), Some(45));
        assert_eq!(batch[0].frame_index, 1);
        assert_eq!(batch[44].frame_index, 45);
    }

    #[test]
    fn returns_newest_frames_oldest_first() {
        let compositor = SimulatedCompositor::new(90.0);
        let mut batch = [FrameTiming::default(); 128];

        assert_eq!(compositor.poll_at(10.0, &mut batch).ok(), Some(128));
        assert_eq!(batch[0].frame_index, 773);
        assert_eq!(batch[127].frame_index, 900);
        assert!(batch
            .windows(2)
            .all(|pair| pair[0].frame_index + 1 == pair[1].frame_index
                && pair[0].system_time_seconds < pair[1].system_time_seconds));
    }

    #[test]
    fn session_limit_reports_unavailable() {
        let compositor = SimulatedCompositor::new(60.0).with_session_frames(Some(120));
        let mut batch = [FrameTiming::default(); 16];

        assert!(compositor.poll_at(2.0, &mut batch).is_ok());
        assert!(matches!(
            compositor.poll_at(2.5, &mut batch),
            Err(SourceError::Unavailable(_))
        ));
    }
}
