/// Timing information for a single frame presented by the compositor.
///
/// Only `frame_index` and `system_time_seconds` are interpreted; every other
/// field is carried through to the output rows unchanged.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct FrameTiming {
    pub frame_index: u32,
    pub num_frame_presents: u32,
    pub num_mis_presented: u32,
    pub num_dropped_frames: u32,
    pub reprojection_flags: u32,

    /// Absolute time reference for comparing frames.
    pub system_time_seconds: f64,

    pub pre_submit_gpu_ms: f32,
    pub post_submit_gpu_ms: f32,
    pub total_render_gpu_ms: f32,
    pub compositor_render_gpu_ms: f32,
    pub compositor_render_cpu_ms: f32,
    pub compositor_idle_cpu_ms: f32,
    pub client_frame_interval_ms: f32,

    // Offsets relative to `system_time_seconds`.
    pub wait_get_poses_called_ms: f32,
    pub new_poses_ready_ms: f32,
    pub new_frame_ready_ms: f32,
    pub compositor_update_start_ms: f32,
    pub compositor_update_end_ms: f32,
    pub compositor_render_start_ms: f32,
}

impl FrameTiming {
    pub const REPROJECTION_MOTION: u32 = 0x08;
    const PREDICTION_MASK: u32 = 0xF0;
    const THROTTLE_MASK: u32 = 0xF00;

    pub fn new(frame_index: u32, system_time_seconds: f64) -> Self {
        Self {
            frame_index,
            system_time_seconds,
            ..Self::default()
        }
    }

    pub fn reprojection_motion(&self) -> bool {
        self.reprojection_flags & Self::REPROJECTION_MOTION != 0
    }

    /// Number of additional frames the compositor predicted ahead for this one.
    pub fn predicted_frames(&self) -> u32 {
        (self.reprojection_flags & Self::PREDICTION_MASK) >> 4
    }

    pub fn throttled_frames(&self) -> u32 {
        (self.reprojection_flags & Self::THROTTLE_MASK) >> 8
    }

    pub fn system_time_ms(&self) -> f64 {
        self.system_time_seconds * 1000.0
    }
}
