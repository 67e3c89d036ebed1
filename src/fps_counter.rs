use crate::timing::FrameTiming;

/// Counts the frames of a snapshot that were presented within one second
/// of its newest frame.
///
/// Works on the snapshot alone; nothing is remembered between calls.
pub fn spot_fps(batch: &[FrameTiming]) -> u32 {
    let Some(newest) = batch.last() else {
        return 0;
    };

    // Remove all frame instances that were older than a second.
    let cutoff = newest.system_time_seconds - 1.0;
    batch
        .iter()
        .rev()
        .take_while(|timing| timing.system_time_seconds > cutoff)
        .count() as u32
}
