use crate::timing::FrameTiming;

/// Bounded, strictly ordered history of the most recently ingested frames.
///
/// Storage is allocated once up front; once full, every append overwrites the
/// oldest slot and moves the head forward.
#[derive(Debug)]
pub struct HistoryBuffer {
    slots: Vec<FrameTiming>,
    capacity: usize,
    head: usize,
}

impl HistoryBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: Vec::with_capacity(capacity),
            capacity,
            head: 0,
        }
    }

    /// Number of frames needed to always keep a full second of history,
    /// given the highest supported frame rate and how often the history is refreshed.
    pub fn capacity_for(max_fps: usize, measurements_per_second: usize) -> usize {
        max_fps + max_fps / measurements_per_second.max(1)
    }

    #[cfg(test)]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns the frame at logical position `index`, where `0` is the oldest.
    pub fn get(&self, index: usize) -> Option<&FrameTiming> {
        if index >= self.slots.len() {
            return None;
        }
        Some(&self.slots[(self.head + index) % self.slots.len()])
    }

    pub fn iter(&self) -> impl Iterator<Item = &FrameTiming> + '_ {
        (0..self.len()).filter_map(move |index| self.get(index))
    }

    /// Index of the newest frame in the history, if any.
    pub fn last_index(&self) -> Option<u32> {
        self.len()
            .checked_sub(1)
            .and_then(|last| self.get(last))
            .map(|timing| timing.frame_index)
    }

    #[cfg(test)]
    pub fn clear(&mut self) {
        self.slots.clear();
        self.head = 0;
    }

    /// Appends the frames of `batch` that are newer than anything seen so far.
    ///
    /// `batch` must be sorted ascending by frame index. Returns the number of
    /// new frames found in the batch; if that exceeds the capacity only the
    /// newest `capacity` frames are retained.
    pub fn merge(&mut self, batch: &[FrameTiming]) -> usize {
        let last = self.last_index();
        let new_frames = batch
            .iter()
            .rev()
            .take_while(|timing| last.map_or(true, |last| timing.frame_index > last))
            .count();

        let start = batch.len() - new_frames.min(self.capacity);
        for timing in &batch[start..] {
            self.push(*timing);
        }

        new_frames
    }

    fn push(&mut self, timing: FrameTiming) {
        if self.slots.len() < self.capacity {
            self.slots.push(timing);
        } else {
            self.slots[self.head] = timing;
            self.head = (self.head + 1) % self.capacity;
        }
    }
}
