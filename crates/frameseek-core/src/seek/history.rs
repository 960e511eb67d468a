//! Ring of recently decoded byte offsets.

use std::collections::VecDeque;

/// Raw byte offsets of the last few decoded frames.
///
/// Decoders with a delay emit frame `n` while the packet of frame `n + delay`
/// is being read, so the offset belonging to the current frame is the one
/// reported `delay` frames earlier.
#[derive(Debug, Clone)]
pub(crate) struct OffsetHistory {
    slots: VecDeque<Option<i64>>,
    capacity: usize,
}

impl OffsetHistory {
    pub(crate) fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub(crate) fn push(&mut self, offset: Option<i64>) {
        if self.slots.len() == self.capacity {
            self.slots.pop_front();
        }
        self.slots.push_back(offset);
    }

    /// Offset reported `frames_back` frames before the newest one.
    pub(crate) fn back(&self, frames_back: usize) -> Option<i64> {
        let newest = self.slots.len().checked_sub(1)?;
        let slot = newest.checked_sub(frames_back)?;
        self.slots.get(slot).copied().flatten()
    }
}
