//! Retry schedules of the seek strategies.

use crate::config::SeekConfig;

/// Pre-roll schedule of successive native seek attempts.
///
/// Attempt `a` (from 0) uses `max(min_pre_roll, base + a * increment)`.
#[derive(Debug, Clone)]
pub(crate) struct NativeRetry {
    base: u32,
    increment: u32,
    floor: u32,
    attempts: u32,
    made: u32,
}

impl NativeRetry {
    pub(crate) fn new(base: u32, config: &SeekConfig) -> Self {
        Self {
            base,
            increment: config.pre_roll_increment,
            floor: config.min_pre_roll,
            attempts: config.native_retries,
            made: 0,
        }
    }

    /// Limit the schedule to `attempts` tries.
    pub(crate) fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// Pre-roll of the next attempt, or `None` when the schedule is spent.
    pub(crate) fn next_pre_roll(&mut self) -> Option<u32> {
        if self.made >= self.attempts {
            return None;
        }
        let grown = self
            .base
            .saturating_add(self.made.saturating_mul(self.increment));
        self.made += 1;
        Some(grown.max(self.floor))
    }

    /// Attempts handed out so far.
    pub(crate) fn attempts_made(&self) -> u32 {
        self.made
    }
}

/// Search state of an index-assisted sync.
///
/// Outer attempt `o` (from 1) may decode `step_size * multiplier * o`
/// frames. An overshoot moves to the previous entry; an exhausted budget
/// retries the same entry with the next, larger budget.
#[derive(Debug, Clone)]
pub(crate) struct IndexSyncPlan {
    position: usize,
    outer: u32,
    max_outer: u32,
    budget_unit: u32,
    timecodes_failed: bool,
}

impl IndexSyncPlan {
    pub(crate) fn new(position: usize, step_size: u32, config: &SeekConfig) -> Self {
        Self {
            position,
            outer: 1,
            max_outer: config.index_outer_retries,
            budget_unit: step_size.max(1).saturating_mul(config.index_retry_multiplier),
            timecodes_failed: false,
        }
    }

    /// Index entry the current attempt syncs on.
    pub(crate) fn position(&self) -> usize {
        self.position
    }

    pub(crate) fn outer(&self) -> u32 {
        self.outer
    }

    /// Frames the current attempt may decode.
    pub(crate) fn budget(&self) -> u32 {
        self.budget_unit.saturating_mul(self.outer)
    }

    /// Whether the attempt may seek by timestamp instead of byte offset.
    pub(crate) fn timecodes_allowed(&self) -> bool {
        !self.timecodes_failed
    }

    /// The next entry matched first. Returns whether another attempt remains.
    pub(crate) fn overshot(&mut self) -> bool {
        self.position = self.position.saturating_sub(1);
        self.next_attempt()
    }

    /// The budget ran out. Returns whether another attempt remains.
    pub(crate) fn exhausted(&mut self) -> bool {
        self.next_attempt()
    }

    fn next_attempt(&mut self) -> bool {
        self.timecodes_failed = true;
        self.outer += 1;
        self.outer <= self.max_outer
    }
}
