//! Per-stream session state.

use crate::cancel::CancelToken;
use crate::config::SeekConfig;
use crate::index::FrameIndex;
use crate::outcome::{Progress, SeekOutcome, Strategy};
use crate::reliability::ReliabilityRecord;
use crate::source::{Decoded, DecodedFrame, FrameSource, StreamInfo};
use crate::timecode::{MatchTolerance, TimecodeProfile};
use crate::{Error, Result};
use tracing::debug;

/// Receiver of progress reports from long operations.
pub type ProgressSink = Box<dyn FnMut(Progress) + Send>;

/// Outcome of one decode step inside the engine.
#[derive(Debug)]
pub(crate) enum Step {
    Frame(DecodedFrame),
    /// A recoverable decode error consumed one frame slot.
    Skipped,
    Eof,
    Cancelled,
}

/// Recoverable decode errors tolerated by one loop.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DecodeBudget {
    limit: u32,
    errors: u32,
}

impl DecodeBudget {
    pub(crate) fn new(limit: u32) -> Self {
        Self { limit, errors: 0 }
    }

    fn spend(&mut self, error: Error) -> Result<()> {
        self.errors += 1;
        if self.errors > self.limit {
            return Err(Error::DecodeBudgetExhausted {
                errors: self.errors,
                last: error.to_string(),
            });
        }
        Ok(())
    }
}

/// An open stream: the decode source plus everything the engine knows
/// about it.
///
/// Frame counters are 1-based. `current_frame()` is the last frame handed
/// out or skipped, so after a successful seek to `n` it is `n - 1` and
/// [`read_frame`](Self::read_frame) returns frame `n`.
pub struct StreamHandle<S> {
    source: S,
    cancel: CancelToken,
    progress: Option<ProgressSink>,
    current_frame: u32,
    position_known: bool,
    lookahead: Option<DecodedFrame>,
    index: Option<FrameIndex>,
    record: Option<ReliabilityRecord>,
    native_enabled: bool,
    pre_roll: u32,
    tolerance: MatchTolerance,
    record_dirty: bool,
    last_strategy: Option<Strategy>,
}

impl<S: FrameSource> StreamHandle<S> {
    /// Wrap a freshly opened source positioned at its start.
    pub fn new(source: S) -> Self {
        Self {
            source,
            cancel: CancelToken::new(),
            progress: None,
            current_frame: 0,
            position_known: true,
            lookahead: None,
            index: None,
            record: None,
            native_enabled: false,
            pre_roll: 0,
            tolerance: MatchTolerance::default(),
            record_dirty: false,
            last_strategy: None,
        }
    }

    pub fn info(&self) -> &StreamInfo {
        self.source.info()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Close the handle and return the source.
    pub fn into_source(self) -> S {
        self.source
    }

    /// Token that cancels this handle's long operations.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn set_cancel_token(&mut self, token: CancelToken) {
        self.cancel = token;
    }

    /// Receive progress of sequential fallbacks and index builds.
    pub fn set_progress_sink(&mut self, sink: impl FnMut(Progress) + Send + 'static) {
        self.progress = Some(Box::new(sink));
    }

    pub fn clear_progress_sink(&mut self) {
        self.progress = None;
    }

    /// Last frame read or skipped.
    pub fn current_frame(&self) -> u32 {
        self.current_frame
    }

    /// Frame the next [`read_frame`](Self::read_frame) returns.
    pub fn next_frame(&self) -> u32 {
        self.current_frame.saturating_add(1)
    }

    /// Whether the frame counters reflect the decode cursor.
    pub fn position_known(&self) -> bool {
        self.position_known
    }

    /// Read the next frame, or `None` at end of stream.
    ///
    /// Recoverable decode errors are returned and still count as a consumed
    /// frame.
    pub fn read_frame(&mut self) -> Result<Option<DecodedFrame>> {
        if let Some(frame) = self.lookahead.take() {
            self.current_frame = self.current_frame.saturating_add(1);
            return Ok(Some(frame));
        }
        match self.source.decode_next_frame() {
            Ok(Decoded::Frame(frame)) => {
                self.current_frame = self.current_frame.saturating_add(1);
                Ok(Some(frame))
            }
            Ok(Decoded::Eof) => Ok(None),
            Err(e) => {
                if e.is_recoverable() {
                    self.current_frame = self.current_frame.saturating_add(1);
                }
                Err(e)
            }
        }
    }

    pub fn index(&self) -> Option<&FrameIndex> {
        self.index.as_ref()
    }

    /// The reliability verdict, once analysis has run.
    pub fn record(&self) -> Option<&ReliabilityRecord> {
        self.record.as_ref()
    }

    pub fn profile(&self) -> Option<&TimecodeProfile> {
        self.record.as_ref().map(|r| &r.profile)
    }

    pub fn is_analyzed(&self) -> bool {
        self.record.is_some()
    }

    /// Whether native seeks are currently trusted.
    pub fn native_enabled(&self) -> bool {
        self.native_enabled
    }

    /// Pre-roll used by the first native attempt.
    pub fn pre_roll(&self) -> u32 {
        self.pre_roll
    }

    pub fn tolerance(&self) -> MatchTolerance {
        self.tolerance
    }

    /// Strategy that positioned the cursor last.
    pub fn last_strategy(&self) -> Option<Strategy> {
        self.last_strategy
    }

    /// Frame count, when authoritatively known.
    pub fn known_total(&self) -> Option<u32> {
        if let Some(index) = self.index.as_ref().filter(|i| i.is_complete()) {
            return Some(index.total_frames());
        }
        self.record
            .as_ref()
            .filter(|r| r.all_frames_counted && r.total_frames > 0)
            .map(|r| r.total_frames)
    }

    pub(crate) fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Report and clear a pending cancellation.
    pub(crate) fn take_cancellation(&mut self) -> bool {
        let cancelled = self.cancel.is_cancelled();
        if cancelled {
            self.cancel.reset();
        }
        cancelled
    }

    /// Rewind to the start; the position becomes known.
    pub(crate) fn rewind(&mut self) -> Result<()> {
        self.lookahead = None;
        self.source.rewind()?;
        self.current_frame = 0;
        self.position_known = true;
        Ok(())
    }

    /// Decode one frame without touching the frame counters.
    pub(crate) fn pull(&mut self, budget: &mut DecodeBudget) -> Result<Step> {
        if self.cancel.is_cancelled() {
            return Ok(Step::Cancelled);
        }
        match self.source.decode_next_frame() {
            Ok(Decoded::Frame(frame)) => Ok(Step::Frame(frame)),
            Ok(Decoded::Eof) => Ok(Step::Eof),
            Err(e) if e.is_recoverable() => {
                debug!(error = %e, "skipping undecodable frame");
                budget.spend(e)?;
                Ok(Step::Skipped)
            }
            Err(e) => Err(e),
        }
    }

    /// Decode one frame at a known position, counting the consumed slot.
    pub(crate) fn advance(&mut self, budget: &mut DecodeBudget) -> Result<Step> {
        let step = self.pull(budget);
        if matches!(
            step,
            Ok(Step::Frame(_) | Step::Skipped) | Err(Error::DecodeBudgetExhausted { .. })
        ) {
            self.current_frame = self.current_frame.saturating_add(1);
        }
        step
    }

    /// Forget the cursor position before a seek.
    pub(crate) fn invalidate_position(&mut self) {
        self.lookahead = None;
        self.position_known = false;
    }

    /// Declare that `frame` was the last frame decoded.
    pub(crate) fn set_position(&mut self, frame: u32) {
        self.current_frame = frame;
        self.position_known = true;
    }

    pub(crate) fn has_lookahead(&self) -> bool {
        self.lookahead.is_some()
    }

    /// Count a buffered lookahead frame as consumed.
    pub(crate) fn discard_lookahead(&mut self) {
        if self.lookahead.take().is_some() {
            self.current_frame = self.current_frame.saturating_add(1);
        }
    }

    /// Decode the frame after the cursor into the lookahead slot.
    pub(crate) fn fill_lookahead(&mut self, budget: &mut DecodeBudget) -> Result<SeekOutcome> {
        match self.pull(budget)? {
            Step::Frame(frame) => {
                self.lookahead = Some(frame);
                Ok(SeekOutcome::Positioned)
            }
            Step::Eof => Ok(SeekOutcome::EndOfStream),
            Step::Cancelled => Ok(SeekOutcome::Cancelled),
            Step::Skipped => {
                self.current_frame = self.current_frame.saturating_add(1);
                Err(Error::decode(format!(
                    "frame {} could not be decoded",
                    self.current_frame
                )))
            }
        }
    }

    pub(crate) fn report_progress(&mut self, done: u64, total: Option<u64>) {
        if let Some(sink) = self.progress.as_mut() {
            sink(Progress { done, total });
        }
    }

    pub(crate) fn set_last_strategy(&mut self, strategy: Strategy) {
        self.last_strategy = Some(strategy);
    }

    pub(crate) fn set_index(&mut self, index: FrameIndex) {
        self.index = Some(index);
    }

    pub(crate) fn index_mut(&mut self) -> Option<&mut FrameIndex> {
        self.index.as_mut()
    }

    /// Adopt a reliability verdict for the rest of the session.
    pub(crate) fn install_record(&mut self, record: ReliabilityRecord, config: &SeekConfig) {
        self.native_enabled = record.native_seek_reliable && record.profile.is_cyclic();
        self.pre_roll = record.seek_pre_roll_size.max(config.min_pre_roll);
        self.tolerance = MatchTolerance::for_profile(&record.profile, config);
        self.record = Some(record);
    }

    pub(crate) fn record_mut(&mut self) -> Option<&mut ReliabilityRecord> {
        self.record.as_mut()
    }

    /// Let the analyzer probe native seeks before the verdict is final.
    pub(crate) fn enable_native_probing(&mut self, profile: &TimecodeProfile, config: &SeekConfig) {
        self.native_enabled = true;
        self.pre_roll = config.min_pre_roll;
        self.tolerance = MatchTolerance::for_profile(profile, config);
    }

    /// Stop trusting native seeks for this handle.
    pub(crate) fn disable_native(&mut self) {
        self.native_enabled = false;
        if let Some(record) = self.record.as_mut() {
            record.native_seek_reliable = false;
            record.native_failures = record.native_failures.saturating_add(1);
            self.record_dirty = true;
        }
    }

    /// Raise the calibrated pre-roll after a retry needed more.
    pub(crate) fn raise_pre_roll(&mut self, pre_roll: u32) {
        if pre_roll <= self.pre_roll {
            return;
        }
        self.pre_roll = pre_roll;
        if let Some(record) = self.record.as_mut() {
            record.seek_pre_roll_size = pre_roll;
            self.record_dirty = true;
        }
    }

    /// Whether the record changed since it was last persisted.
    pub(crate) fn take_record_dirty(&mut self) -> bool {
        std::mem::take(&mut self.record_dirty)
    }

    pub(crate) fn mark_record_dirty(&mut self) {
        self.record_dirty = true;
    }
}
