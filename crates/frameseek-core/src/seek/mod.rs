//! The seek coordinator.
//!
//! Strategies are tried cheapest first: native timestamp seeking when the
//! stream's verdict trusts it, the frame index when one exists, and finally
//! decoding forward from a known position. Each strategy either leaves frame
//! `target - 1` as the last decoded frame or falls through to the next one.

mod history;
mod indexed;
pub(crate) mod native;
mod retry;
pub(crate) mod sequential;

pub(crate) use history::OffsetHistory;
pub(crate) use retry::NativeRetry;

use crate::config::SeekConfig;
use crate::handle::{DecodeBudget, StreamHandle};
use crate::outcome::{SeekOutcome, Strategy};
use crate::source::FrameSource;
use crate::{Error, Result};
use tracing::debug;

/// Result of running one strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Attempt {
    /// `target - 1` is the last frame decoded.
    Landed,
    EndOfStream,
    Cancelled,
    /// Try the next strategy.
    Fallthrough,
}

/// Position `handle` so the next frame read is `target`.
pub(crate) fn seek<S: FrameSource>(
    handle: &mut StreamHandle<S>,
    target: u32,
    config: &SeekConfig,
) -> Result<SeekOutcome> {
    if target == 0 {
        return Err(Error::invalid_input("frame numbers start at 1"));
    }
    if handle.take_cancellation() {
        handle.invalidate_position();
        return Ok(SeekOutcome::Cancelled);
    }
    if past_end(handle, target) {
        debug!(target, "target beyond end of stream");
        return Ok(SeekOutcome::EndOfStream);
    }
    if handle.position_known() && handle.has_lookahead() && handle.next_frame() == target {
        return Ok(SeekOutcome::Positioned);
    }

    let outcome = match run_strategies(handle, target, config)? {
        Attempt::Landed if handle.has_lookahead() => SeekOutcome::Positioned,
        Attempt::Landed => {
            let mut budget = DecodeBudget::new(config.decode_error_budget);
            handle.fill_lookahead(&mut budget)?
        }
        Attempt::EndOfStream => SeekOutcome::EndOfStream,
        Attempt::Cancelled => SeekOutcome::Cancelled,
        Attempt::Fallthrough => {
            return Err(Error::unsupported(format!("no strategy reached frame {target}")))
        }
    };
    if outcome == SeekOutcome::Cancelled {
        handle.take_cancellation();
        handle.invalidate_position();
    }
    Ok(outcome)
}

/// Whether `target` is known to lie past the last frame without decoding.
fn past_end<S: FrameSource>(handle: &StreamHandle<S>, target: u32) -> bool {
    if let Some(total) = handle.known_total() {
        return target > total;
    }
    if !handle.native_enabled() {
        return false;
    }
    match handle.record() {
        Some(record) => record.eof_timecode.is_some_and(|eof| {
            record.profile.frame_to_timecode(target) > eof + handle.tolerance().value()
        }),
        None => false,
    }
}

fn run_strategies<S: FrameSource>(
    handle: &mut StreamHandle<S>,
    target: u32,
    config: &SeekConfig,
) -> Result<Attempt> {
    if handle.native_enabled() && target > config.start_margin.max(3) {
        let attempt = native::seek(handle, target, config)?;
        if attempt != Attempt::Fallthrough {
            handle.set_last_strategy(Strategy::Native);
            return Ok(attempt);
        }
    }
    if handle.index().is_some_and(|i| !i.is_empty()) {
        let attempt = indexed::seek(handle, target, config)?;
        if attempt != Attempt::Fallthrough {
            handle.set_last_strategy(Strategy::Indexed);
            return Ok(attempt);
        }
    }
    let attempt = sequential::seek(handle, target, config)?;
    handle.set_last_strategy(Strategy::Sequential);
    Ok(attempt)
}
