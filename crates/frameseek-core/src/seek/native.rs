//! Native timestamp seeking.

use super::retry::NativeRetry;
use super::Attempt;
use crate::config::SeekConfig;
use crate::handle::{DecodeBudget, Step, StreamHandle};
use crate::source::{FrameSource, SeekDirection};
use crate::timecode::TimecodeProfile;
use crate::{Error, Result};
use std::collections::VecDeque;
use tracing::{debug, warn};

/// Result of one native positioning attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Landing {
    /// `target - 1` was the last frame decoded.
    Landed,
    Eof,
    Missed(Miss),
    Cancelled,
}

/// Why a native attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Miss {
    SeekRejected,
    Overflow,
    DecodeCap,
    DecodeErrors,
}

/// Seek by timestamp to `target - pre_roll` and decode up to `target - 1`.
///
/// The landing is accepted once at least two of the last three decoded
/// timestamps match the expected stamps of `target - 3 ..= target - 1`.
/// Decoders may emit frames out of presentation order, so a single
/// mismatch is tolerated.
pub(crate) fn position<S: FrameSource>(
    handle: &mut StreamHandle<S>,
    profile: &TimecodeProfile,
    target: u32,
    pre_roll: u32,
    config: &SeekConfig,
) -> Result<Landing> {
    handle.invalidate_position();
    let tolerance = handle.tolerance();
    let seek_frame = target.saturating_sub(pre_roll).max(1);
    let seek_ts = profile.frame_to_timecode(seek_frame);
    if let Err(e) = handle
        .source_mut()
        .seek_to_timestamp(seek_ts, SeekDirection::Backward)
    {
        debug!(target, seek_ts, error = %e, "timestamp seek rejected");
        return Ok(Landing::Missed(Miss::SeekRejected));
    }

    let expected = [3, 2, 1].map(|back| profile.frame_to_timecode(target.saturating_sub(back)));
    let ceiling = expected.iter().copied().max().unwrap_or(seek_ts) + tolerance.value();
    let index_step = handle.index().map(|index| index.step_size());
    let cap = decode_cap(pre_roll, profile, index_step, config);
    let mut window: VecDeque<Option<i64>> = VecDeque::with_capacity(3);
    let mut budget = DecodeBudget::new(config.decode_error_budget);

    for _ in 0..cap {
        let timestamp = match handle.pull(&mut budget) {
            Ok(Step::Frame(frame)) => frame.timestamp,
            Ok(Step::Skipped) => None,
            Ok(Step::Eof) => return Ok(Landing::Eof),
            Ok(Step::Cancelled) => return Ok(Landing::Cancelled),
            Err(Error::DecodeBudgetExhausted { .. }) => {
                return Ok(Landing::Missed(Miss::DecodeErrors))
            }
            Err(e) => return Err(e),
        };
        if timestamp.is_some_and(|ts| ts > ceiling) {
            return Ok(Landing::Missed(Miss::Overflow));
        }
        if window.len() == 3 {
            window.pop_front();
        }
        window.push_back(timestamp);
        if window.len() == 3 {
            let hits = window
                .iter()
                .zip(expected)
                .filter(|(seen, want)| seen.is_some_and(|ts| tolerance.matches(ts, *want)))
                .count();
            if hits >= 2 {
                handle.set_position(target - 1);
                return Ok(Landing::Landed);
            }
        }
    }
    Ok(Landing::Missed(Miss::DecodeCap))
}

/// Frames one attempt may decode before giving up.
///
/// A correct backward seek can land a whole GOP before the target, so the
/// configured limit is widened to two keyframe intervals (from calibration
/// or the index spacing) past the pre-roll.
fn decode_cap(
    pre_roll: u32,
    profile: &TimecodeProfile,
    index_step: Option<u32>,
    config: &SeekConfig,
) -> u32 {
    let gop = profile
        .keyframe_interval
        .into_iter()
        .chain(index_step)
        .max()
        .unwrap_or(0);
    config
        .native_decode_limit
        .max(pre_roll.saturating_mul(4).saturating_add(64))
        .max(gop.saturating_mul(2).saturating_add(pre_roll))
}

/// Native strategy with pre-roll retries.
///
/// Exhausting the retries disables native seeking for the handle unless
/// every attempt ran into the end of the stream.
pub(crate) fn seek<S: FrameSource>(
    handle: &mut StreamHandle<S>,
    target: u32,
    config: &SeekConfig,
) -> Result<Attempt> {
    let Some(profile) = handle.profile().cloned() else {
        return Ok(Attempt::Fallthrough);
    };
    let mut retry = NativeRetry::new(handle.pre_roll(), config);
    let mut only_eof = true;

    while let Some(pre_roll) = retry.next_pre_roll() {
        match position(handle, &profile, target, pre_roll, config)? {
            Landing::Landed => {
                if retry.attempts_made() > 1 {
                    debug!(target, pre_roll, "raising native pre-roll");
                    handle.raise_pre_roll(pre_roll);
                }
                return Ok(Attempt::Landed);
            }
            Landing::Eof => debug!(target, pre_roll, "native seek ran into end of stream"),
            Landing::Missed(miss) => {
                only_eof = false;
                debug!(target, pre_roll, ?miss, "native seek attempt failed");
            }
            Landing::Cancelled => return Ok(Attempt::Cancelled),
        }
    }

    if !only_eof {
        warn!(
            path = %handle.info().path.display(),
            target,
            "native seeking unreliable, disabling it for this stream"
        );
        handle.disable_native();
    }
    Ok(Attempt::Fallthrough)
}
