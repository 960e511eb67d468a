//! Index-assisted seeking.

use super::history::OffsetHistory;
use super::retry::IndexSyncPlan;
use super::{sequential, Attempt};
use crate::checksum::fingerprint;
use crate::config::SeekConfig;
use crate::handle::{DecodeBudget, Step, StreamHandle};
use crate::index::IndexEntry;
use crate::source::{DecodedFrame, FrameSource, SeekDirection};
use crate::timecode::MatchTolerance;
use crate::{Error, Result};
use tracing::debug;

/// Result of one sync attempt on an index entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sync {
    /// The entry frame was the last decoded; carries its recovered offset.
    Matched(Option<i64>),
    /// The following entry showed up first.
    Overshot,
    Exhausted,
    Cancelled,
}

/// How decoded frames are recognised as an index entry.
#[derive(Debug, Clone, Copy)]
struct Matcher {
    timecodes: bool,
    tolerance: MatchTolerance,
}

impl Matcher {
    fn matches(&self, entry: &IndexEntry, frame: &DecodedFrame, print: &mut Option<u16>) -> bool {
        if self.timecodes {
            if let (Some(want), Some(seen)) = (entry.timecode, frame.timestamp) {
                return self.tolerance.matches(want, seen);
            }
        }
        frame.frame_length() == entry.frame_length
            && *print.get_or_insert_with(|| fingerprint(&frame.picture)) == entry.checksum
    }
}

/// Jump to the nearest index entry below `target`, recognise it, then decode
/// up to `target - 1`.
pub(crate) fn seek<S: FrameSource>(
    handle: &mut StreamHandle<S>,
    target: u32,
    config: &SeekConfig,
) -> Result<Attempt> {
    let Some(index) = handle.index() else {
        return Ok(Attempt::Fallthrough);
    };
    let Some(start) = index.lookup_nearest(target) else {
        return Ok(Attempt::Fallthrough);
    };
    let timecodes_usable = index.timecodes_usable();
    let mut plan = IndexSyncPlan::new(start, index.step_size(), config);
    let delay = handle.source().decoder_delay();
    let tolerance = handle.tolerance();

    loop {
        let position = plan.position();
        let Some((entry, next)) = handle
            .index()
            .and_then(|i| Some((*i.get(position)?, i.get(position + 1).copied())))
        else {
            return Ok(Attempt::Fallthrough);
        };
        let matcher = Matcher {
            timecodes: timecodes_usable && plan.timecodes_allowed(),
            tolerance,
        };

        match sync(handle, &entry, next.as_ref(), matcher, plan.budget(), delay, config)? {
            Sync::Matched(offset) => {
                if let (Some(offset), Some(index)) = (offset, handle.index_mut()) {
                    if index.repair_offset(position, offset) {
                        debug!(frame = entry.seek_nr, offset, "repaired index offset");
                    }
                }
                handle.set_position(entry.seek_nr);
                debug!(target, entry = entry.seek_nr, outer = plan.outer(), "synced on index entry");
                return match sequential::decode_forward(handle, target - 1, config, false) {
                    Err(Error::DecodeBudgetExhausted { .. }) => {
                        handle.invalidate_position();
                        Ok(Attempt::Fallthrough)
                    }
                    other => other,
                };
            }
            Sync::Overshot => {
                if !plan.overshot() {
                    break;
                }
            }
            Sync::Exhausted => {
                if !plan.exhausted() {
                    break;
                }
            }
            Sync::Cancelled => return Ok(Attempt::Cancelled),
        }
    }

    debug!(target, "index sync gave up");
    handle.invalidate_position();
    Ok(Attempt::Fallthrough)
}

fn sync<S: FrameSource>(
    handle: &mut StreamHandle<S>,
    entry: &IndexEntry,
    next: Option<&IndexEntry>,
    matcher: Matcher,
    frames: u32,
    delay: usize,
    config: &SeekConfig,
) -> Result<Sync> {
    handle.invalidate_position();
    let seeked = match entry.timecode {
        Some(timecode) if matcher.timecodes => handle
            .source_mut()
            .seek_to_timestamp(timecode, SeekDirection::Backward),
        _ => handle.source_mut().seek_to_byte_offset(entry.byte_offset),
    };
    if let Err(e) = seeked {
        debug!(frame = entry.seek_nr, error = %e, "index seek rejected");
        return Ok(Sync::Exhausted);
    }

    let mut history = OffsetHistory::new(config.offset_history.max(delay + 1));
    let mut budget = DecodeBudget::new(config.decode_error_budget);
    for _ in 0..frames {
        match handle.pull(&mut budget) {
            Ok(Step::Frame(frame)) => {
                history.push(frame.byte_offset);
                let mut print = None;
                if matcher.matches(entry, &frame, &mut print) {
                    return Ok(Sync::Matched(history.back(delay)));
                }
                if next.is_some_and(|n| matcher.matches(n, &frame, &mut print)) {
                    return Ok(Sync::Overshot);
                }
            }
            Ok(Step::Skipped) => history.push(None),
            Ok(Step::Eof) => return Ok(Sync::Overshot),
            Ok(Step::Cancelled) => return Ok(Sync::Cancelled),
            Err(Error::DecodeBudgetExhausted { .. }) => return Ok(Sync::Exhausted),
            Err(e) => return Err(e),
        }
    }
    Ok(Sync::Exhausted)
}
