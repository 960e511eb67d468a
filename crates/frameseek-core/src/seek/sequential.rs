//! Decode-and-discard positioning.

use super::Attempt;
use crate::config::SeekConfig;
use crate::handle::{DecodeBudget, Step, StreamHandle};
use crate::source::FrameSource;
use crate::Result;
use tracing::debug;

/// Decode forward from a known position until `last` is the last frame
/// decoded.
pub(crate) fn decode_forward<S: FrameSource>(
    handle: &mut StreamHandle<S>,
    last: u32,
    config: &SeekConfig,
    report: bool,
) -> Result<Attempt> {
    let mut budget = DecodeBudget::new(config.decode_error_budget);
    let total = Some(last as u64);
    while handle.current_frame() < last {
        match handle.advance(&mut budget)? {
            Step::Frame(_) | Step::Skipped => {
                if report {
                    handle.report_progress(handle.current_frame() as u64, total);
                }
            }
            Step::Eof => return Ok(Attempt::EndOfStream),
            Step::Cancelled => return Ok(Attempt::Cancelled),
        }
    }
    Ok(Attempt::Landed)
}

/// Sequential strategy: reuse the cursor when the target is a short way
/// ahead, otherwise rewind, then decode up to `target - 1`.
pub(crate) fn seek<S: FrameSource>(
    handle: &mut StreamHandle<S>,
    target: u32,
    config: &SeekConfig,
) -> Result<Attempt> {
    let next = handle.next_frame();
    let reuse =
        handle.position_known() && target >= next && target - next <= config.sequential_reuse_gap;
    if reuse {
        if target > next {
            handle.discard_lookahead();
        }
    } else {
        debug!(target, "rewinding for sequential seek");
        handle.rewind()?;
    }
    decode_forward(handle, target - 1, config, true)
}
