//! Full forward scan producing a [`FrameIndex`].

use super::{FrameIndex, IndexEntry};
use crate::checksum::fingerprint;
use crate::config::SeekConfig;
use crate::handle::{DecodeBudget, Step, StreamHandle};
use crate::outcome::Progress;
use crate::seek::OffsetHistory;
use crate::source::FrameSource;
use crate::Result;

/// Result of a scan.
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    /// Finished (or, when cancelled, partial) index.
    pub index: FrameIndex,
    /// Frames decoded or skipped.
    pub frames: u32,
    /// Timestamp of the last frame, for completed scans.
    pub eof_timecode: Option<i64>,
    /// Whether the scan reached the end of the stream.
    pub completed: bool,
}

/// Decode every frame from the start and record each keyframe with a known
/// byte offset.
///
/// Decode errors are skipped as long as no more than the configured budget
/// occur in a row.
pub fn scan<S: FrameSource>(
    handle: &mut StreamHandle<S>,
    config: &SeekConfig,
    progress: &mut dyn FnMut(Progress),
) -> Result<ScanOutcome> {
    handle.rewind()?;
    let mut index = FrameIndex::for_stream(handle.info());
    let delay = handle.source().decoder_delay();
    let mut history = OffsetHistory::new(config.offset_history.max(delay + 1));
    let mean_frame_bytes = handle.profile().map_or(0, |p| p.mean_frame_bytes);
    let total = handle
        .known_total()
        .or_else(|| handle.info().estimated_frames(mean_frame_bytes))
        .map(u64::from);
    let mut budget = DecodeBudget::new(config.decode_error_budget);
    let mut last_timecode = None;

    loop {
        match handle.advance(&mut budget)? {
            Step::Frame(frame) => {
                budget = DecodeBudget::new(config.decode_error_budget);
                history.push(frame.byte_offset);
                let seek_nr = handle.current_frame();
                if frame.is_keyframe {
                    if let Some(byte_offset) = history.back(delay) {
                        index.append(IndexEntry {
                            seek_nr,
                            byte_offset,
                            frame_length: frame.frame_length(),
                            checksum: fingerprint(&frame.picture),
                            timecode: frame.timestamp,
                        });
                    }
                }
                last_timecode = frame.timestamp;
                progress(Progress {
                    done: seek_nr as u64,
                    total,
                });
            }
            Step::Skipped => history.push(None),
            Step::Eof => {
                let frames = handle.current_frame();
                index.finish(frames);
                return Ok(ScanOutcome {
                    index,
                    frames,
                    eof_timecode: last_timecode,
                    completed: true,
                });
            }
            Step::Cancelled => {
                index.finish(0);
                return Ok(ScanOutcome {
                    index,
                    frames: handle.current_frame(),
                    eof_timecode: None,
                    completed: false,
                });
            }
        }
    }
}
