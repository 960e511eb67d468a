//! Whether native timestamp seeking can be trusted on a stream.
//!
//! The verdict is computed once per stream version: timestamps are
//! calibrated, the frame count is discovered with native probes and a few
//! native seeks spread over the stream are checked against the expected
//! timestamps. It is persisted and reused until the file changes.

mod record;
mod store;

pub use record::ReliabilityRecord;
pub use store::{RecordKey, ReliabilityStore};

use crate::cache::file_mtime;
use crate::config::SeekConfig;
use crate::handle::{DecodeBudget, Step, StreamHandle};
use crate::outcome::Completion;
use crate::seek::native::{self, Landing};
use crate::seek::NativeRetry;
use crate::source::FrameSource;
use crate::timecode::{calibrate, TimecodeProfile};
use crate::total::{detect_total, FrameCount};
use crate::Result;
use tracing::{debug, info, warn};

/// Compute, or load, the verdict for `handle`'s stream and install it.
pub fn analyze<S: FrameSource>(
    handle: &mut StreamHandle<S>,
    config: &SeekConfig,
    store: &mut ReliabilityStore,
) -> Result<Completion<ReliabilityRecord>> {
    let info = handle.info().clone();
    if let Some(record) = store.lookup(&info) {
        debug!(path = %info.path.display(), "reusing reliability verdict");
        handle.install_record(record.clone(), config);
        return Ok(Completion::Done(record));
    }

    let mtime = file_mtime(&info.path).unwrap_or(0);
    let profile = match calibrate(handle, config)? {
        Completion::Done(profile) => profile,
        Completion::Cancelled => return Ok(Completion::Cancelled),
    };
    let mut record = ReliabilityRecord::new(&info.decoder_version, mtime, profile.clone());
    record.total_frames = info
        .estimated_frames(profile.mean_frame_bytes)
        .unwrap_or(0);
    if let Some(total) = handle.known_total() {
        record.total_frames = total;
        record.all_frames_counted = true;
    }

    if !profile.is_cyclic() {
        info!(timing = ?profile.timing, "native seeking disabled: timestamps are not cyclic");
        return Ok(Completion::Done(finish(handle, config, store, record)));
    }

    handle.enable_native_probing(&profile, config);
    if !record.all_frames_counted {
        match detect_total(handle, &profile, config)? {
            Completion::Done(FrameCount::Counted {
                frames,
                eof_timecode,
            }) => {
                record.total_frames = frames;
                record.eof_timecode = eof_timecode;
            }
            Completion::Done(FrameCount::Estimated(frames)) => {
                info!(frames, "native seeking disabled: frame count probes failed");
                record.total_frames = frames;
                return Ok(Completion::Done(finish(handle, config, store, record)));
            }
            Completion::Cancelled => {
                handle.disable_native();
                return Ok(Completion::Cancelled);
            }
        }
    }

    match verify(handle, &profile, record.total_frames, config)? {
        Completion::Done(Some(pre_roll)) => {
            record.native_seek_reliable = true;
            record.seek_pre_roll_size = pre_roll;
        }
        Completion::Done(None) => {}
        Completion::Cancelled => {
            handle.disable_native();
            return Ok(Completion::Cancelled);
        }
    }
    info!(
        path = %info.path.display(),
        reliable = record.native_seek_reliable,
        frames = record.total_frames,
        pre_roll = record.seek_pre_roll_size,
        "native seek verdict"
    );
    Ok(Completion::Done(finish(handle, config, store, record)))
}

/// Check native seeks at the configured fractions of the stream.
///
/// Returns the largest pre-roll any check needed, or `None` when a check
/// failed or none could run.
fn verify<S: FrameSource>(
    handle: &mut StreamHandle<S>,
    profile: &TimecodeProfile,
    total: u32,
    config: &SeekConfig,
) -> Result<Completion<Option<u32>>> {
    let tolerance = handle.tolerance();
    let mut checks = 0;
    let mut largest = config.min_pre_roll;

    for &point in &config.verification_points {
        let target = (total as f64 * point).round() as u32;
        if target <= config.start_margin.max(3) || target > total {
            continue;
        }
        checks += 1;
        let mut retry = NativeRetry::new(config.min_pre_roll, config);
        let mut verified = false;
        while let Some(pre_roll) = retry.next_pre_roll() {
            match native::position(handle, profile, target, pre_roll, config)? {
                Landing::Landed => {
                    let mut budget = DecodeBudget::new(config.decode_error_budget);
                    verified = match handle.pull(&mut budget) {
                        Ok(Step::Frame(frame)) => frame.timestamp.is_some_and(|ts| {
                            tolerance.matches(ts, profile.frame_to_timecode(target))
                        }),
                        Ok(Step::Cancelled) => return Ok(Completion::Cancelled),
                        _ => false,
                    };
                    if verified {
                        largest = largest.max(pre_roll);
                    }
                    break;
                }
                Landing::Cancelled => return Ok(Completion::Cancelled),
                Landing::Eof | Landing::Missed(_) => {}
            }
        }
        handle.invalidate_position();
        if !verified {
            debug!(target, "native seek verification failed");
            return Ok(Completion::Done(None));
        }
    }

    if checks == 0 {
        debug!(total, "stream too short to verify native seeking");
        return Ok(Completion::Done(None));
    }
    Ok(Completion::Done(Some(largest)))
}

fn finish<S: FrameSource>(
    handle: &mut StreamHandle<S>,
    config: &SeekConfig,
    store: &mut ReliabilityStore,
    record: ReliabilityRecord,
) -> ReliabilityRecord {
    if let Err(e) = store.save(handle.info(), &record) {
        warn!(error = %e, "failed to persist reliability record");
    }
    handle.install_record(record.clone(), config);
    handle.invalidate_position();
    record
}
