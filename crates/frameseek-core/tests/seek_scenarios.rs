//! Integration tests for the seek strategies, driven through `SeekEngine`.

use frameseek_core::synthetic::{SyntheticOptions, SyntheticSource};
use frameseek_core::{
    CacheConfig, CancelToken, Completion, Decoded, Error, FrameCount, FrameSource, Reliability,
    Result, SeekConfig, SeekDirection, SeekEngine, SeekOutcome, StreamHandle, StreamInfo,
    Strategy,
};
use std::sync::{Arc, Mutex};

fn engine() -> SeekEngine {
    let cache = CacheConfig {
        dir: None,
        persist: false,
    };
    SeekEngine::new(SeekConfig::default(), cache).unwrap()
}

fn open(engine: &mut SeekEngine, options: SyntheticOptions) -> StreamHandle<SyntheticSource> {
    engine.open(SyntheticSource::new(options)).unwrap()
}

/// Seek, then check the next frame read is the target.
fn assert_lands(engine: &mut SeekEngine, handle: &mut StreamHandle<SyntheticSource>, target: u32) {
    let outcome = engine.seek(handle, target).unwrap();
    assert_eq!(outcome, SeekOutcome::Positioned, "seek to {target}");
    assert_eq!(handle.current_frame(), target - 1);
    assert_eq!(handle.next_frame(), target);
    let frame = handle.read_frame().unwrap().unwrap();
    assert_eq!(
        SyntheticSource::frame_number_of(&frame),
        Some(target),
        "seek to {target}"
    );
}

const TARGETS: [u32; 12] = [500, 1, 999, 2, 250, 251, 13, 9, 8, 700, 120, 1000];

// ---------------------------------------------------------------------------
// Native
// ---------------------------------------------------------------------------

#[test]
fn native_seeks_are_exact() {
    let mut engine = engine();
    let mut handle = open(&mut engine, SyntheticOptions::default());
    for target in TARGETS {
        assert_lands(&mut engine, &mut handle, target);
    }
    assert_eq!(engine.reliability(&handle), Reliability::Native);
}

#[test]
fn native_seek_beyond_start_margin_uses_native() {
    let mut engine = engine();
    let mut handle = open(&mut engine, SyntheticOptions::default());
    assert_lands(&mut engine, &mut handle, 640);
    assert_eq!(handle.last_strategy(), Some(Strategy::Native));
    assert_lands(&mut engine, &mut handle, 3);
    assert_eq!(handle.last_strategy(), Some(Strategy::Sequential));
}

#[test]
fn pulldown_timestamps_seek_exactly() {
    let mut engine = engine();
    let mut handle = open(
        &mut engine,
        SyntheticOptions {
            step_pattern: vec![3003, 4505],
            first_timestamp: 1001,
            ..Default::default()
        },
    );
    for target in TARGETS {
        assert_lands(&mut engine, &mut handle, target);
    }
    assert_eq!(engine.reliability(&handle), Reliability::Native);
}

#[test]
fn native_downgrade_mid_session_still_lands() {
    // Count the timestamp seeks the analysis makes on a clean stream, then
    // make seeks after that point land late.
    let mut probe_engine = engine();
    let mut probe = open(&mut probe_engine, SyntheticOptions::default());
    assert!(probe_engine.analyze(&mut probe).unwrap().is_done());
    let analysis_seeks = probe.source().timestamp_seeks();

    let mut engine = engine();
    let mut handle = open(
        &mut engine,
        SyntheticOptions {
            timestamp_seek_lag: 40,
            timestamp_seek_lag_from: analysis_seeks,
            ..Default::default()
        },
    );
    assert!(engine.analyze(&mut handle).unwrap().is_done());
    assert_eq!(engine.reliability(&handle), Reliability::Native);

    assert_lands(&mut engine, &mut handle, 600);
    assert_eq!(handle.last_strategy(), Some(Strategy::Sequential));
    assert_eq!(engine.reliability(&handle), Reliability::SequentialOnly);
    let record = handle.record().unwrap();
    assert!(!record.native_seek_reliable);
    assert_eq!(record.native_failures, 1);

    // The verdict sticks for the rest of the session.
    let seeks = handle.source().timestamp_seeks();
    assert_lands(&mut engine, &mut handle, 300);
    assert_eq!(handle.source().timestamp_seeks(), seeks);
}

#[test]
fn native_seeks_in_long_gop_stream() {
    // Calibration never sees a second keyframe, so landings a whole GOP
    // before the target must still be accepted.
    let mut engine = engine();
    let mut handle = open(
        &mut engine,
        SyntheticOptions {
            frames: 3000,
            gop: 250,
            ..Default::default()
        },
    );
    let record = engine.analyze(&mut handle).unwrap().done().unwrap();
    assert_eq!(record.profile.keyframe_interval, None);
    assert!(record.native_seek_reliable);
    assert_eq!(record.total_frames, 3000);

    let before = handle.source().decode_calls();
    assert_lands(&mut engine, &mut handle, 2000);
    assert_eq!(handle.last_strategy(), Some(Strategy::Native));
    assert!(handle.source().decode_calls() - before < 300);
}

#[test]
fn stamp_glitch_before_last_frame_keeps_it_reachable() {
    let mut engine = engine();
    let mut handle = open(
        &mut engine,
        SyntheticOptions {
            timestamp_jitter: vec![(999, 50)],
            ..Default::default()
        },
    );
    let record = engine.analyze(&mut handle).unwrap().done().unwrap();
    assert_eq!(record.total_frames, 1000);
    assert_lands(&mut engine, &mut handle, 1000);
    assert!(handle.read_frame().unwrap().is_none());
}

#[test]
fn early_stamp_on_last_frame_is_not_past_end() {
    let mut engine = engine();
    let mut handle = open(
        &mut engine,
        SyntheticOptions {
            timestamp_jitter: vec![(1000, -50)],
            ..Default::default()
        },
    );
    let record = engine.analyze(&mut handle).unwrap().done().unwrap();
    assert!(record.native_seek_reliable);
    assert_eq!(record.eof_timecode, Some(999_000));
    assert_lands(&mut engine, &mut handle, 1000);
    assert_eq!(handle.last_strategy(), Some(Strategy::Native));
    assert_eq!(engine.seek(&mut handle, 1001).unwrap(), SeekOutcome::EndOfStream);
}

// ---------------------------------------------------------------------------
// Index-assisted
// ---------------------------------------------------------------------------

#[test]
fn index_seeks_when_native_is_broken() {
    let mut engine = engine();
    let mut handle = open(
        &mut engine,
        SyntheticOptions {
            timestamp_seek_lag: 40,
            ..Default::default()
        },
    );
    assert!(engine.analyze(&mut handle).unwrap().is_done());
    assert_eq!(engine.reliability(&handle), Reliability::SequentialOnly);

    assert!(engine.build_index(&mut handle, |_| {}).unwrap().is_done());
    assert_eq!(engine.reliability(&handle), Reliability::IndexOnly);

    for target in TARGETS {
        assert_lands(&mut engine, &mut handle, target);
    }
    assert_lands(&mut engine, &mut handle, 777);
    assert_eq!(handle.last_strategy(), Some(Strategy::Indexed));
}

#[test]
fn index_seeks_without_timestamps() {
    let mut engine = engine();
    let mut handle = open(
        &mut engine,
        SyntheticOptions {
            timestamps: false,
            ..Default::default()
        },
    );
    assert!(engine.build_index(&mut handle, |_| {}).unwrap().is_done());
    assert!(!handle.index().unwrap().timecodes_usable());
    assert!(engine.analyze(&mut handle).unwrap().is_done());

    let before = handle.source().decode_calls();
    assert_lands(&mut engine, &mut handle, 905);
    assert_eq!(handle.last_strategy(), Some(Strategy::Indexed));
    assert!(handle.source().decode_calls() - before < 100);
}

#[test]
fn index_seeks_through_decoder_delay() {
    let mut engine = engine();
    let mut handle = open(
        &mut engine,
        SyntheticOptions {
            timestamps: false,
            decoder_delay: 2,
            ..Default::default()
        },
    );
    assert!(engine.build_index(&mut handle, |_| {}).unwrap().is_done());
    for target in [400, 37, 38, 999] {
        assert_lands(&mut engine, &mut handle, target);
    }
    assert_eq!(handle.last_strategy(), Some(Strategy::Indexed));
}

// ---------------------------------------------------------------------------
// Sequential
// ---------------------------------------------------------------------------

#[test]
fn sequential_reuses_cursor_for_short_forward_gaps() {
    let mut engine = engine();
    let mut handle = open(
        &mut engine,
        SyntheticOptions {
            timestamps: false,
            ..Default::default()
        },
    );
    assert_lands(&mut engine, &mut handle, 100);
    let before = handle.source().decode_calls();
    assert_lands(&mut engine, &mut handle, 150);
    // Frames 101..=149 are skipped, 150 is read through the lookahead.
    assert_eq!(handle.source().decode_calls() - before, 50);

    assert_lands(&mut engine, &mut handle, 20);
    assert_eq!(handle.last_strategy(), Some(Strategy::Sequential));
}

#[test]
fn sequential_reports_progress() {
    let mut engine = engine();
    let mut handle = open(
        &mut engine,
        SyntheticOptions {
            timestamps: false,
            ..Default::default()
        },
    );
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    handle.set_progress_sink(move |p| sink.lock().unwrap().push(p));
    assert_lands(&mut engine, &mut handle, 60);

    let seen = seen.lock().unwrap();
    let last = seen.last().unwrap();
    assert_eq!(last.done, 59);
    assert_eq!(last.total, Some(59));
}

#[test]
fn repeated_seek_uses_lookahead() {
    let mut engine = engine();
    let mut handle = open(&mut engine, SyntheticOptions::default());
    assert_eq!(engine.seek(&mut handle, 400).unwrap(), SeekOutcome::Positioned);
    let calls = handle.source().decode_calls();
    assert_eq!(engine.seek(&mut handle, 400).unwrap(), SeekOutcome::Positioned);
    assert_eq!(handle.source().decode_calls(), calls);
    let frame = handle.read_frame().unwrap().unwrap();
    assert_eq!(SyntheticSource::frame_number_of(&frame), Some(400));
}

#[test]
fn reading_continues_after_seek() {
    let mut engine = engine();
    let mut handle = open(&mut engine, SyntheticOptions::default());
    assert_eq!(engine.seek(&mut handle, 321).unwrap(), SeekOutcome::Positioned);
    for expected in 321..=325 {
        let frame = handle.read_frame().unwrap().unwrap();
        assert_eq!(SyntheticSource::frame_number_of(&frame), Some(expected));
        assert_eq!(handle.current_frame(), expected);
    }
}

// ---------------------------------------------------------------------------
// End of stream and errors
// ---------------------------------------------------------------------------

#[test]
fn seek_past_end_is_end_of_stream() {
    for options in [
        SyntheticOptions::default(),
        SyntheticOptions {
            timestamps: false,
            ..Default::default()
        },
        SyntheticOptions {
            timestamp_seek_lag: 40,
            ..Default::default()
        },
    ] {
        let mut engine = engine();
        let mut handle = open(&mut engine, options);
        assert_eq!(engine.seek(&mut handle, 1001).unwrap(), SeekOutcome::EndOfStream);
        assert_eq!(engine.seek(&mut handle, 5000).unwrap(), SeekOutcome::EndOfStream);
        assert_lands(&mut engine, &mut handle, 1000);
        assert!(handle.read_frame().unwrap().is_none());
    }
}

#[test]
fn seek_past_end_with_complete_index_decodes_nothing() {
    let mut engine = engine();
    let mut handle = open(
        &mut engine,
        SyntheticOptions {
            timestamps: false,
            ..Default::default()
        },
    );
    assert!(engine.build_index(&mut handle, |_| {}).unwrap().is_done());
    assert!(engine.analyze(&mut handle).unwrap().is_done());
    let calls = handle.source().decode_calls();
    assert_eq!(engine.seek(&mut handle, 1001).unwrap(), SeekOutcome::EndOfStream);
    assert_eq!(handle.source().decode_calls(), calls);
}

#[test]
fn frame_zero_is_invalid() {
    let mut engine = engine();
    let mut handle = open(&mut engine, SyntheticOptions::default());
    let err = engine.seek(&mut handle, 0).unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

#[test]
fn isolated_decode_errors_are_skipped() {
    let mut engine = engine();
    let mut handle = open(
        &mut engine,
        SyntheticOptions {
            timestamps: false,
            decode_errors: vec![40, 41, 90],
            ..Default::default()
        },
    );
    assert_lands(&mut engine, &mut handle, 120);
}

#[test]
fn clustered_decode_errors_fail_sequential_seek() {
    let mut engine = engine();
    let mut handle = open(
        &mut engine,
        SyntheticOptions {
            timestamps: false,
            decode_errors: vec![40, 41, 42, 43],
            ..Default::default()
        },
    );
    let err = engine.seek(&mut handle, 120).unwrap_err();
    assert!(matches!(err, Error::DecodeBudgetExhausted { .. }));
}

#[test]
fn undecodable_target_is_an_error() {
    let mut engine = engine();
    let mut handle = open(
        &mut engine,
        SyntheticOptions {
            timestamps: false,
            decode_errors: vec![50],
            ..Default::default()
        },
    );
    assert!(matches!(
        engine.seek(&mut handle, 50).unwrap_err(),
        Error::Decode(_)
    ));
    assert_lands(&mut engine, &mut handle, 51);
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

#[test]
fn cancelled_seek_reports_and_clears() {
    let mut engine = engine();
    let mut handle = open(&mut engine, SyntheticOptions::default());
    assert!(engine.analyze(&mut handle).unwrap().is_done());

    let token = handle.cancel_token();
    token.cancel();
    assert_eq!(engine.seek(&mut handle, 700).unwrap(), SeekOutcome::Cancelled);
    assert!(!token.is_cancelled());
    assert_lands(&mut engine, &mut handle, 700);
}

/// Cancels its token from inside the decode loop after a fixed number of
/// decode calls.
struct CancelAfter {
    inner: SyntheticSource,
    token: CancelToken,
    after: u64,
}

impl FrameSource for CancelAfter {
    fn info(&self) -> &StreamInfo {
        self.inner.info()
    }

    fn seek_to_timestamp(&mut self, timestamp: i64, direction: SeekDirection) -> Result<()> {
        self.inner.seek_to_timestamp(timestamp, direction)
    }

    fn seek_to_byte_offset(&mut self, offset: i64) -> Result<()> {
        self.inner.seek_to_byte_offset(offset)
    }

    fn rewind(&mut self) -> Result<()> {
        self.inner.rewind()
    }

    fn decode_next_frame(&mut self) -> Result<Decoded> {
        let decoded = self.inner.decode_next_frame();
        if self.inner.decode_calls() == self.after {
            self.token.cancel();
        }
        decoded
    }
}

fn analysis_decode_calls() -> u64 {
    let mut engine = engine();
    let mut handle = open(&mut engine, SyntheticOptions::default());
    assert!(engine.analyze(&mut handle).unwrap().is_done());
    handle.source().decode_calls()
}

fn assert_analysis_cancels_after(decodes: u64) {
    let mut engine = engine();
    let token = CancelToken::new();
    let source = CancelAfter {
        inner: SyntheticSource::new(SyntheticOptions::default()),
        token: token.clone(),
        after: decodes,
    };
    let mut handle = engine.open(source).unwrap();
    handle.set_cancel_token(token.clone());

    assert_eq!(engine.analyze(&mut handle).unwrap(), Completion::Cancelled);
    assert!(!token.is_cancelled());
    assert!(!handle.is_analyzed());
    assert!(!handle.native_enabled());
    assert!(engine.store().is_empty());

    let record = engine.analyze(&mut handle).unwrap().done().unwrap();
    assert!(record.native_seek_reliable);
    assert_eq!(record.total_frames, 1000);
}

#[test]
fn analysis_cancelled_while_counting_frames() {
    // Calibration takes 33 decodes; the frame count probes follow.
    assert_analysis_cancels_after(60);
}

#[test]
fn analysis_cancelled_while_verifying() {
    // The last verification seek decodes well over five frames.
    assert_analysis_cancels_after(analysis_decode_calls() - 5);
}

#[test]
fn cancelled_index_build_keeps_partial_index() {
    let mut engine = engine();
    let mut handle = open(
        &mut engine,
        SyntheticOptions {
            timestamps: false,
            ..Default::default()
        },
    );
    let token = handle.cancel_token();
    let outcome = engine
        .build_index(&mut handle, |p| {
            if p.done == 300 {
                token.cancel();
            }
        })
        .unwrap();
    assert_eq!(outcome, Completion::Cancelled);
    assert!(!handle.cancel_token().is_cancelled());

    let index = handle.index().unwrap();
    assert!(!index.is_complete());
    assert_eq!(index.entries().last().unwrap().seek_nr, 289);
    assert_eq!(handle.known_total(), None);
    assert_eq!(engine.reliability(&handle), Reliability::IndexOnly);

    // Targets past the scanned region fall back to sequential decoding.
    assert_lands(&mut engine, &mut handle, 250);
    assert_eq!(handle.last_strategy(), Some(Strategy::Indexed));
    assert_lands(&mut engine, &mut handle, 800);
}

// ---------------------------------------------------------------------------
// Frame count
// ---------------------------------------------------------------------------

#[test]
fn total_frames_from_native_probing() {
    let mut engine = engine();
    let mut handle = open(
        &mut engine,
        SyntheticOptions {
            frames: 2345,
            reported_frames: Some(2000),
            ..Default::default()
        },
    );
    let count = engine.detect_total_frames(&mut handle).unwrap();
    assert_eq!(
        count,
        Completion::Done(FrameCount::Counted {
            frames: 2345,
            eof_timecode: Some(2_344_000)
        })
    );
}

#[test]
fn total_frames_from_index() {
    let mut engine = engine();
    let mut handle = open(
        &mut engine,
        SyntheticOptions {
            frames: 480,
            timestamps: false,
            ..Default::default()
        },
    );
    assert!(engine.build_index(&mut handle, |_| {}).unwrap().is_done());
    let count = engine.detect_total_frames(&mut handle).unwrap().done().unwrap();
    assert_eq!(count.frames(), 480);
    assert!(count.is_counted());
}

#[test]
fn total_frames_estimated_without_native() {
    let mut engine = engine();
    let mut handle = open(
        &mut engine,
        SyntheticOptions {
            frames: 480,
            reported_frames: Some(500),
            timestamps: false,
            ..Default::default()
        },
    );
    let count = engine.detect_total_frames(&mut handle).unwrap().done().unwrap();
    assert_eq!(count, FrameCount::Estimated(500));
}
