//! Frame count discovery without a full scan.
//!
//! Native seeks make probing "does frame `n` exist" cost a handful of decodes,
//! so the last frame is found by growing a candidate until a probe fails and
//! then bisecting.

use crate::config::SeekConfig;
use crate::handle::{DecodeBudget, Step, StreamHandle};
use crate::outcome::Completion;
use crate::seek::native::{self, Landing};
use crate::seek::sequential;
use crate::seek::Attempt;
use crate::source::FrameSource;
use crate::timecode::TimecodeProfile;
use crate::{Error, Result};
use tracing::{debug, info};

/// Frame count used when neither metadata nor packet sizes give a guess.
const FALLBACK_GUESS: u32 = 1024;

/// Frame count of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameCount {
    /// Found by probing; the timestamp of the last frame when known.
    Counted {
        frames: u32,
        eof_timecode: Option<i64>,
    },
    /// Derived from file size or container metadata.
    Estimated(u32),
}

impl FrameCount {
    pub fn frames(&self) -> u32 {
        match *self {
            Self::Counted { frames, .. } => frames,
            Self::Estimated(frames) => frames,
        }
    }

    pub fn is_counted(&self) -> bool {
        matches!(self, Self::Counted { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Probe {
    /// The frame decoded; carries its timestamp.
    Exists(Option<i64>),
    PastEnd,
    Unexpected,
    Cancelled,
}

struct Detector<'a> {
    profile: &'a TimecodeProfile,
    config: &'a SeekConfig,
    unexpected: u32,
    probes: u32,
}

impl Detector<'_> {
    fn probe<S: FrameSource>(&mut self, handle: &mut StreamHandle<S>, n: u32) -> Result<Probe> {
        self.probes += 1;
        let landed = if n <= self.config.start_margin.max(3) {
            handle.rewind()?;
            match sequential::decode_forward(handle, n - 1, self.config, false) {
                Ok(Attempt::Landed) => Landing::Landed,
                Ok(Attempt::Cancelled) => Landing::Cancelled,
                Ok(_) => Landing::Eof,
                Err(Error::DecodeBudgetExhausted { .. }) => return Ok(self.unexpected()),
                Err(e) => return Err(e),
            }
        } else {
            native::position(handle, self.profile, n, handle.pre_roll(), self.config)?
        };

        let probe = match landed {
            Landing::Landed => {
                let mut budget = DecodeBudget::new(self.config.decode_error_budget);
                match handle.pull(&mut budget) {
                    Ok(Step::Frame(frame)) => Probe::Exists(frame.timestamp),
                    Ok(Step::Skipped) => Probe::Exists(None),
                    Ok(Step::Eof) => Probe::PastEnd,
                    Ok(Step::Cancelled) => Probe::Cancelled,
                    Err(Error::DecodeBudgetExhausted { .. }) => self.unexpected(),
                    Err(e) => return Err(e),
                }
            }
            Landing::Eof => Probe::PastEnd,
            Landing::Missed(miss) => {
                debug!(frame = n, ?miss, "frame count probe missed");
                self.unexpected()
            }
            Landing::Cancelled => Probe::Cancelled,
        };
        handle.invalidate_position();
        Ok(probe)
    }

    fn unexpected(&mut self) -> Probe {
        self.unexpected += 1;
        Probe::Unexpected
    }

    fn gave_up(&self) -> bool {
        self.unexpected >= self.config.unexpected_probe_failures
    }

    /// Probe `n`, moving to a neighbour strictly between `low` and `high`
    /// when the probe fails for a reason other than the end of the stream.
    ///
    /// An unexpected failure says nothing about whether `n` exists, so it
    /// never moves a bound. Returns the frame actually probed.
    fn probe_near<S: FrameSource>(
        &mut self,
        handle: &mut StreamHandle<S>,
        n: u32,
        low: u32,
        high: Option<u32>,
    ) -> Result<(u32, Probe)> {
        let mut probe = self.probe(handle, n)?;
        let mut at = n;
        for neighbour in [n.saturating_add(1), n.saturating_sub(1)] {
            if probe != Probe::Unexpected || self.gave_up() {
                break;
            }
            if neighbour <= low || high.is_some_and(|high| neighbour >= high) {
                continue;
            }
            debug!(frame = n, neighbour, "retrying frame count probe on a neighbour");
            probe = self.probe(handle, neighbour)?;
            at = neighbour;
        }
        Ok((at, probe))
    }
}

/// Find the number of the last decodable frame.
///
/// Gives up with [`FrameCount::Estimated`] once unexpected probe failures
/// show native seeking cannot be trusted on this stream, or when a failure
/// leaves the boundary undecided.
pub fn detect_total<S: FrameSource>(
    handle: &mut StreamHandle<S>,
    profile: &TimecodeProfile,
    config: &SeekConfig,
) -> Result<Completion<FrameCount>> {
    let estimate = handle
        .info()
        .estimated_frames(profile.mean_frame_bytes)
        .unwrap_or(FALLBACK_GUESS)
        .max(2);
    let mut detector = Detector {
        profile,
        config,
        unexpected: 0,
        probes: 0,
    };
    let estimated = FrameCount::Estimated(estimate);

    let mut low = 1u32;
    let mut candidate = estimate;
    let mut high = loop {
        match detector.probe_near(handle, candidate, low, None)? {
            (at, Probe::Exists(_)) => {
                low = at;
                if at >= i32::MAX as u32 {
                    break at.saturating_add(1);
                }
                candidate = at.saturating_add((at / 2).max(1)).min(i32::MAX as u32);
            }
            (at, Probe::PastEnd) => break at,
            (_, Probe::Unexpected) => return Ok(Completion::Done(estimated)),
            (_, Probe::Cancelled) => return Ok(Completion::Cancelled),
        }
    };

    while high - low > 1 {
        let mid = low + (high - low) / 2;
        match detector.probe_near(handle, mid, low, Some(high))? {
            (at, Probe::Exists(_)) => low = at,
            (at, Probe::PastEnd) => high = at,
            (_, Probe::Unexpected) => return Ok(Completion::Done(estimated)),
            (_, Probe::Cancelled) => return Ok(Completion::Cancelled),
        }
    }

    let count = match detector.probe(handle, low)? {
        // A late stamp on the last frame must not make it look past the end.
        Probe::Exists(timestamp) => FrameCount::Counted {
            frames: low,
            eof_timecode: timestamp.map(|ts| ts.max(profile.frame_to_timecode(low))),
        },
        Probe::Cancelled => return Ok(Completion::Cancelled),
        Probe::PastEnd | Probe::Unexpected => estimated,
    };
    info!(
        frames = count.frames(),
        counted = count.is_counted(),
        probes = detector.probes,
        "detected frame count"
    );
    Ok(Completion::Done(count))
}
