//! Frame number to timestamp calibration.
//!
//! Containers rarely store a frame number, only a presentation timestamp.
//! Most streams repeat a short cycle of timestamp steps (a single step for
//! constant frame rates, `[3003, 4505]` style pairs for pulldown material),
//! which lets any frame number be mapped to the timestamp the container will
//! report for it.

use crate::config::SeekConfig;
use crate::handle::{DecodeBudget, Step, StreamHandle};
use crate::outcome::Completion;
use crate::source::{DecodedFrame, FrameSource};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// How the stream's timestamps relate to frame numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimingKind {
    /// Steps repeat with a period shorter than the probe window.
    Cyclic,
    /// No repeating pattern was found.
    Individual,
    /// Too few distinct timestamps to say anything.
    Unusable,
}

/// What the calibrator records about one probed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeSample {
    pub timestamp: Option<i64>,
    pub packet_size: usize,
    pub is_keyframe: bool,
}

impl From<&DecodedFrame> for ProbeSample {
    fn from(frame: &DecodedFrame) -> Self {
        Self {
            timestamp: frame.timestamp,
            packet_size: frame.packet_size,
            is_keyframe: frame.is_keyframe,
        }
    }
}

/// Frame number to timestamp mapping of one stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimecodeProfile {
    pub offset_of_first_frame: i64,
    /// One repeat cycle of timestamp steps.
    pub step_pattern: Vec<i64>,
    pub cycle_sum: i64,
    pub min_abs_step: i64,
    pub timing: TimingKind,
    /// Largest keyframe distance seen while probing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyframe_interval: Option<u32>,
    /// Mean packet size of the probed frames.
    #[serde(default)]
    pub mean_frame_bytes: u64,
}

impl TimecodeProfile {
    /// Profile of a stream whose timestamps cannot be used.
    pub fn unusable(offset_of_first_frame: i64) -> Self {
        Self {
            offset_of_first_frame,
            step_pattern: Vec::new(),
            cycle_sum: 0,
            min_abs_step: 0,
            timing: TimingKind::Unusable,
            keyframe_interval: None,
            mean_frame_bytes: 0,
        }
    }

    /// Derive a profile from frames decoded from the start of the stream.
    ///
    /// Only the leading run of samples with timestamps is used for timing;
    /// keyframe spacing and packet sizes come from every sample.
    pub fn from_samples(samples: &[ProbeSample]) -> Self {
        let stamps: Vec<i64> = samples.iter().map_while(|s| s.timestamp).collect();
        let offset = stamps.first().copied().unwrap_or(0);

        let mut profile = Self::unusable(offset);
        profile.keyframe_interval = keyframe_interval(samples);
        if !samples.is_empty() {
            let bytes: u64 = samples.iter().map(|s| s.packet_size as u64).sum();
            profile.mean_frame_bytes = bytes / samples.len() as u64;
        }

        let steps: Vec<i64> = stamps.windows(2).map(|w| w[1] - w[0]).collect();
        if steps.iter().all(|&s| s == 0) {
            return profile;
        }

        let period = detect_period(&steps);
        let cycle_sum: i64 = steps[..period].iter().sum();
        if cycle_sum <= 0 {
            return profile;
        }

        profile.min_abs_step = steps.iter().map(|s| s.abs()).min().unwrap_or(0);
        profile.step_pattern = steps[..period].to_vec();
        profile.cycle_sum = cycle_sum;
        profile.timing = if period < steps.len() {
            TimingKind::Cyclic
        } else {
            TimingKind::Individual
        };
        profile
    }

    /// Expected container timestamp of frame `n` (1-based).
    pub fn frame_to_timecode(&self, n: u32) -> i64 {
        if n <= 1 || self.step_pattern.is_empty() {
            return self.offset_of_first_frame;
        }
        let steps = (n - 1) as i64;
        let period = self.step_pattern.len() as i64;
        let whole = steps / period;
        let partial: i64 = self.step_pattern[..(steps % period) as usize].iter().sum();
        self.offset_of_first_frame + whole * self.cycle_sum + partial
    }

    /// Whether native seeks can be positioned by timestamp at all.
    pub fn is_cyclic(&self) -> bool {
        self.timing == TimingKind::Cyclic
    }
}

/// Smallest period `p` with `steps[j] == steps[j + p]` for every in-range `j`.
///
/// Returns `steps.len()` when no shorter period exists and 0 for no steps.
pub fn detect_period(steps: &[i64]) -> usize {
    let n = steps.len();
    (1..n)
        .find(|&p| (0..n - p).all(|j| steps[j] == steps[j + p]))
        .unwrap_or(n)
}

fn keyframe_interval(samples: &[ProbeSample]) -> Option<u32> {
    let positions: Vec<usize> = samples
        .iter()
        .enumerate()
        .filter(|(_, s)| s.is_keyframe)
        .map(|(i, _)| i)
        .collect();
    positions
        .windows(2)
        .map(|w| (w[1] - w[0]) as u32)
        .max()
}

/// Timestamp tolerance for one stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MatchTolerance(i64);

impl MatchTolerance {
    /// `min_abs_step / divisor` clamped to `[0, cap]`, unless configured.
    pub fn for_profile(profile: &TimecodeProfile, config: &SeekConfig) -> Self {
        if let Some(fixed) = config.timestamp_tolerance {
            return Self(fixed.max(0));
        }
        let derived = profile.min_abs_step / config.tolerance_divisor.max(1);
        Self(derived.clamp(0, config.tolerance_cap.max(0)))
    }

    pub fn value(self) -> i64 {
        self.0
    }

    /// Whether two timestamps are equal within the tolerance.
    pub fn matches(self, a: i64, b: i64) -> bool {
        (a - b).abs() <= self.0
    }
}

/// Decode the start of the stream and derive its timestamp profile.
///
/// Leaves the cursor at a known position just after the probed frames.
pub fn calibrate<S: FrameSource>(
    handle: &mut StreamHandle<S>,
    config: &SeekConfig,
) -> Result<Completion<TimecodeProfile>> {
    handle.rewind()?;
    let mut budget = DecodeBudget::new(config.decode_error_budget);
    let mut samples = Vec::with_capacity(config.calibration_samples + 1);

    while samples.len() <= config.calibration_samples {
        match handle.advance(&mut budget) {
            Ok(Step::Frame(frame)) => {
                let has_timestamp = frame.timestamp.is_some();
                samples.push(ProbeSample::from(&frame));
                if !has_timestamp {
                    break;
                }
            }
            Ok(Step::Skipped) => samples.push(ProbeSample {
                timestamp: None,
                packet_size: 0,
                is_keyframe: false,
            }),
            Ok(Step::Eof) => break,
            Ok(Step::Cancelled) => return Ok(Completion::Cancelled),
            Err(Error::DecodeBudgetExhausted { errors, .. }) => {
                debug!(errors, "calibration stopped by decode errors");
                break;
            }
            Err(e) => return Err(e),
        }
    }

    let profile = TimecodeProfile::from_samples(&samples);
    debug!(
        timing = ?profile.timing,
        period = profile.step_pattern.len(),
        cycle_sum = profile.cycle_sum,
        offset = profile.offset_of_first_frame,
        "calibrated timestamps"
    );
    Ok(Completion::Done(profile))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples_from_steps(first: i64, steps: &[i64]) -> Vec<ProbeSample> {
        let mut ts = first;
        let mut out = vec![ProbeSample {
            timestamp: Some(ts),
            packet_size: 1000,
            is_keyframe: true,
        }];
        for (i, step) in steps.iter().enumerate() {
            ts += step;
            out.push(ProbeSample {
                timestamp: Some(ts),
                packet_size: 1000,
                is_keyframe: (i + 1) % 12 == 0,
            });
        }
        out
    }

    #[test]
    fn test_constant_rate() {
        let profile = TimecodeProfile::from_samples(&samples_from_steps(0, &[1000; 32]));
        assert_eq!(profile.step_pattern, vec![1000]);
        assert_eq!(profile.cycle_sum, 1000);
        assert_eq!(profile.timing, TimingKind::Cyclic);
        assert_eq!(profile.frame_to_timecode(1), 0);
        assert_eq!(profile.frame_to_timecode(250), 249_000);
    }

    #[test]
    fn test_alternating_steps() {
        let steps: Vec<i64> = (0..32).map(|i| if i % 2 == 0 { 3003 } else { 4505 }).collect();
        assert_eq!(detect_period(&steps), 2);
        let profile = TimecodeProfile::from_samples(&samples_from_steps(0, &steps));
        assert_eq!(profile.cycle_sum, 7508);
        assert_eq!(profile.min_abs_step, 3003);
        assert_eq!(profile.frame_to_timecode(2), 3003);
        assert_eq!(profile.frame_to_timecode(3), 7508);
        assert_eq!(profile.frame_to_timecode(4), 10_511);
    }

    #[test]
    fn test_offset_is_added() {
        let profile = TimecodeProfile::from_samples(&samples_from_steps(500, &[40; 10]));
        assert_eq!(profile.frame_to_timecode(0), 500);
        assert_eq!(profile.frame_to_timecode(11), 900);
    }

    #[test]
    fn test_no_repeat_is_individual() {
        let steps = [10, 11, 12, 13, 14, 15];
        assert_eq!(detect_period(&steps), steps.len());
        let profile = TimecodeProfile::from_samples(&samples_from_steps(0, &steps));
        assert_eq!(profile.timing, TimingKind::Individual);
    }

    #[test]
    fn test_period_of_empty_and_single() {
        assert_eq!(detect_period(&[]), 0);
        assert_eq!(detect_period(&[7]), 1);
    }

    #[test]
    fn test_constant_timestamps_unusable() {
        let profile = TimecodeProfile::from_samples(&samples_from_steps(100, &[0; 8]));
        assert_eq!(profile.timing, TimingKind::Unusable);
        assert_eq!(profile.frame_to_timecode(5), 100);
    }

    #[test]
    fn test_single_frame_unusable() {
        let profile = TimecodeProfile::from_samples(&samples_from_steps(0, &[]));
        assert_eq!(profile.timing, TimingKind::Unusable);
    }

    #[test]
    fn test_decreasing_timestamps_unusable() {
        let profile = TimecodeProfile::from_samples(&samples_from_steps(0, &[-5; 6]));
        assert_eq!(profile.timing, TimingKind::Unusable);
    }

    #[test]
    fn test_sampling_stops_at_missing_timestamp() {
        let mut samples = samples_from_steps(0, &[100; 4]);
        samples.push(ProbeSample {
            timestamp: None,
            packet_size: 0,
            is_keyframe: false,
        });
        samples.extend(samples_from_steps(99_999, &[1; 4]));
        let profile = TimecodeProfile::from_samples(&samples);
        assert_eq!(profile.step_pattern, vec![100]);
    }

    #[test]
    fn test_keyframe_interval_and_mean_size() {
        let profile = TimecodeProfile::from_samples(&samples_from_steps(0, &[1; 30]));
        assert_eq!(profile.keyframe_interval, Some(12));
        assert_eq!(profile.mean_frame_bytes, 1000);
    }

    #[test]
    fn test_tolerance_derivation() {
        let config = SeekConfig::default();
        let mut profile = TimecodeProfile::unusable(0);
        profile.min_abs_step = 1000;
        assert_eq!(MatchTolerance::for_profile(&profile, &config).value(), 5);
        profile.min_abs_step = 90_000;
        assert_eq!(MatchTolerance::for_profile(&profile, &config).value(), 10);
        profile.min_abs_step = 40;
        assert_eq!(MatchTolerance::for_profile(&profile, &config).value(), 0);

        let fixed = SeekConfig {
            timestamp_tolerance: Some(3),
            ..Default::default()
        };
        let tol = MatchTolerance::for_profile(&profile, &fixed);
        assert!(tol.matches(100, 103));
        assert!(!tol.matches(100, 104));
    }
}
