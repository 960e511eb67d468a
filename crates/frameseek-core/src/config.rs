//! Engine tunables.
//!
//! Every constant the seek strategies depend on lives here so it can be set
//! per deployment (the `[engine]` table of `frameseek.toml`) or per test.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Seek engine configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SeekConfig {
    /// Frames decoded after frame 1 while calibrating timestamps.
    pub calibration_samples: usize,
    /// Targets at or below this frame never use native seeking.
    pub start_margin: u32,
    /// Lower bound for the native seek pre-roll.
    pub min_pre_roll: u32,
    /// Pre-roll growth per native retry.
    pub pre_roll_increment: u32,
    /// Native seek attempts before the verdict is downgraded.
    pub native_retries: u32,
    /// Frames one native attempt may decode after the seek. Widened
    /// automatically for streams with longer keyframe intervals.
    pub native_decode_limit: u32,
    /// Index sync budget per outer attempt is `step_size * multiplier * attempt`.
    pub index_retry_multiplier: u32,
    /// Outer attempts of the index-assisted sync search.
    pub index_outer_retries: u32,
    /// Slots in the recent byte-offset ring used by the index sync search.
    pub offset_history: usize,
    /// Recoverable decode errors tolerated per sync loop.
    pub decode_error_budget: u32,
    /// Largest forward gap the sequential fallback covers without rewinding.
    pub sequential_reuse_gap: u32,
    /// Timestamp tolerance is `min_abs_step / tolerance_divisor`...
    pub tolerance_divisor: i64,
    /// ...clamped to at most this value.
    pub tolerance_cap: i64,
    /// Fixed tolerance overriding the derived one.
    pub timestamp_tolerance: Option<i64>,
    /// Fractions of the stream probed when verifying native seeking.
    pub verification_points: Vec<f64>,
    /// Non-EOF probe failures tolerated by the total frame detector.
    pub unexpected_probe_failures: u32,
}

impl Default for SeekConfig {
    fn default() -> Self {
        Self {
            calibration_samples: 32,
            start_margin: 8,
            min_pre_roll: 4,
            pre_roll_increment: 8,
            native_retries: 3,
            native_decode_limit: 1000,
            index_retry_multiplier: 4,
            index_outer_retries: 12,
            offset_history: 14,
            decode_error_budget: 3,
            sequential_reuse_gap: 512,
            tolerance_divisor: 200,
            tolerance_cap: 10,
            timestamp_tolerance: None,
            verification_points: vec![0.9, 0.7, 0.5, 0.3, 0.1],
            unexpected_probe_failures: 2,
        }
    }
}

impl SeekConfig {
    /// Reject settings the strategies cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.calibration_samples == 0 {
            return Err(Error::invalid_input("calibration_samples must be at least 1"));
        }
        if self.native_retries == 0 {
            return Err(Error::invalid_input("native_retries must be at least 1"));
        }
        if self.index_retry_multiplier == 0 || self.index_outer_retries == 0 {
            return Err(Error::invalid_input(
                "index_retry_multiplier and index_outer_retries must be at least 1",
            ));
        }
        if self.offset_history == 0 {
            return Err(Error::invalid_input("offset_history must be at least 1"));
        }
        if self.tolerance_divisor <= 0 {
            return Err(Error::invalid_input("tolerance_divisor must be positive"));
        }
        if let Some(p) = self
            .verification_points
            .iter()
            .find(|p| !(0.0..=1.0).contains(*p))
        {
            return Err(Error::invalid_input(format!(
                "verification point {p} is outside 0.0..=1.0"
            )));
        }
        Ok(())
    }
}

/// Where persisted indexes and reliability records live.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Shared cache directory. When unset, files sit next to the source.
    pub dir: Option<PathBuf>,
    /// Disable to keep everything in memory.
    pub persist: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: None,
            persist: true,
        }
    }
}
