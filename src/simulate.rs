//! Seek engine runs against a synthetic stream.
//!
//! Every synthetic frame carries its own number, so each seek can be checked
//! for the exact frame it lands on. Useful to try engine settings and cache
//! behaviour without media files or FFmpeg.

use anyhow::{Context, Result};
use frameseek_core::synthetic::{SyntheticOptions, SyntheticSource};
use frameseek_core::{CacheConfig, Reliability, SeekConfig, SeekEngine, SeekOutcome, Strategy};
use serde::Serialize;
use std::path::PathBuf;

/// Shape of the simulated stream and what to do with it.
#[derive(Debug, Clone)]
pub struct Simulation {
    pub frames: u32,
    pub steps: Vec<i64>,
    pub gop: u32,
    /// Frames native seeks land late by.
    pub lag: u32,
    pub timestamps: bool,
    pub build_index: bool,
    /// Frames to seek to; empty picks a spread over the stream.
    pub targets: Vec<u32>,
    /// Persist caches here; `None` keeps everything in memory.
    pub cache_dir: Option<PathBuf>,
}

impl Default for Simulation {
    fn default() -> Self {
        Self {
            frames: 1000,
            steps: vec![1000],
            gop: 12,
            lag: 0,
            timestamps: true,
            build_index: false,
            targets: Vec::new(),
            cache_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulatedSeek {
    pub target: u32,
    pub outcome: SeekOutcome,
    pub strategy: Option<Strategy>,
    /// Frame actually read after the seek.
    pub landed: Option<u32>,
    pub exact: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub frames: u32,
    pub reliability: Reliability,
    pub indexed: bool,
    pub seeks: Vec<SimulatedSeek>,
    pub decode_calls: u64,
}

impl SimulationReport {
    pub fn mismatches(&self) -> usize {
        self.seeks.iter().filter(|s| !s.exact).count()
    }
}

/// First, last, one past the end and a few points in between.
pub fn default_targets(frames: u32) -> Vec<u32> {
    let mut targets = vec![
        frames / 2,
        1,
        frames,
        frames / 4,
        2,
        frames / 4 * 3,
        frames.saturating_add(1),
    ];
    targets.retain(|&t| t > 0);
    targets.dedup();
    targets
}

/// Run the seeks of `sim` and check every landing.
pub fn run(sim: &Simulation, engine_config: &SeekConfig) -> Result<SimulationReport> {
    let cache = CacheConfig {
        dir: sim.cache_dir.clone(),
        persist: sim.cache_dir.is_some(),
    };
    let mut engine = SeekEngine::new(engine_config.clone(), cache)?;
    let source = SyntheticSource::new(SyntheticOptions {
        frames: sim.frames,
        step_pattern: sim.steps.clone(),
        gop: sim.gop,
        timestamps: sim.timestamps,
        timestamp_seek_lag: sim.lag,
        ..Default::default()
    });
    let mut handle = engine.open(source)?;

    if sim.build_index {
        engine
            .build_index(&mut handle, |p| {
                if p.done % 10_000 == 0 {
                    tracing::debug!("Indexed {} frames", p.done);
                }
            })
            .context("Index build failed")?;
    }

    let targets = if sim.targets.is_empty() {
        default_targets(sim.frames)
    } else {
        sim.targets.clone()
    };

    let mut seeks = Vec::with_capacity(targets.len());
    for target in targets {
        let outcome = engine
            .seek(&mut handle, target)
            .with_context(|| format!("Seek to frame {} failed", target))?;
        let landed = match outcome {
            SeekOutcome::Positioned => handle
                .read_frame()?
                .and_then(|f| SyntheticSource::frame_number_of(&f)),
            _ => None,
        };
        let exact = match outcome {
            SeekOutcome::Positioned => landed == Some(target),
            SeekOutcome::EndOfStream => target > sim.frames,
            SeekOutcome::Cancelled => false,
        };
        if !exact {
            tracing::warn!("Seek to {} landed on {:?} ({:?})", target, landed, outcome);
        }
        seeks.push(SimulatedSeek {
            target,
            outcome,
            strategy: handle.last_strategy(),
            landed,
            exact,
        });
    }

    Ok(SimulationReport {
        frames: sim.frames,
        reliability: engine.reliability(&handle),
        indexed: handle.index().is_some(),
        seeks,
        decode_calls: handle.source().decode_calls(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_targets() {
        assert_eq!(default_targets(1000), vec![500, 1, 1000, 250, 2, 750, 1001]);
        assert_eq!(default_targets(1), vec![1, 2]);
    }

    #[test]
    fn test_native_simulation_is_exact() {
        let report = run(&Simulation::default(), &SeekConfig::default()).unwrap();
        assert_eq!(report.reliability, Reliability::Native);
        assert_eq!(report.mismatches(), 0);
        assert_eq!(report.seeks.len(), 7);
    }

    #[test]
    fn test_lagging_stream_uses_index() {
        let sim = Simulation {
            lag: 40,
            build_index: true,
            targets: vec![640, 77],
            ..Default::default()
        };
        let report = run(&sim, &SeekConfig::default()).unwrap();
        assert_eq!(report.reliability, Reliability::IndexOnly);
        assert_eq!(report.mismatches(), 0);
        assert_eq!(report.seeks[0].strategy, Some(Strategy::Indexed));
    }
}
