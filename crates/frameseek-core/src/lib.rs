//! Frame-accurate random access over streaming video decoders.
//!
//! Containers index time, not frames, and many of them seek imprecisely or
//! not at all. This crate positions a decoder so that the next frame it
//! produces is exactly the requested frame number, using the cheapest of
//! three strategies:
//!
//! - **Native** timestamp seeks, once a per-stream analysis has shown they
//!   land where the calibrated timestamps say they should.
//! - **Index-assisted** seeks using a [`FrameIndex`] of keyframe byte offsets
//!   and picture fingerprints built by a full scan.
//! - **Sequential** decoding forward from a known position.
//!
//! The decode library itself sits behind the [`FrameSource`] trait.
//!
//! # Example
//!
//! ```
//! use frameseek_core::synthetic::{SyntheticOptions, SyntheticSource};
//! use frameseek_core::{CacheConfig, SeekConfig, SeekEngine, SeekOutcome};
//!
//! let cache = CacheConfig { dir: None, persist: false };
//! let mut engine = SeekEngine::new(SeekConfig::default(), cache).unwrap();
//! let source = SyntheticSource::new(SyntheticOptions::default());
//! let mut handle = engine.open(source).unwrap();
//!
//! assert_eq!(engine.seek(&mut handle, 500).unwrap(), SeekOutcome::Positioned);
//! let frame = handle.read_frame().unwrap().unwrap();
//! assert_eq!(SyntheticSource::frame_number_of(&frame), Some(500));
//! ```

pub mod cache;
pub mod cancel;
pub mod checksum;
pub mod config;
pub mod engine;
pub mod error;
pub mod handle;
pub mod index;
pub mod outcome;
pub mod reliability;
mod seek;
pub mod source;
pub mod synthetic;
pub mod timecode;
pub mod total;

pub use cancel::CancelToken;
pub use checksum::fingerprint;
pub use config::{CacheConfig, SeekConfig};
pub use engine::SeekEngine;
pub use error::{Error, Result};
pub use handle::{ProgressSink, StreamHandle};
pub use index::{FrameIndex, IndexEntry};
pub use outcome::{Completion, Progress, Reliability, SeekOutcome, Strategy};
pub use reliability::{ReliabilityRecord, ReliabilityStore};
pub use source::{Decoded, DecodedFrame, FrameSource, Picture, Plane, SeekDirection, StreamInfo};
pub use timecode::{detect_period, MatchTolerance, TimecodeProfile, TimingKind};
pub use total::FrameCount;
