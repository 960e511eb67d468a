//! # frameseek-av
//!
//! Media backends for the frameseek engine.
//!
//! This crate provides:
//! - Locating ffprobe and reporting the available backends
//! - Stream probing with ffprobe, producing a [`frameseek_core::StreamInfo`]
//! - [`FfmpegSource`], a [`frameseek_core::FrameSource`] decoding in-process
//!   with FFmpeg (feature `native-ffmpeg`)
//!
//! ## Features
//!
//! - `native-ffmpeg` - In-process decoding through ffmpeg-the-third
//!
//! ## Example
//!
//! ```no_run
//! use frameseek_av::{locate_ffprobe, probe_stream};
//! use std::path::Path;
//!
//! let ffprobe = locate_ffprobe(None)?;
//! let info = probe_stream(Path::new("/path/to/video.mkv"), None, &ffprobe)?;
//! println!("{} at {:?} fps", info.decoder, info.frame_rate);
//! # Ok::<(), frameseek_av::Error>(())
//! ```

mod error;
pub mod locate;
pub mod probe;

#[cfg(feature = "native-ffmpeg")]
pub mod native;

pub use error::{Error, Result};
pub use probe::{parse_stream_info, probe_stream};
pub use locate::{detect_backends, ffprobe_version, locate_ffprobe, Backends};

#[cfg(feature = "native-ffmpeg")]
pub use native::FfmpegSource;

/// Whether this build can decode real media files.
pub const fn has_native_decoder() -> bool {
    cfg!(feature = "native-ffmpeg")
}
