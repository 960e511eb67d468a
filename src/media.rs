//! Opening media files for the seek engine.

use crate::config::ToolsConfig;
use anyhow::{Context, Result};
use frameseek_core::{FrameSource, StreamInfo};
use std::path::Path;

/// A decoder for one video track of a media file.
pub type MediaSource = Box<dyn FrameSource>;

/// Open `path` for decoding.
#[cfg(feature = "native-ffmpeg")]
pub fn open_source(path: &Path, track: Option<u32>) -> Result<MediaSource> {
    let source = frameseek_av::FfmpegSource::open(path, track)
        .with_context(|| format!("Failed to open {:?}", path))?;
    Ok(Box::new(source))
}

/// Open `path` for decoding.
#[cfg(not(feature = "native-ffmpeg"))]
pub fn open_source(path: &Path, _track: Option<u32>) -> Result<MediaSource> {
    anyhow::bail!(
        "Cannot decode {:?}: frameseek was built without the native-ffmpeg feature",
        path
    )
}

/// Describe a stream with ffprobe.
pub fn probe(path: &Path, track: Option<u32>, tools: &ToolsConfig) -> Result<StreamInfo> {
    if !path.exists() {
        anyhow::bail!("File does not exist: {:?}", path);
    }
    let ffprobe = frameseek_av::locate_ffprobe(tools.ffprobe_path.as_deref())?;
    let info = frameseek_av::probe_stream(path, track, &ffprobe)
        .with_context(|| format!("Failed to probe {:?}", path))?;
    Ok(info)
}
