//! FFprobe-based stream probing.
//!
//! Fills a [`StreamInfo`] from the container metadata ffprobe reports, so
//! the engine has a frame rate, duration and byte length to estimate with
//! before decoding anything.

use crate::{Error, Result};
use frameseek_core::StreamInfo;
use serde::Deserialize;
use std::path::Path;
use std::process::Command;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
    program_version: Option<FfprobeVersion>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    size: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    index: u32,
    codec_type: String,
    codec_name: Option<String>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeVersion {
    version: String,
}

/// Probe `path` with ffprobe and describe one of its video streams.
///
/// `track` selects a container stream index; `None` picks the first video
/// stream. `ffprobe` is the executable to run.
pub fn probe_stream(path: &Path, track: Option<u32>, ffprobe: &Path) -> Result<StreamInfo> {
    if !path.exists() {
        return Err(Error::media_not_found(path));
    }
    let output = Command::new(ffprobe)
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
            "-show_program_version",
        ])
        .arg(path)
        .output()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::tool_not_found("ffprobe")
            } else {
                Error::Io(e)
            }
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::tool_failed("ffprobe", stderr.to_string()));
    }

    let json_str = String::from_utf8(output.stdout)
        .map_err(|e| Error::BadProbeOutput(format!("invalid UTF-8: {e}")))?;
    parse_stream_info(path, track, &json_str)
}

/// Build the stream description from ffprobe's JSON output.
pub fn parse_stream_info(path: &Path, track: Option<u32>, json: &str) -> Result<StreamInfo> {
    let output: FfprobeOutput = serde_json::from_str(json)?;
    let stream = output
        .streams
        .iter()
        .filter(|s| s.codec_type == "video")
        .find(|s| track.map_or(true, |t| s.index == t))
        .ok_or_else(|| Error::NoVideoTrack {
            path: path.to_path_buf(),
            track: track.unwrap_or(0),
        })?;

    let decoder = stream
        .codec_name
        .clone()
        .unwrap_or_else(|| "unknown".to_string());
    let mut info = StreamInfo::new(path, stream.index, decoder);
    info.decoder_version = output
        .program_version
        .map(|v| format!("ffmpeg-{}", v.version))
        .unwrap_or_default();
    info.byte_len = output
        .format
        .size
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);
    info.frame_rate = stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_frame_rate));
    info.duration_secs = stream
        .duration
        .as_deref()
        .or(output.format.duration.as_deref())
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0);

    debug!(
        path = %path.display(),
        track = info.track,
        decoder = %info.decoder,
        fps = ?info.frame_rate,
        duration = ?info.duration_secs,
        "probed stream"
    );
    Ok(info)
}

fn parse_frame_rate(rate_str: &str) -> Option<f64> {
    let parts: Vec<&str> = rate_str.split('/').collect();
    if parts.len() == 2 {
        let num: f64 = parts[0].parse().ok()?;
        let den: f64 = parts[1].parse().ok()?;
        if den != 0.0 && num > 0.0 {
            return Some(num / den);
        }
        return None;
    }
    rate_str.parse().ok().filter(|r: &f64| *r > 0.0)
}
