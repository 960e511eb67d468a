//! Serializable summaries printed by the CLI.

use frameseek_core::{
    fingerprint, DecodedFrame, FrameIndex, IndexEntry, Reliability, ReliabilityRecord,
    SeekOutcome, StreamInfo, Strategy,
};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct StreamReport {
    pub path: String,
    pub track: u32,
    pub decoder: String,
    pub decoder_version: String,
    pub byte_len: u64,
    pub frame_rate: Option<f64>,
    pub duration_secs: Option<f64>,
    pub estimated_frames: Option<u32>,
}

impl From<&StreamInfo> for StreamReport {
    fn from(info: &StreamInfo) -> Self {
        Self {
            path: info.path.display().to_string(),
            track: info.track,
            decoder: info.decoder.clone(),
            decoder_version: info.decoder_version.clone(),
            byte_len: info.byte_len,
            frame_rate: info.frame_rate,
            duration_secs: info.duration_secs,
            estimated_frames: info.estimated_frames(0),
        }
    }
}

/// Verdict of the reliability analysis together with the strategy it allows.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub reliability: Reliability,
    pub record: ReliabilityRecord,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexReport {
    pub track: u32,
    pub decoder: String,
    pub entries: usize,
    pub step_size: u32,
    pub total_frames: u32,
    pub complete: bool,
    pub timecodes_usable: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rows: Vec<IndexEntry>,
}

impl IndexReport {
    /// Summarize `index`, including its first `rows` entries.
    pub fn new(index: &FrameIndex, rows: usize) -> Self {
        Self {
            track: index.track(),
            decoder: index.decoder().to_string(),
            entries: index.len(),
            step_size: index.step_size(),
            total_frames: index.total_frames(),
            complete: index.is_complete(),
            timecodes_usable: index.timecodes_usable(),
            rows: index.entries().iter().take(rows).copied().collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FrameReport {
    pub number: u32,
    pub timestamp: Option<i64>,
    pub byte_offset: Option<i64>,
    pub packet_size: usize,
    pub keyframe: bool,
    pub fingerprint: u16,
}

impl FrameReport {
    pub fn new(number: u32, frame: &DecodedFrame) -> Self {
        Self {
            number,
            timestamp: frame.timestamp,
            byte_offset: frame.byte_offset,
            packet_size: frame.packet_size,
            keyframe: frame.is_keyframe,
            fingerprint: fingerprint(&frame.picture),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SeekReport {
    pub target: u32,
    pub outcome: SeekOutcome,
    pub strategy: Option<Strategy>,
    pub reliability: Reliability,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub frames: Vec<FrameReport>,
}
