//! Per-stream table of seekable frames.
//!
//! A full forward scan records every keyframe with its raw byte offset, packet
//! size and picture fingerprint. Seeks later jump to the nearest recorded
//! entry below the target and recognise it again by fingerprint, which works
//! even when the container's own seeking is useless.

mod build;
mod persist;

pub use build::{scan, ScanOutcome};
pub use persist::{FORMAT_VERSION, MAGIC, ROW_SIZE};

use crate::source::StreamInfo;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Initial growth block of the entry table.
const INITIAL_BLOCK: usize = 1024;

/// One seekable frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndexEntry {
    /// 1-based frame number.
    pub seek_nr: u32,
    /// Raw byte position of the frame's packet.
    pub byte_offset: i64,
    /// Packet size truncated to 16 bits.
    pub frame_length: u16,
    pub checksum: u16,
    /// Container timestamp; `None` when unknown.
    pub timecode: Option<i64>,
}

/// Ordered, strictly increasing table of [`IndexEntry`] rows.
#[derive(Debug, Clone)]
pub struct FrameIndex {
    entries: Vec<IndexEntry>,
    step_size: u32,
    total_frames: u32,
    track: u32,
    decoder: String,
    path: PathBuf,
    block: usize,
}

impl PartialEq for FrameIndex {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
            && self.step_size == other.step_size
            && self.total_frames == other.total_frames
            && self.track == other.track
            && self.decoder == other.decoder
            && self.path == other.path
    }
}

impl FrameIndex {
    /// Empty index for a track of a source file.
    pub fn new(path: impl Into<PathBuf>, track: u32, decoder: impl Into<String>) -> Self {
        Self {
            entries: Vec::new(),
            step_size: 1,
            total_frames: 0,
            track,
            decoder: decoder.into(),
            path: path.into(),
            block: INITIAL_BLOCK,
        }
    }

    /// Empty index for the stream a source describes.
    pub fn for_stream(info: &StreamInfo) -> Self {
        Self::new(&info.path, info.track, &info.decoder)
    }

    /// Append an entry after the last one.
    ///
    /// Entries not strictly after the current last frame are ignored and
    /// `false` is returned. An entry without a timecode clears entry 0's
    /// timecode, which disables timestamp-based syncing for the whole index.
    pub fn append(&mut self, entry: IndexEntry) -> bool {
        if let Some(last) = self.entries.last() {
            if entry.seek_nr <= last.seek_nr {
                return false;
            }
        }
        if self.entries.len() == self.entries.capacity() {
            self.entries.reserve_exact(self.block);
            self.block = self.block.saturating_mul(2);
        }
        if entry.timecode.is_none() {
            if let Some(first) = self.entries.first_mut() {
                first.timecode = None;
            }
        }
        self.entries.push(entry);
        true
    }

    /// Position of the last entry strictly below `target`.
    pub fn lookup_nearest(&self, target: u32) -> Option<usize> {
        if self.entries.is_empty() {
            return None;
        }
        let target = target as i64;
        let step = self.step_size.max(1) as i64;
        let last = self.entries.len() - 1;

        let mut i = ((target - 2) / step).clamp(0, last as i64) as usize;
        let floor = target - (2 * step).max(64);
        while i < last && (self.entries[i].seek_nr as i64) < floor {
            i += 1;
        }
        while (self.entries[i].seek_nr as i64) >= target {
            if i == 0 {
                return None;
            }
            i -= 1;
        }
        Some(i)
    }

    /// Whether index-assisted seeks may sync on timestamps.
    pub fn timecodes_usable(&self) -> bool {
        self.entries.first().is_some_and(|e| e.timecode.is_some())
    }

    /// Replace an entry's byte offset with an earlier recovered one.
    ///
    /// Returns whether the entry changed.
    pub fn repair_offset(&mut self, position: usize, byte_offset: i64) -> bool {
        match self.entries.get_mut(position) {
            Some(entry) if byte_offset >= 0 && byte_offset < entry.byte_offset => {
                entry.byte_offset = byte_offset;
                true
            }
            _ => false,
        }
    }

    /// Record the scan result: spacing of entries and the frame count.
    ///
    /// A `total_frames` of 0 marks the index incomplete.
    pub fn finish(&mut self, total_frames: u32) {
        self.total_frames = total_frames;
        let scanned = if total_frames > 0 {
            total_frames
        } else {
            self.entries.last().map_or(0, |e| e.seek_nr)
        };
        self.step_size = if self.entries.is_empty() {
            1
        } else {
            (scanned / self.entries.len() as u32).max(1)
        };
    }

    /// Whether this index belongs to `info`'s track and decoder.
    pub fn matches_stream(&self, info: &StreamInfo) -> bool {
        self.track == info.track && self.decoder == info.decoder
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn get(&self, position: usize) -> Option<&IndexEntry> {
        self.entries.get(position)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn step_size(&self) -> u32 {
        self.step_size
    }

    /// Frame count from a completed scan, 0 when incomplete.
    pub fn total_frames(&self) -> u32 {
        self.total_frames
    }

    /// Whether the index was produced by a scan that reached the end.
    pub fn is_complete(&self) -> bool {
        self.total_frames > 0
    }

    pub fn track(&self) -> u32 {
        self.track
    }

    pub fn decoder(&self) -> &str {
        &self.decoder
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn set_path(&mut self, path: impl Into<PathBuf>) {
        self.path = path.into();
    }

    pub(crate) fn set_layout(&mut self, step_size: u32, total_frames: u32) {
        self.step_size = step_size.max(1);
        self.total_frames = total_frames;
    }
}
