//! The decode service the engine drives.
//!
//! A [`FrameSource`] wraps one video track of one file inside an external
//! demux/decode library. The engine only needs five primitives from it:
//! approximate timestamp seeks, byte-offset seeks, a rewind, sequential
//! decoding, and a description of the stream.

use crate::Result;
use std::path::PathBuf;

/// Direction bias for a timestamp seek.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekDirection {
    /// Land on the sync point at or before the timestamp.
    Backward,
    /// Land on the sync point at or after the timestamp.
    Forward,
}

/// Static description of the stream a source decodes.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamInfo {
    /// Source file path. Used to key persisted caches.
    pub path: PathBuf,
    /// Track (stream) number inside the container.
    pub track: u32,
    /// Decoder identity, e.g. `h264`.
    pub decoder: String,
    /// Decoder library version marker. Cached verdicts from another
    /// version are recomputed.
    pub decoder_version: String,
    /// Total size of the source in bytes.
    pub byte_len: u64,
    /// Nominal frame rate reported by the container.
    pub frame_rate: Option<f64>,
    /// Nominal duration reported by the container.
    pub duration_secs: Option<f64>,
}

impl StreamInfo {
    /// Create stream info with only the identifying fields set.
    pub fn new(path: impl Into<PathBuf>, track: u32, decoder: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            track,
            decoder: decoder.into(),
            decoder_version: String::new(),
            byte_len: 0,
            frame_rate: None,
            duration_secs: None,
        }
    }

    /// Rough frame count from container metadata or file size.
    ///
    /// Prefers `duration * frame_rate`; otherwise divides the file size by the
    /// mean packet size observed while probing.
    pub fn estimated_frames(&self, mean_frame_bytes: u64) -> Option<u32> {
        if let (Some(duration), Some(fps)) = (self.duration_secs, self.frame_rate) {
            let frames = (duration * fps).round();
            if frames.is_finite() && frames >= 1.0 {
                return Some(frames.min(i32::MAX as f64) as u32);
            }
        }
        if mean_frame_bytes > 0 && self.byte_len > 0 {
            let frames = self.byte_len / mean_frame_bytes;
            if frames >= 1 {
                return Some(frames.min(i32::MAX as u64) as u32);
            }
        }
        None
    }
}

/// One plane of a decoded picture.
#[derive(Debug, Clone, Default)]
pub struct Plane {
    /// Raw sample bytes, `height` rows of `stride` bytes.
    pub data: Vec<u8>,
    /// Bytes per row. Non-positive strides (bottom-up layouts) are skipped
    /// by the fingerprint.
    pub stride: isize,
    /// Visible samples per row.
    pub width: usize,
    /// Rows in this plane.
    pub height: usize,
}

impl Plane {
    /// Sample at `(row, column)`, if it lies inside the buffer.
    pub fn sample(&self, row: usize, column: usize) -> Option<u8> {
        if self.stride <= 0 {
            return None;
        }
        self.data.get(row * self.stride as usize + column).copied()
    }
}

/// A decoded picture, as planes.
#[derive(Debug, Clone, Default)]
pub struct Picture {
    pub planes: Vec<Plane>,
}

/// A frame produced by [`FrameSource::decode_next_frame`].
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    /// Container timestamp, if the stream reports one.
    pub timestamp: Option<i64>,
    /// Raw byte position of the frame's packet, if known.
    pub byte_offset: Option<i64>,
    /// Size in bytes of the frame's packet.
    pub packet_size: usize,
    /// Whether the frame is decodable without earlier frames.
    pub is_keyframe: bool,
    pub picture: Picture,
}

impl DecodedFrame {
    /// Packet size truncated to 16 bits, as stored in index rows.
    pub fn frame_length(&self) -> u16 {
        (self.packet_size & 0xFFFF) as u16
    }
}

/// Result of one decode step.
#[derive(Debug, Clone)]
pub enum Decoded {
    Frame(DecodedFrame),
    Eof,
}

/// A demux/decode backend for one video track.
///
/// Recoverable per-packet failures are reported as [`crate::Error::Decode`];
/// the engine skips them within a bounded budget. Any other error is fatal
/// for the current operation.
pub trait FrameSource {
    /// Describe the stream.
    fn info(&self) -> &StreamInfo;

    /// Approximate seek to a container timestamp.
    fn seek_to_timestamp(&mut self, timestamp: i64, direction: SeekDirection) -> Result<()>;

    /// Seek to a raw byte offset in the container.
    fn seek_to_byte_offset(&mut self, offset: i64) -> Result<()>;

    /// Reset the decode cursor to the start of the stream.
    fn rewind(&mut self) -> Result<()>;

    /// Decode the next frame in decode order.
    fn decode_next_frame(&mut self) -> Result<Decoded>;

    /// How many packets the decoder holds back before emitting a frame.
    fn decoder_delay(&self) -> usize {
        0
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn info(&self) -> &StreamInfo {
        (**self).info()
    }

    fn seek_to_timestamp(&mut self, timestamp: i64, direction: SeekDirection) -> Result<()> {
        (**self).seek_to_timestamp(timestamp, direction)
    }

    fn seek_to_byte_offset(&mut self, offset: i64) -> Result<()> {
        (**self).seek_to_byte_offset(offset)
    }

    fn rewind(&mut self) -> Result<()> {
        (**self).rewind()
    }

    fn decode_next_frame(&mut self) -> Result<Decoded> {
        (**self).decode_next_frame()
    }

    fn decoder_delay(&self) -> usize {
        (**self).decoder_delay()
    }
}
