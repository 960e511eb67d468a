//! Deterministic in-memory stream for tests, benches and demos.
//!
//! Every frame's timestamp, packet layout and picture derive from its
//! frame number, so the exact frame a seek lands on can be checked with
//! [`SyntheticSource::frame_number_of`]. Options model the container
//! misbehaviour the seek strategies have to cope with.

use crate::source::{
    Decoded, DecodedFrame, FrameSource, Picture, Plane, SeekDirection, StreamInfo,
};
use crate::{Error, Result};
use std::path::PathBuf;

/// Bytes before the first packet.
const HEADER_BYTES: i64 = 4096;

/// Shape and quirks of a [`SyntheticSource`].
#[derive(Debug, Clone)]
pub struct SyntheticOptions {
    pub path: PathBuf,
    pub track: u32,
    pub frames: u32,
    pub first_timestamp: i64,
    /// Timestamp steps, repeated cyclically.
    pub step_pattern: Vec<i64>,
    /// Keyframe distance; frame 1 is always a keyframe.
    pub gop: u32,
    /// Frames after frame 1 before the first regular keyframe, modulo `gop`.
    pub keyframe_phase: u32,
    /// Report timestamps at all.
    pub timestamps: bool,
    /// Report frame rate and duration.
    pub metadata: bool,
    pub frame_rate: f64,
    /// Frame count the metadata claims, when it lies.
    pub reported_frames: Option<u32>,
    /// Timestamp seeks land this many frames after the right keyframe.
    pub timestamp_seek_lag: u32,
    /// Timestamp seeks before this many have been made land correctly.
    pub timestamp_seek_lag_from: u64,
    /// Byte seeks land this many frames after the right keyframe.
    pub byte_seek_lag: u32,
    /// Timestamp seeks fail outright.
    pub timestamp_seeks_fail: bool,
    /// Frames whose packet is corrupt; decoding them always fails.
    pub decode_errors: Vec<u32>,
    /// Offsets added to the reported timestamps of single frames.
    pub timestamp_jitter: Vec<(u32, i64)>,
    /// Frames emitted late by the decoder; reported byte offsets lead by
    /// this many packets.
    pub decoder_delay: usize,
    pub width: usize,
    pub height: usize,
}

impl Default for SyntheticOptions {
    fn default() -> Self {
        Self {
            path: PathBuf::from("synthetic.mkv"),
            track: 0,
            frames: 1000,
            first_timestamp: 0,
            step_pattern: vec![1000],
            gop: 12,
            keyframe_phase: 0,
            timestamps: true,
            metadata: true,
            frame_rate: 25.0,
            reported_frames: None,
            timestamp_seek_lag: 0,
            timestamp_seek_lag_from: 0,
            byte_seek_lag: 0,
            timestamp_seeks_fail: false,
            decode_errors: Vec::new(),
            timestamp_jitter: Vec::new(),
            decoder_delay: 0,
            width: 32,
            height: 8,
        }
    }
}

/// A [`FrameSource`] computing its frames on demand.
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    options: SyntheticOptions,
    info: StreamInfo,
    offsets: Vec<i64>,
    cursor: u32,
    decode_calls: u64,
    timestamp_seeks: u64,
    byte_seeks: u64,
}

impl SyntheticSource {
    pub fn new(options: SyntheticOptions) -> Self {
        let gop = options.gop.max(1);
        let keyframe_phase = options.keyframe_phase % gop;
        let options = SyntheticOptions {
            gop,
            keyframe_phase,
            ..options
        };

        // offsets[n] is frame n's packet position; offsets[frames + 1] is the file end.
        let mut offsets = Vec::with_capacity(options.frames as usize + 2);
        offsets.push(0);
        let mut position = HEADER_BYTES;
        for n in 1..=options.frames {
            offsets.push(position);
            position += packet_size(n, is_keyframe(n, gop, keyframe_phase)) as i64;
        }
        offsets.push(position);

        let mut info = StreamInfo::new(&options.path, options.track, "synthetic");
        info.decoder_version = "synthetic-1".to_string();
        info.byte_len = position as u64;
        if options.metadata && options.frame_rate > 0.0 {
            let claimed = options.reported_frames.unwrap_or(options.frames);
            info.frame_rate = Some(options.frame_rate);
            info.duration_secs = Some(claimed as f64 / options.frame_rate);
        }

        Self {
            options,
            info,
            offsets,
            cursor: 1,
            decode_calls: 0,
            timestamp_seeks: 0,
            byte_seeks: 0,
        }
    }

    /// Frame number embedded in a frame produced by this source.
    pub fn frame_number_of(frame: &DecodedFrame) -> Option<u32> {
        let bytes = frame.picture.planes.first()?.data.get(..4)?;
        Some(u32::from_le_bytes(bytes.try_into().ok()?))
    }

    /// Timestamp the container assigns to frame `n`, before jitter.
    pub fn nominal_timestamp(&self, n: u32) -> i64 {
        let pattern = &self.options.step_pattern;
        if n <= 1 || pattern.is_empty() {
            return self.options.first_timestamp;
        }
        let steps = (n - 1) as usize;
        let cycle: i64 = pattern.iter().sum();
        let whole = (steps / pattern.len()) as i64;
        let partial: i64 = pattern[..steps % pattern.len()].iter().sum();
        self.options.first_timestamp + whole * cycle + partial
    }

    /// Calls to `decode_next_frame` so far.
    pub fn decode_calls(&self) -> u64 {
        self.decode_calls
    }

    pub fn timestamp_seeks(&self) -> u64 {
        self.timestamp_seeks
    }

    pub fn byte_seeks(&self) -> u64 {
        self.byte_seeks
    }

    pub fn options(&self) -> &SyntheticOptions {
        &self.options
    }

    fn is_keyframe(&self, n: u32) -> bool {
        is_keyframe(n, self.options.gop, self.options.keyframe_phase)
    }

    /// Keyframe at or before `n`.
    fn keyframe_before(&self, n: u32) -> u32 {
        let (gop, phase) = (self.options.gop, self.options.keyframe_phase);
        let k = n.max(1) - 1;
        if k < phase {
            return 1;
        }
        ((k - phase) / gop) * gop + phase + 1
    }

    /// Keyframe at or after `n`.
    fn keyframe_after(&self, n: u32) -> u32 {
        if self.is_keyframe(n) {
            return n;
        }
        let (gop, phase) = (self.options.gop, self.options.keyframe_phase);
        let k = n.max(1) - 1;
        if k <= phase {
            return phase + 1;
        }
        (k - phase).div_ceil(gop) * gop + phase + 1
    }

    /// Land on `keyframe` plus a lag; past the end the next decode is EOF.
    fn land(&mut self, keyframe: u32, lag: u32) {
        self.cursor = keyframe
            .saturating_add(lag)
            .min(self.options.frames.saturating_add(1));
    }

    /// Render frame `n` as the decoder would produce it, without moving the
    /// cursor.
    pub fn frame_at(&self, n: u32) -> DecodedFrame {
        let timestamp = self.options.timestamps.then(|| {
            let jitter: i64 = self
                .options
                .timestamp_jitter
                .iter()
                .filter(|(frame, _)| *frame == n)
                .map(|(_, delta)| delta)
                .sum();
            self.nominal_timestamp(n) + jitter
        });
        let reported = n as usize + self.options.decoder_delay;
        let byte_offset = if reported <= self.options.frames as usize {
            Some(self.offsets[reported])
        } else {
            None
        };
        let keyframe = self.is_keyframe(n);
        DecodedFrame {
            timestamp,
            byte_offset,
            packet_size: packet_size(n, keyframe),
            is_keyframe: keyframe,
            picture: self.picture(n),
        }
    }

    fn picture(&self, n: u32) -> Picture {
        let (width, height) = (self.options.width.max(4), self.options.height.max(1));
        let mut luma = Vec::with_capacity(width * height);
        for row in 0..height {
            for col in 0..width {
                luma.push(mix(n, row, col));
            }
        }
        luma[..4].copy_from_slice(&n.to_le_bytes());

        let (cw, ch) = ((width / 2).max(1), (height / 2).max(1));
        let mut chroma = Vec::with_capacity(cw * ch);
        for row in 0..ch {
            for col in 0..cw {
                chroma.push(mix(n, row, col) ^ 0x55);
            }
        }

        Picture {
            planes: vec![
                Plane {
                    data: luma,
                    stride: width as isize,
                    width,
                    height,
                },
                Plane {
                    data: chroma,
                    stride: cw as isize,
                    width: cw,
                    height: ch,
                },
            ],
        }
    }

    /// Last frame whose nominal timestamp is at or before `timestamp`.
    fn frame_at_or_before(&self, timestamp: i64) -> u32 {
        let (mut low, mut high) = (1u32, self.options.frames.max(1));
        if self.nominal_timestamp(low) > timestamp {
            return 1;
        }
        while low < high {
            let mid = low + (high - low + 1) / 2;
            if self.nominal_timestamp(mid) <= timestamp {
                low = mid;
            } else {
                high = mid - 1;
            }
        }
        low
    }
}

fn is_keyframe(n: u32, gop: u32, phase: u32) -> bool {
    n <= 1 || (n - 1) % gop == phase
}

fn packet_size(n: u32, keyframe: bool) -> usize {
    let noise = mix(n, 7, 3) as usize * 3;
    if keyframe {
        6000 + noise
    } else {
        800 + noise
    }
}

fn mix(n: u32, row: usize, col: usize) -> u8 {
    let seed = ((n as u64) << 32) ^ ((row as u64) << 16) ^ col as u64;
    (seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) >> 56) as u8
}

impl FrameSource for SyntheticSource {
    fn info(&self) -> &StreamInfo {
        &self.info
    }

    fn seek_to_timestamp(&mut self, timestamp: i64, direction: SeekDirection) -> Result<()> {
        self.timestamp_seeks += 1;
        if self.options.timestamp_seeks_fail || !self.options.timestamps {
            return Err(Error::unsupported("stream cannot seek by timestamp"));
        }
        let lag = if self.timestamp_seeks > self.options.timestamp_seek_lag_from {
            self.options.timestamp_seek_lag
        } else {
            0
        };
        let keyframe = match direction {
            SeekDirection::Backward => self.keyframe_before(self.frame_at_or_before(timestamp)),
            SeekDirection::Forward => {
                let at = self.frame_at_or_before(timestamp);
                if self.nominal_timestamp(at) >= timestamp {
                    self.keyframe_after(at)
                } else {
                    self.keyframe_after(at + 1)
                }
            }
        };
        self.land(keyframe, lag);
        Ok(())
    }

    fn seek_to_byte_offset(&mut self, offset: i64) -> Result<()> {
        self.byte_seeks += 1;
        if offset < 0 {
            return Err(Error::invalid_input(format!("negative byte offset {offset}")));
        }
        // First frame whose packet starts at or after the offset.
        let packets = &self.offsets[1..=self.options.frames as usize];
        let first = packets.partition_point(|&start| start < offset) as u32 + 1;
        let keyframe = if first > self.options.frames {
            first
        } else {
            self.keyframe_after(first)
        };
        self.land(keyframe, self.options.byte_seek_lag);
        Ok(())
    }

    fn rewind(&mut self) -> Result<()> {
        self.cursor = 1;
        Ok(())
    }

    fn decode_next_frame(&mut self) -> Result<Decoded> {
        self.decode_calls += 1;
        if self.cursor > self.options.frames {
            return Ok(Decoded::Eof);
        }
        let n = self.cursor;
        self.cursor += 1;
        if self.options.decode_errors.contains(&n) {
            return Err(Error::decode(format!("corrupt packet in frame {n}")));
        }
        Ok(Decoded::Frame(self.frame_at(n)))
    }

    fn decoder_delay(&self) -> usize {
        self.options.decoder_delay
    }
}
