//! Binary file format of a [`FrameIndex`].
//!
//! Little-endian throughout:
//!
//! ```text
//! magic        4 bytes  "FSIX"
//! version      u16
//! track        u32
//! decoder      u16 length + UTF-8
//! step_size    i32
//! total_frames i32      0 = incomplete
//! count        u32
//! rows         count x (seek_nr i32, byte_offset i64, frame_length u16,
//!                       checksum u16, timecode i64 with i64::MIN = unknown)
//! ```

use super::{FrameIndex, IndexEntry};
use crate::cache::write_atomic;
use crate::source::StreamInfo;
use crate::{Error, Result};
use bytes::{Buf, BufMut, BytesMut};
use std::fs;
use std::io;
use std::path::Path;
use tracing::debug;

/// File magic.
pub const MAGIC: &[u8; 4] = b"FSIX";

/// Current format version.
pub const FORMAT_VERSION: u16 = 1;

/// Encoded size of one entry row.
pub const ROW_SIZE: usize = 24;

const UNKNOWN_TIMECODE: i64 = i64::MIN;

impl FrameIndex {
    /// Serialize the index.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let decoder = self.decoder.as_bytes();
        let decoder_len = u16::try_from(decoder.len())
            .map_err(|_| Error::invalid_input("decoder name longer than 65535 bytes"))?;
        let mut buf =
            BytesMut::with_capacity(4 + 2 + 4 + 2 + decoder.len() + 12 + self.len() * ROW_SIZE);
        buf.put_slice(MAGIC);
        buf.put_u16_le(FORMAT_VERSION);
        buf.put_u32_le(self.track);
        buf.put_u16_le(decoder_len);
        buf.put_slice(decoder);
        buf.put_i32_le(to_i32(self.step_size, "step size")?);
        buf.put_i32_le(to_i32(self.total_frames, "total frames")?);
        buf.put_u32_le(self.len() as u32);
        for entry in &self.entries {
            buf.put_i32_le(to_i32(entry.seek_nr, "frame number")?);
            buf.put_i64_le(entry.byte_offset);
            buf.put_u16_le(entry.frame_length);
            buf.put_u16_le(entry.checksum);
            buf.put_i64_le(entry.timecode.unwrap_or(UNKNOWN_TIMECODE));
        }
        Ok(buf.to_vec())
    }

    /// Parse an index file's contents. `path` is only used in errors.
    pub fn decode(path: &Path, data: &[u8]) -> Result<Self> {
        let corrupt = |reason: &str| Error::corrupt_index(path, reason);
        let mut buf = data;

        if buf.remaining() < 4 + 2 + 4 + 2 {
            return Err(corrupt("truncated header"));
        }
        if &buf[..4] != MAGIC {
            return Err(corrupt("bad magic"));
        }
        buf.advance(4);
        let version = buf.get_u16_le();
        if version != FORMAT_VERSION {
            return Err(corrupt(&format!("unsupported version {version}")));
        }
        let track = buf.get_u32_le();
        let decoder_len = buf.get_u16_le() as usize;
        if buf.remaining() < decoder_len + 12 {
            return Err(corrupt("truncated header"));
        }
        let decoder = std::str::from_utf8(&buf[..decoder_len])
            .map_err(|_| corrupt("decoder name is not UTF-8"))?
            .to_string();
        buf.advance(decoder_len);
        let step_size = buf.get_i32_le();
        let total_frames = buf.get_i32_le();
        let count = buf.get_u32_le() as usize;
        if step_size < 0 || total_frames < 0 {
            return Err(corrupt("negative header field"));
        }
        if count.checked_mul(ROW_SIZE) != Some(buf.remaining()) {
            return Err(corrupt(&format!(
                "expected {count} rows, found {} trailing bytes",
                buf.remaining()
            )));
        }

        let mut index = FrameIndex::new(path, track, decoder);
        index.entries.reserve_exact(count);
        let mut previous = 0i64;
        for row in 0..count {
            let seek_nr = buf.get_i32_le() as i64;
            if seek_nr <= previous {
                return Err(corrupt(&format!("row {row} is out of order")));
            }
            previous = seek_nr;
            let byte_offset = buf.get_i64_le();
            let frame_length = buf.get_u16_le();
            let checksum = buf.get_u16_le();
            let timecode = match buf.get_i64_le() {
                UNKNOWN_TIMECODE => None,
                tc => Some(tc),
            };
            index.entries.push(IndexEntry {
                seek_nr: seek_nr as u32,
                byte_offset,
                frame_length,
                checksum,
                timecode,
            });
        }
        index.set_layout(step_size as u32, total_frames as u32);
        Ok(index)
    }

    /// Write the index to `path`, replacing any previous file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let data = self.encode()?;
        write_atomic(path, &data)?;
        debug!(path = %path.display(), entries = self.len(), "saved frame index");
        Ok(())
    }

    /// Load the index stored at `path` for `info`'s stream.
    ///
    /// Returns `Ok(None)` when there is no file or the file belongs to a
    /// different track or decoder.
    pub fn load(path: &Path, info: &StreamInfo) -> Result<Option<Self>> {
        let data = match fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut index = Self::decode(path, &data)?;
        if !index.matches_stream(info) {
            debug!(
                path = %path.display(),
                track = index.track,
                decoder = %index.decoder,
                "frame index signature mismatch"
            );
            return Ok(None);
        }
        index.set_path(&info.path);
        Ok(Some(index))
    }
}

fn to_i32(value: u32, what: &str) -> Result<i32> {
    i32::try_from(value).map_err(|_| Error::invalid_input(format!("{what} {value} exceeds i32")))
}
