//! The persisted reliability verdict of one stream.

use crate::cache::write_atomic;
use crate::timecode::TimecodeProfile;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

/// What the analyzer learned about a stream.
///
/// Valid only while the source file's modification time equals
/// `source_mtime` and the decoder library is unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReliabilityRecord {
    pub decoder_version: String,
    pub total_frames: u32,
    /// Whether `total_frames` came from decoding every frame.
    pub all_frames_counted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eof_timecode: Option<i64>,
    pub native_seek_reliable: bool,
    pub seek_pre_roll_size: u32,
    /// Nanoseconds since the Unix epoch.
    pub source_mtime: i64,
    #[serde(default)]
    pub native_failures: u32,
    pub profile: TimecodeProfile,
}

impl ReliabilityRecord {
    /// A fresh, distrustful record for a calibrated stream.
    pub fn new(decoder_version: impl Into<String>, source_mtime: i64, profile: TimecodeProfile) -> Self {
        Self {
            decoder_version: decoder_version.into(),
            total_frames: 0,
            all_frames_counted: false,
            eof_timecode: None,
            native_seek_reliable: false,
            seek_pre_roll_size: 0,
            source_mtime,
            native_failures: 0,
            profile,
        }
    }

    /// Whether the record still describes the file and decoder.
    pub fn is_current(&self, source_mtime: i64, decoder_version: &str) -> bool {
        self.source_mtime == source_mtime && self.decoder_version == decoder_version
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string(self)
            .map_err(|e| Error::invalid_input(format!("cannot serialize reliability record: {e}")))
    }

    /// Parse a record. `path` is only used in errors.
    pub fn from_toml(path: &Path, text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::corrupt_record(path, e.to_string()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = self.to_toml()?;
        write_atomic(path, text.as_bytes())?;
        Ok(())
    }

    /// Load the record at `path`; `Ok(None)` when there is none.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        match fs::read_to_string(path) {
            Ok(text) => Self::from_toml(path, &text).map(Some),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
