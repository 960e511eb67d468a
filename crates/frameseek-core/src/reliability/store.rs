//! In-memory and file-backed reliability records.

use super::ReliabilityRecord;
use crate::cache::{cache_path, file_mtime, RECORD_EXTENSION};
use crate::config::CacheConfig;
use crate::source::StreamInfo;
use crate::Result;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Identity of a stream version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey {
    pub path: PathBuf,
    pub mtime: i64,
    pub track: u32,
    pub decoder: String,
}

impl RecordKey {
    fn new(info: &StreamInfo, mtime: i64) -> Self {
        Self {
            path: info.path.clone(),
            mtime,
            track: info.track,
            decoder: info.decoder.clone(),
        }
    }
}

/// Records keyed by stream version, backed by cache files.
#[derive(Debug, Default)]
pub struct ReliabilityStore {
    cache: CacheConfig,
    records: HashMap<RecordKey, ReliabilityRecord>,
}

impl ReliabilityStore {
    pub fn new(cache: CacheConfig) -> Self {
        Self {
            cache,
            records: HashMap::new(),
        }
    }

    pub fn cache_config(&self) -> &CacheConfig {
        &self.cache
    }

    /// Where the record of `info`'s stream is persisted.
    pub fn record_path(&self, info: &StreamInfo) -> PathBuf {
        cache_path(&self.cache, info, RECORD_EXTENSION)
    }

    /// Records held in memory.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The current record for a stream, if one exists.
    ///
    /// Stale or unreadable files are ignored. Streams whose file cannot be
    /// stat'ed are keyed by mtime 0 and only found in memory.
    pub fn lookup(&mut self, info: &StreamInfo) -> Option<ReliabilityRecord> {
        let on_disk = file_mtime(&info.path).ok();
        let key = RecordKey::new(info, on_disk.unwrap_or(0));
        if let Some(record) = self.records.get(&key) {
            if record.decoder_version == info.decoder_version {
                return Some(record.clone());
            }
        }
        let mtime = on_disk?;
        if !self.cache.persist {
            return None;
        }

        let path = self.record_path(info);
        match ReliabilityRecord::load(&path) {
            Ok(Some(record)) if record.is_current(mtime, &info.decoder_version) => {
                debug!(path = %path.display(), "loaded reliability record");
                self.records.insert(key, record.clone());
                Some(record)
            }
            Ok(Some(record)) => {
                debug!(
                    path = %path.display(),
                    recorded = record.source_mtime,
                    current = mtime,
                    "reliability record is stale"
                );
                None
            }
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "discarding unreadable reliability record");
                None
            }
        }
    }

    /// Remember a record and persist it when enabled.
    ///
    /// Records of streams without a file on disk stay in memory only.
    pub fn save(&mut self, info: &StreamInfo, record: &ReliabilityRecord) -> Result<()> {
        self.records
            .insert(RecordKey::new(info, record.source_mtime), record.clone());
        if !self.cache.persist {
            return Ok(());
        }
        if file_mtime(&info.path).is_err() {
            debug!(path = %info.path.display(), "source not on disk, record kept in memory");
            return Ok(());
        }
        let path = self.record_path(info);
        record.save(&path)?;
        debug!(path = %path.display(), "saved reliability record");
        Ok(())
    }
}
