//! The engine façade: opens streams and runs the public operations on them.

use crate::cache::{cache_path, INDEX_EXTENSION};
use crate::config::{CacheConfig, SeekConfig};
use crate::handle::StreamHandle;
use crate::index::{self, FrameIndex, ScanOutcome};
use crate::outcome::{Completion, Progress, Reliability, SeekOutcome};
use crate::reliability::{self, ReliabilityRecord, ReliabilityStore};
use crate::seek;
use crate::source::FrameSource;
use crate::total::FrameCount;
use crate::Result;
use tracing::{debug, info, warn};

/// Frame-accurate seeking over [`FrameSource`]s.
///
/// The engine owns the configuration and the reliability store shared by
/// every stream it opens; per-stream state lives in [`StreamHandle`].
#[derive(Debug)]
pub struct SeekEngine {
    config: SeekConfig,
    store: ReliabilityStore,
}

impl SeekEngine {
    pub fn new(config: SeekConfig, cache: CacheConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            store: ReliabilityStore::new(cache),
        })
    }

    pub fn config(&self) -> &SeekConfig {
        &self.config
    }

    pub fn store(&self) -> &ReliabilityStore {
        &self.store
    }

    /// Open a stream, loading any persisted index and current verdict.
    ///
    /// Unusable cache files are logged and ignored.
    pub fn open<S: FrameSource>(&mut self, source: S) -> Result<StreamHandle<S>> {
        let mut handle = StreamHandle::new(source);
        let info = handle.info().clone();
        let cache = self.store.cache_config();

        if cache.persist {
            let path = cache_path(cache, &info, INDEX_EXTENSION);
            match FrameIndex::load(&path, &info) {
                Ok(Some(index)) => {
                    debug!(path = %path.display(), entries = index.len(), "loaded frame index");
                    handle.set_index(index);
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "discarding frame index"),
            }
        }
        if let Some(record) = self.store.lookup(&info) {
            handle.install_record(record, &self.config);
        }
        Ok(handle)
    }

    /// Decide whether native seeking is trusted, unless already decided.
    pub fn analyze<S: FrameSource>(
        &mut self,
        handle: &mut StreamHandle<S>,
    ) -> Result<Completion<ReliabilityRecord>> {
        if let Some(record) = handle.record() {
            return Ok(Completion::Done(record.clone()));
        }
        let outcome = reliability::analyze(handle, &self.config, &mut self.store)?;
        if outcome == Completion::Cancelled {
            handle.take_cancellation();
        }
        Ok(outcome)
    }

    /// Position `handle` so its next [`StreamHandle::read_frame`] returns
    /// frame `target` (1-based).
    ///
    /// Analyzes the stream first if that has not happened yet.
    pub fn seek<S: FrameSource>(
        &mut self,
        handle: &mut StreamHandle<S>,
        target: u32,
    ) -> Result<SeekOutcome> {
        if !handle.is_analyzed() && self.analyze(handle)? == Completion::Cancelled {
            return Ok(SeekOutcome::Cancelled);
        }
        let outcome = seek::seek(handle, target, &self.config);
        self.persist_record(handle);
        outcome
    }

    /// Scan the whole stream, install the resulting index and persist it.
    ///
    /// A cancelled scan still installs and persists the partial index,
    /// marked incomplete.
    pub fn build_index<S: FrameSource>(
        &mut self,
        handle: &mut StreamHandle<S>,
        mut progress: impl FnMut(Progress),
    ) -> Result<Completion<()>> {
        let ScanOutcome {
            index,
            frames,
            eof_timecode,
            completed,
        } = index::scan(handle, &self.config, &mut progress)?;
        info!(
            path = %handle.info().path.display(),
            entries = index.len(),
            frames,
            completed,
            "built frame index"
        );

        let cache = self.store.cache_config();
        if cache.persist {
            let path = cache_path(cache, handle.info(), INDEX_EXTENSION);
            if let Err(e) = index.save(&path) {
                warn!(error = %e, "failed to persist frame index");
            }
        }
        handle.set_index(index);

        if !completed {
            handle.take_cancellation();
            handle.invalidate_position();
            return Ok(Completion::Cancelled);
        }
        if let Some(record) = handle.record_mut() {
            record.total_frames = frames;
            record.all_frames_counted = true;
            if eof_timecode.is_some() {
                record.eof_timecode = eof_timecode;
            }
            handle.mark_record_dirty();
        }
        self.persist_record(handle);
        Ok(Completion::Done(()))
    }

    /// The cheapest exact strategy currently available for `handle`.
    pub fn reliability<S: FrameSource>(&self, handle: &StreamHandle<S>) -> Reliability {
        if handle.native_enabled() && handle.is_analyzed() {
            Reliability::Native
        } else if handle.index().is_some_and(|i| !i.is_empty()) {
            Reliability::IndexOnly
        } else {
            Reliability::SequentialOnly
        }
    }

    /// Frame count of the stream.
    ///
    /// Exact when a complete index exists or native probing found it,
    /// otherwise an estimate.
    pub fn detect_total_frames<S: FrameSource>(
        &mut self,
        handle: &mut StreamHandle<S>,
    ) -> Result<Completion<FrameCount>> {
        if let Some(frames) = handle.known_total() {
            let eof_timecode = handle.record().and_then(|r| r.eof_timecode);
            return Ok(Completion::Done(FrameCount::Counted {
                frames,
                eof_timecode,
            }));
        }
        let record = match self.analyze(handle)? {
            Completion::Done(record) => record,
            Completion::Cancelled => return Ok(Completion::Cancelled),
        };
        let count = if record.native_seek_reliable && record.total_frames > 0 {
            FrameCount::Counted {
                frames: record.total_frames,
                eof_timecode: record.eof_timecode,
            }
        } else {
            FrameCount::Estimated(record.total_frames)
        };
        Ok(Completion::Done(count))
    }

    fn persist_record<S: FrameSource>(&mut self, handle: &mut StreamHandle<S>) {
        if !handle.take_record_dirty() {
            return;
        }
        if let Some(record) = handle.record() {
            if let Err(e) = self.store.save(handle.info(), record) {
                warn!(error = %e, "failed to persist reliability record");
            }
        }
    }
}
