//! Per-video frame index with an on-disk cache.
//!
//! Reading fps/frame_count (and, for VFR sources, every frame's PTS) means
//! opening the video through the decode collaborator, which is slow. The
//! result is kept in memory and persisted as one JSON artifact per video
//! under the cache directory. An artifact is trusted only while the video
//! path and modification time still match; anything else (missing file,
//! stale mtime, garbage JSON) silently triggers a rebuild.
//!
//! Builds for the same path serialize on a per-path lock so concurrent
//! jobs on one video open it once. Different videos never contend.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::reader::VideoDecoder;
use super::timebase::Timebase;
use crate::error::{SyncError, TimelineResult};

/// Bumped whenever the artifact layout changes.
const INDEX_FORMAT_VERSION: u32 = 1;

/// Modification time as stored in the artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ModTime {
    pub secs: u64,
    pub nanos: u32,
}

impl ModTime {
    fn of(path: &Path) -> std::io::Result<Self> {
        let modified = fs::metadata(path)?.modified()?;
        let since = modified.duration_since(UNIX_EPOCH).unwrap_or_default();
        Ok(Self {
            secs: since.as_secs(),
            nanos: since.subsec_nanos(),
        })
    }
}

/// Where an index came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexSource {
    /// Freshly built through the decoder.
    #[default]
    Built,
    /// Loaded from a persisted artifact.
    Disk,
}

/// Cached timing facts for one video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameIndex {
    pub format_version: u32,
    pub video_path: PathBuf,
    pub mtime: ModTime,
    pub fps: f64,
    pub frame_count: u32,
    /// Frame start times, present only for VFR sources.
    #[serde(default)]
    pub timestamps_ms: Option<Vec<f64>>,
    #[serde(skip)]
    pub source: IndexSource,
}

impl FrameIndex {
    /// Converter for this video.
    pub fn timebase(&self) -> TimelineResult<Timebase> {
        let timebase = match &self.timestamps_ms {
            Some(ts) => Timebase::vfr(ts.clone()),
            None => Timebase::cfr(self.fps, self.frame_count),
        };
        timebase.map_err(|e| SyncError::index_build(&self.video_path, e.to_string()))
    }

    fn matches(&self, path: &Path, mtime: ModTime) -> bool {
        self.format_version == INDEX_FORMAT_VERSION && self.video_path == path && self.mtime == mtime
    }
}

/// Shared frame index cache.
pub struct FrameIndexCache {
    cache_dir: PathBuf,
    decoder: Arc<dyn VideoDecoder>,
    entries: DashMap<PathBuf, Arc<FrameIndex>>,
    build_locks: DashMap<PathBuf, Arc<Mutex<()>>>,
}

impl FrameIndexCache {
    pub fn new(cache_dir: impl Into<PathBuf>, decoder: Arc<dyn VideoDecoder>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            decoder,
            entries: DashMap::new(),
            build_locks: DashMap::new(),
        }
    }

    /// Artifact location for a video.
    pub fn artifact_path(&self, video: &Path) -> PathBuf {
        let digest = Sha256::digest(video.to_string_lossy().as_bytes());
        self.cache_dir.join(format!("{digest:x}.json"))
    }

    /// Index for `video`, building it if needed.
    pub fn get(&self, video: &Path) -> TimelineResult<Arc<FrameIndex>> {
        let key = fs::canonicalize(video).unwrap_or_else(|_| video.to_path_buf());
        let mtime = ModTime::of(&key)
            .map_err(|e| SyncError::index_build(&key, format!("cannot stat video: {e}")))?;

        if let Some(index) = self.cached(&key, mtime) {
            return Ok(index);
        }

        // Clone the lock out so the map shard is not held while building.
        let lock = self
            .build_locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let result = {
            let _guard = lock.lock();
            self.load_or_build(&key, mtime)
        };

        // Last one out removes the lock; waiters still hold a clone.
        drop(lock);
        self.build_locks.remove_if(&key, |_, lock| Arc::strong_count(lock) == 1);
        result
    }

    /// Converter for `video`.
    pub fn timebase(&self, video: &Path) -> TimelineResult<Timebase> {
        self.get(video)?.timebase()
    }

    /// Forget the in-memory entry; the next `get` revalidates against disk.
    pub fn invalidate(&self, video: &Path) {
        let key = fs::canonicalize(video).unwrap_or_else(|_| video.to_path_buf());
        self.entries.remove(&key);
    }

    /// Caller holds the build lock for `key`.
    fn load_or_build(&self, key: &Path, mtime: ModTime) -> TimelineResult<Arc<FrameIndex>> {
        // Another caller may have finished the build while we waited.
        if let Some(index) = self.cached(key, mtime) {
            return Ok(index);
        }

        let index = match self.load_artifact(key, mtime) {
            Some(index) => index,
            None => {
                let index = self.build(key, mtime)?;
                self.persist(&index);
                index
            }
        };

        let index = Arc::new(index);
        self.entries.insert(key.to_path_buf(), Arc::clone(&index));
        Ok(index)
    }

    fn cached(&self, key: &Path, mtime: ModTime) -> Option<Arc<FrameIndex>> {
        let entry = self.entries.get(key)?;
        if entry.mtime == mtime {
            Some(Arc::clone(entry.value()))
        } else {
            tracing::debug!("[FrameIndex] {} changed on disk, dropping cached index", key.display());
            None
        }
    }

    fn load_artifact(&self, key: &Path, mtime: ModTime) -> Option<FrameIndex> {
        let artifact = self.artifact_path(key);
        let content = match fs::read_to_string(&artifact) {
            Ok(content) => content,
            Err(_) => return None,
        };

        match serde_json::from_str::<FrameIndex>(&content) {
            Ok(mut index) if index.matches(key, mtime) => {
                index.source = IndexSource::Disk;
                tracing::debug!(
                    "[FrameIndex] Loaded {} from {}",
                    key.display(),
                    artifact.display()
                );
                Some(index)
            }
            Ok(_) => {
                tracing::info!("[FrameIndex] Stale index for {}, rebuilding", key.display());
                None
            }
            Err(e) => {
                tracing::warn!(
                    "[FrameIndex] Corrupt index artifact {} ({}), rebuilding",
                    artifact.display(),
                    e
                );
                None
            }
        }
    }

    fn build(&self, key: &Path, mtime: ModTime) -> TimelineResult<FrameIndex> {
        tracing::info!("[FrameIndex] Indexing {}", key.display());

        let reader = self
            .decoder
            .open(key)
            .map_err(|e| SyncError::index_build(key, e.to_string()))?;

        let fps = reader.fps();
        let frame_count = reader.frame_count();
        let timestamps_ms = if reader.is_vfr() {
            let pts = (0..frame_count)
                .map(|i| reader.get_pts(i))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| SyncError::index_build(key, e.to_string()))?;
            Some(pts)
        } else {
            None
        };
        let backend = reader.backend_name().to_string();
        drop(reader);

        let index = FrameIndex {
            format_version: INDEX_FORMAT_VERSION,
            video_path: key.to_path_buf(),
            mtime,
            fps,
            frame_count,
            timestamps_ms,
            source: IndexSource::Built,
        };
        // Reject values the converter cannot use before they reach the cache.
        index.timebase()?;

        tracing::info!(
            "[FrameIndex] {}: {:.3} fps, {} frames{} via {}",
            key.display(),
            fps,
            frame_count,
            if index.timestamps_ms.is_some() { " (VFR)" } else { "" },
            backend
        );
        Ok(index)
    }

    fn persist(&self, index: &FrameIndex) {
        let artifact = self.artifact_path(&index.video_path);
        let result = fs::create_dir_all(&self.cache_dir)
            .and_then(|_| {
                let json = serde_json::to_string(index)
                    .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
                let tmp = artifact.with_extension("json.tmp");
                fs::write(&tmp, json)?;
                fs::rename(&tmp, &artifact)
            });

        if let Err(e) = result {
            tracing::warn!(
                "[FrameIndex] Could not persist index to {}: {}",
                artifact.display(),
                e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeDecoder, FakeVideo};
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn video_file(dir: &TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, b"not really a video").unwrap();
        path
    }

    #[test]
    fn builds_then_reuses_memory_entry() {
        let dir = TempDir::new().unwrap();
        let video = video_file(&dir, "a.mkv");
        let decoder = Arc::new(FakeDecoder::new(FakeVideo::cfr(23.976, 1000)));
        let cache = FrameIndexCache::new(dir.path().join("index"), decoder.clone());

        let first = cache.get(&video).unwrap();
        let second = cache.get(&video).unwrap();

        assert_eq!(first.frame_count, 1000);
        assert_eq!(first.source, IndexSource::Built);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(decoder.open_count(), 1);
        assert!(cache.artifact_path(&first.video_path).exists());
    }

    #[test]
    fn new_cache_loads_persisted_artifact() {
        let dir = TempDir::new().unwrap();
        let video = video_file(&dir, "a.mkv");
        let decoder = Arc::new(FakeDecoder::new(FakeVideo::cfr(25.0, 250)));

        FrameIndexCache::new(dir.path().join("index"), decoder.clone())
            .get(&video)
            .unwrap();
        let reloaded = FrameIndexCache::new(dir.path().join("index"), decoder.clone())
            .get(&video)
            .unwrap();

        assert_eq!(reloaded.source, IndexSource::Disk);
        assert_eq!(reloaded.fps, 25.0);
        assert_eq!(decoder.open_count(), 1);
    }

    #[test]
    fn mtime_change_invalidates() {
        let dir = TempDir::new().unwrap();
        let video = video_file(&dir, "a.mkv");
        let decoder = Arc::new(FakeDecoder::new(FakeVideo::cfr(25.0, 250)));
        let cache = FrameIndexCache::new(dir.path().join("index"), decoder.clone());

        cache.get(&video).unwrap();

        let file = fs::OpenOptions::new().write(true).open(&video).unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(3600))
            .unwrap();
        drop(file);

        let rebuilt = cache.get(&video).unwrap();
        assert_eq!(rebuilt.source, IndexSource::Built);
        assert_eq!(decoder.open_count(), 2);
    }

    #[test]
    fn corrupt_artifact_triggers_rebuild() {
        let dir = TempDir::new().unwrap();
        let video = video_file(&dir, "a.mkv");
        let decoder = Arc::new(FakeDecoder::new(FakeVideo::cfr(25.0, 250)));
        let cache = FrameIndexCache::new(dir.path().join("index"), decoder.clone());

        let key = fs::canonicalize(&video).unwrap();
        fs::create_dir_all(dir.path().join("index")).unwrap();
        fs::write(cache.artifact_path(&key), "{ definitely not json").unwrap();

        let index = cache.get(&video).unwrap();
        assert_eq!(index.source, IndexSource::Built);
        assert_eq!(index.frame_count, 250);
    }

    #[test]
    fn vfr_source_stores_timestamp_table() {
        let dir = TempDir::new().unwrap();
        let video = video_file(&dir, "vfr.mkv");
        let pts = vec![0.0, 41.7, 83.4, 116.7, 150.0];
        let decoder = Arc::new(FakeDecoder::new(FakeVideo::vfr(pts.clone())));
        let cache = FrameIndexCache::new(dir.path().join("index"), decoder);

        let timebase = cache.timebase(&video).unwrap();
        assert!(timebase.is_vfr());
        assert_eq!(timebase.frame_count(), 5);
        assert_eq!(
            timebase.frame_to_ms(3, crate::models::RoundingPolicy::Floor),
            116.7
        );
    }

    #[test]
    fn decoder_failure_is_index_build_failure() {
        let dir = TempDir::new().unwrap();
        let video = video_file(&dir, "broken.mkv");
        let decoder = Arc::new(FakeDecoder::failing());
        let cache = FrameIndexCache::new(dir.path().join("index"), decoder);

        let err = cache.get(&video).unwrap_err();
        assert!(matches!(err, SyncError::IndexBuildFailure { .. }));
    }

    #[test]
    fn missing_video_is_index_build_failure() {
        let dir = TempDir::new().unwrap();
        let decoder = Arc::new(FakeDecoder::new(FakeVideo::cfr(25.0, 10)));
        let cache = FrameIndexCache::new(dir.path().join("index"), decoder.clone());

        let err = cache.get(&dir.path().join("nope.mkv")).unwrap_err();
        assert!(matches!(err, SyncError::IndexBuildFailure { .. }));
        assert_eq!(decoder.open_count(), 0);
    }

    #[test]
    fn concurrent_callers_build_once() {
        let dir = TempDir::new().unwrap();
        let video = video_file(&dir, "shared.mkv");
        let decoder = Arc::new(
            FakeDecoder::new(FakeVideo::cfr(24.0, 100)).with_open_delay(Duration::from_millis(50)),
        );
        let cache = FrameIndexCache::new(dir.path().join("index"), decoder.clone());

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    let index = cache.get(&video).unwrap();
                    assert_eq!(index.frame_count, 100);
                });
            }
        });

        assert_eq!(decoder.open_count(), 1);
        assert!(cache.build_locks.is_empty());
    }

    #[test]
    fn build_locks_do_not_accumulate() {
        let dir = TempDir::new().unwrap();
        let decoder = Arc::new(FakeDecoder::new(FakeVideo::cfr(25.0, 10)));
        let cache = FrameIndexCache::new(dir.path().join("index"), decoder);

        for i in 0..5 {
            let video = video_file(&dir, &format!("ep{i}.mkv"));
            cache.get(&video).unwrap();
        }
        let _ = cache.get(&dir.path().join("missing.mkv"));

        assert_eq!(cache.entries.len(), 5);
        assert!(cache.build_locks.is_empty());
    }

    #[test]
    fn invalidate_forces_disk_revalidation() {
        let dir = TempDir::new().unwrap();
        let video = video_file(&dir, "a.mkv");
        let decoder = Arc::new(FakeDecoder::new(FakeVideo::cfr(25.0, 250)));
        let cache = FrameIndexCache::new(dir.path().join("index"), decoder.clone());

        cache.get(&video).unwrap();
        cache.invalidate(&video);
        let again = cache.get(&video).unwrap();

        assert_eq!(again.source, IndexSource::Disk);
        assert_eq!(decoder.open_count(), 1);
    }
}
