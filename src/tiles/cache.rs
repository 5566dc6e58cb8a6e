use super::source::TileSource;
use crate::core::config::CacheConfig;
use crate::core::geo::TileCoord;
use crate::{MapError, Result};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

/// A tile persisted on disk
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub coord: TileCoord,
    pub path: PathBuf,
    pub written_at: SystemTime,
}

impl CacheEntry {
    /// Time since the last write; a timestamp in the future counts as fresh
    pub fn age(&self, now: SystemTime) -> Duration {
        now.duration_since(self.written_at).unwrap_or(Duration::ZERO)
    }

    pub fn is_stale(&self, ttl: Duration, now: SystemTime) -> bool {
        self.age(now) > ttl
    }
}

#[derive(Debug, Clone)]
struct MemoryEntry {
    bytes: Arc<Vec<u8>>,
    written_at: SystemTime,
}

/// Disk-backed tile store with a time-to-live staleness rule.
///
/// Files live at `<root>/<source cache path>`, i.e.
/// `<root>/<cache name>/<zoom>/<x>.<y>.png`. A file older than the TTL is
/// reported absent so the caller refetches and overwrites it; nothing is ever
/// deleted proactively. An optional LRU tier keeps recent bytes in memory.
pub struct TileCacheStore {
    root: PathBuf,
    ttl: Duration,
    source: Arc<dyn TileSource>,
    memory: Option<Mutex<LruCache<TileCoord, MemoryEntry>>>,
    writes: AtomicU64,
}

impl TileCacheStore {
    pub fn new(config: &CacheConfig, source: Arc<dyn TileSource>) -> Self {
        let memory = NonZeroUsize::new(config.memory_capacity)
            .map(|capacity| Mutex::new(LruCache::new(capacity)));
        Self {
            root: config.root.clone(),
            ttl: config.ttl(),
            source,
            memory,
            writes: AtomicU64::new(0),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Absolute path of the cached copy of `coord`
    pub fn path_for(&self, coord: TileCoord) -> PathBuf {
        self.root.join(self.source.cache_path(coord))
    }

    /// Looks up the on-disk entry regardless of its age
    pub async fn entry(&self, coord: TileCoord) -> Option<CacheEntry> {
        let path = self.path_for(coord);
        let metadata = tokio::fs::metadata(&path).await.ok()?;
        if !metadata.is_file() {
            return None;
        }
        let written_at = metadata.modified().ok()?;
        Some(CacheEntry {
            coord,
            path,
            written_at,
        })
    }

    /// Returns the cached bytes if present and younger than the TTL
    pub async fn try_read(&self, coord: TileCoord) -> Option<Vec<u8>> {
        let now = SystemTime::now();

        if let Some(hit) = self.memory_get(coord, now) {
            log::debug!("tile {} served from memory", coord);
            return Some(hit.to_vec());
        }

        let entry = self.entry(coord).await?;
        if entry.is_stale(self.ttl, now) {
            log::debug!(
                "tile {} is stale ({}s old), treating as absent",
                coord,
                entry.age(now).as_secs()
            );
            return None;
        }

        match tokio::fs::read(&entry.path).await {
            Ok(bytes) => {
                log::debug!("tile {} served from {}", coord, entry.path.display());
                self.memory_put(coord, Arc::new(bytes.clone()), entry.written_at);
                Some(bytes)
            }
            Err(e) => {
                log::warn!("failed to read cached tile {}: {}", entry.path.display(), e);
                None
            }
        }
    }

    /// Persists `bytes`, creating missing directories.
    ///
    /// The file is written under a temporary name unique to this write and
    /// renamed into place, so readers never see a partial tile and concurrent
    /// writers of one key do not share a temporary file.
    pub async fn write(&self, coord: TileCoord, bytes: &[u8]) -> Result<()> {
        let path = self.path_for(coord);
        let write_err = |source: std::io::Error| MapError::CacheWrite {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }
        let seq = self.writes.fetch_add(1, Ordering::Relaxed);
        let partial = path.with_extension(format!("png.{}.part", seq));
        tokio::fs::write(&partial, bytes).await.map_err(write_err)?;
        if let Err(e) = tokio::fs::rename(&partial, &path).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(write_err(e));
        }

        self.memory_put(coord, Arc::new(bytes.to_vec()), SystemTime::now());
        log::debug!("tile {} written to {}", coord, path.display());
        Ok(())
    }

    /// Drops the in-memory copy of `coord`, e.g. after it failed to decode
    pub fn forget(&self, coord: TileCoord) {
        if let Some(memory) = &self.memory {
            if let Ok(mut memory) = memory.lock() {
                memory.pop(&coord);
            }
        }
    }

    /// Number of tiles held by the memory tier
    pub fn memory_len(&self) -> usize {
        self.memory
            .as_ref()
            .and_then(|memory| memory.lock().ok().map(|memory| memory.len()))
            .unwrap_or(0)
    }

    fn memory_get(&self, coord: TileCoord, now: SystemTime) -> Option<Arc<Vec<u8>>> {
        let mut memory = self.memory.as_ref()?.lock().ok()?;
        let entry = memory.get(&coord)?.clone();
        let age = now.duration_since(entry.written_at).unwrap_or(Duration::ZERO);
        if age > self.ttl {
            memory.pop(&coord);
            return None;
        }
        Some(entry.bytes)
    }

    fn memory_put(&self, coord: TileCoord, bytes: Arc<Vec<u8>>, written_at: SystemTime) {
        if let Some(memory) = &self.memory {
            if let Ok(mut memory) = memory.lock() {
                memory.put(coord, MemoryEntry { bytes, written_at });
            }
        }
    }
}
