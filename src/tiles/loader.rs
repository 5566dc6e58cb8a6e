use super::cache::TileCacheStore;
use super::context::TileLoadingContext;
use super::dispatcher::DownloadDispatcher;
use super::fetch::{HttpFetcher, TileFetcher};
use super::source::TileSource;
use crate::core::config::MapViewConfig;
use crate::core::geo::TileCoord;
use crate::runtime::SharedSpawner;
use crate::Result;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// The injected dispatcher + cache pair every loading context works against.
///
/// Cloning is cheap; all clones share the same dispatcher slots and cache.
#[derive(Clone)]
pub struct TileLoader {
    inner: Arc<LoaderInner>,
}

struct LoaderInner {
    source: Arc<dyn TileSource>,
    cache: Arc<TileCacheStore>,
    dispatcher: Arc<DownloadDispatcher>,
    spawner: SharedSpawner,
    next_context: AtomicU64,
}

impl TileLoader {
    pub fn new(
        source: Arc<dyn TileSource>,
        cache: Arc<TileCacheStore>,
        dispatcher: Arc<DownloadDispatcher>,
        spawner: SharedSpawner,
    ) -> Self {
        Self {
            inner: Arc::new(LoaderInner {
                source,
                cache,
                dispatcher,
                spawner,
                next_context: AtomicU64::new(1),
            }),
        }
    }

    /// Builds the cache store and dispatcher described by `config`
    pub fn from_config(
        config: &MapViewConfig,
        source: Arc<dyn TileSource>,
        fetcher: Arc<dyn TileFetcher>,
        spawner: SharedSpawner,
    ) -> Self {
        let cache = Arc::new(TileCacheStore::new(&config.cache, source.clone()));
        let dispatcher = Arc::new(DownloadDispatcher::new(
            &config.dispatcher,
            fetcher,
            spawner.as_ref(),
        ));
        Self::new(source, cache, dispatcher, spawner)
    }

    /// Same as [`TileLoader::from_config`] with the reqwest-backed fetcher
    pub fn with_http(
        config: &MapViewConfig,
        source: Arc<dyn TileSource>,
        spawner: SharedSpawner,
    ) -> Result<Self> {
        let fetcher = Arc::new(HttpFetcher::new(&config.fetch)?);
        Ok(Self::from_config(config, source, fetcher, spawner))
    }

    /// Creates an idle loading context for `coord`
    pub fn context(&self, coord: TileCoord) -> TileLoadingContext {
        let id = self.inner.next_context.fetch_add(1, Ordering::Relaxed);
        TileLoadingContext::new(id, coord, self.clone())
    }

    pub fn source(&self) -> &Arc<dyn TileSource> {
        &self.inner.source
    }

    pub fn cache(&self) -> &Arc<TileCacheStore> {
        &self.inner.cache
    }

    pub fn dispatcher(&self) -> &Arc<DownloadDispatcher> {
        &self.inner.dispatcher
    }

    pub fn spawner(&self) -> &SharedSpawner {
        &self.inner.spawner
    }
}
