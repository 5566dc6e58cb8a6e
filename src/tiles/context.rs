//! Per-tile acquisition state machine
//!
//! ```text
//! Idle -> Requested -> CacheHit -> Ready
//!                   -> Dispatching -> Downloading -> Persisting -> Ready
//! any non-terminal state -> Failed | Aborted
//! ```
//!
//! `Ready`, `Failed` and `Aborted` are terminal. Errors never leave the
//! context; they are reported once through the [`LoadOutcome`].

use super::image::TileImage;
use super::loader::TileLoader;
use crate::core::geo::TileCoord;
use crate::runtime::{self, AsyncHandle};
use crate::{MapError, Result};
use once_cell::sync::OnceCell;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadState {
    Idle,
    Requested,
    CacheHit,
    Dispatching,
    Downloading,
    Persisting,
    Ready,
    Failed,
    Aborted,
}

impl LoadState {
    pub fn is_terminal(self) -> bool {
        matches!(self, LoadState::Ready | LoadState::Failed | LoadState::Aborted)
    }
}

/// Terminal result of one load
#[derive(Debug)]
pub enum LoadOutcome {
    Ready(TileImage),
    Failed(MapError),
    Aborted,
}

impl LoadOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, LoadOutcome::Ready(_))
    }
}

/// Completion message delivered to the owning thread
#[derive(Debug)]
pub struct TileEvent {
    pub coord: TileCoord,
    /// Lets the receiver drop events from contexts it has since replaced
    pub context_id: u64,
    pub outcome: LoadOutcome,
}

/// Handle to one tile acquisition; clones share the same state
#[derive(Clone)]
pub struct TileLoadingContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    id: u64,
    coord: TileCoord,
    loader: TileLoader,
    state: Mutex<LoadState>,
    cancel: CancellationToken,
    image: OnceCell<TileImage>,
    failure: OnceCell<String>,
    finished: Notify,
}

impl std::fmt::Debug for TileLoadingContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileLoadingContext")
            .field("id", &self.inner.id)
            .field("coord", &self.inner.coord)
            .field("state", &self.state())
            .finish()
    }
}

impl TileLoadingContext {
    pub(crate) fn new(id: u64, coord: TileCoord, loader: TileLoader) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                id,
                coord,
                loader,
                state: Mutex::new(LoadState::Idle),
                cancel: CancellationToken::new(),
                image: OnceCell::new(),
                failure: OnceCell::new(),
                finished: Notify::new(),
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn coord(&self) -> TileCoord {
        self.inner.coord
    }

    pub fn state(&self) -> LoadState {
        *self.lock_state()
    }

    pub fn is_ready(&self) -> bool {
        self.inner.image.get().is_some()
    }

    /// The decoded tile, once `Ready`
    pub fn image(&self) -> Option<TileImage> {
        self.inner.image.get().cloned()
    }

    /// Cancels the load from any non-terminal state.
    ///
    /// A queued download is guaranteed never to start; a running one is asked
    /// to stop. Returns false if the context had already finished.
    pub fn abort(&self) -> bool {
        let mut state = self.lock_state();
        if state.is_terminal() {
            return false;
        }
        log::debug!("tile {} aborted while {:?}", self.inner.coord, *state);
        *state = LoadState::Aborted;
        drop(state);
        self.inner.cancel.cancel();
        self.inner.finished.notify_waiters();
        true
    }

    /// Spawns the load and hands its outcome to `on_complete`.
    ///
    /// `on_complete` runs on a runtime worker, not on the caller's thread.
    /// Returns `None` without ever calling `on_complete` when the context was
    /// already started, loaded or aborted.
    pub fn start<F>(&self, on_complete: F) -> Option<Box<dyn AsyncHandle>>
    where
        F: FnOnce(TileEvent) + Send + 'static,
    {
        if !self.transition(LoadState::Idle, LoadState::Requested) {
            log::debug!("tile {} already started, ignoring start", self.inner.coord);
            return None;
        }
        let context = self.clone();
        Some(runtime::spawn(self.inner.loader.spawner().as_ref(), async move {
            let outcome = context.drive().await;
            on_complete(TileEvent {
                coord: context.coord(),
                context_id: context.id(),
                outcome,
            });
        }))
    }

    /// Runs the state machine to a terminal state.
    ///
    /// Only the first call drives the load; later calls wait for that load
    /// and report its terminal state without touching the cache or network.
    pub async fn load(&self) -> LoadOutcome {
        if self.transition(LoadState::Idle, LoadState::Requested) {
            self.drive().await
        } else {
            self.finished().await
        }
    }

    async fn drive(&self) -> LoadOutcome {
        let outcome = self.execute().await;
        self.inner.finished.notify_waiters();
        outcome
    }

    async fn execute(&self) -> LoadOutcome {
        match self.run().await {
            Ok(image) => LoadOutcome::Ready(image),
            Err(e) if e.is_cancelled() => {
                self.settle(LoadState::Aborted);
                LoadOutcome::Aborted
            }
            Err(e) => {
                let _ = self.inner.failure.set(e.to_string());
                if self.settle(LoadState::Failed) {
                    log::warn!("tile {} failed: {}", self.inner.coord, e);
                    LoadOutcome::Failed(e)
                } else {
                    // Aborted concurrently; the abort wins
                    LoadOutcome::Aborted
                }
            }
        }
    }

    async fn run(&self) -> Result<TileImage> {
        let coord = self.inner.coord;
        let loader = &self.inner.loader;
        let cache = loader.cache();

        let cached = tokio::select! {
            biased;
            _ = self.inner.cancel.cancelled() => return Err(MapError::Cancelled),
            bytes = cache.try_read(coord) => bytes,
        };

        if let Some(bytes) = cached {
            match self.decode(bytes).await {
                Ok(image) => {
                    self.advance(LoadState::CacheHit)?;
                    return self.complete(image);
                }
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    log::warn!("cached tile {} is unreadable, refetching: {}", coord, e);
                    cache.forget(coord);
                }
            }
        }

        self.advance(LoadState::Dispatching)?;
        let download = loader
            .dispatcher()
            .submit(loader.source().url(coord), &self.inner.cancel)?;

        let started = tokio::select! {
            biased;
            _ = self.inner.cancel.cancelled() => false,
            started = download.started() => started,
        };
        if started {
            self.advance(LoadState::Downloading)?;
        }
        let bytes = download.wait().await?;

        let image = self.decode(bytes.clone()).await?;

        self.advance(LoadState::Persisting)?;
        if let Err(e) = cache.write(coord, &bytes).await {
            log::warn!("tile {} not persisted: {}", coord, e);
        }

        self.complete(image)
    }

    async fn decode(&self, bytes: Vec<u8>) -> Result<TileImage> {
        let spawner = self.inner.loader.spawner().clone();
        let decoded = tokio::select! {
            biased;
            _ = self.inner.cancel.cancelled() => return Err(MapError::Cancelled),
            decoded = runtime::run_blocking(spawner.as_ref(), move || TileImage::decode(&bytes)) => decoded,
        };
        decoded?
    }

    /// Enters `Ready` unless the context was aborted meanwhile
    fn complete(&self, image: TileImage) -> Result<TileImage> {
        let mut state = self.lock_state();
        if state.is_terminal() {
            return Err(MapError::Cancelled);
        }
        if self.inner.image.set(image.clone()).is_err() {
            return Err(MapError::Runtime(format!(
                "tile {} completed twice",
                self.inner.coord
            )));
        }
        *state = LoadState::Ready;
        log::debug!("tile {} ready", self.inner.coord);
        Ok(image)
    }

    /// Moves to a non-terminal state; a terminal state means the load was aborted
    fn advance(&self, next: LoadState) -> Result<()> {
        let mut state = self.lock_state();
        if state.is_terminal() {
            return Err(MapError::Cancelled);
        }
        log::debug!("tile {}: {:?} -> {:?}", self.inner.coord, *state, next);
        *state = next;
        Ok(())
    }

    fn transition(&self, from: LoadState, to: LoadState) -> bool {
        let mut state = self.lock_state();
        if *state != from {
            return false;
        }
        *state = to;
        true
    }

    /// Enters a terminal state if none was reached yet
    fn settle(&self, terminal: LoadState) -> bool {
        let mut state = self.lock_state();
        if state.is_terminal() {
            return false;
        }
        *state = terminal;
        true
    }

    /// Waits until the driving load reaches a terminal state
    async fn finished(&self) -> LoadOutcome {
        loop {
            let notified = self.inner.finished.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if let Some(outcome) = self.terminal_outcome() {
                return outcome;
            }
            notified.await;
        }
    }

    fn terminal_outcome(&self) -> Option<LoadOutcome> {
        match self.state() {
            LoadState::Ready => self.image().map(LoadOutcome::Ready),
            LoadState::Aborted => Some(LoadOutcome::Aborted),
            LoadState::Failed => {
                let reason = self
                    .inner
                    .failure
                    .get()
                    .map_or("unknown error", String::as_str);
                Some(LoadOutcome::Failed(MapError::Runtime(format!(
                    "tile {} failed: {}",
                    self.inner.coord, reason
                ))))
            }
            _ => None,
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, LoadState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::MapViewConfig;
    use crate::runtime::TokioSpawner;
    use crate::tiles::fetch::TileFetcher;
    use crate::tiles::image::solid_png;
    use crate::tiles::source::TemplateSource;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    struct TestFetcher {
        png: Vec<u8>,
        calls: Mutex<Vec<String>>,
        gate: Notify,
        fail: AtomicBool,
    }

    impl TestFetcher {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                png: solid_png(8, 8, [1, 2, 3, 255]).unwrap(),
                calls: Mutex::new(Vec::new()),
                gate: Notify::new(),
                fail: AtomicBool::new(false),
            })
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TileFetcher for TestFetcher {
        async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
            self.calls.lock().unwrap().push(url.to_string());
            if url.contains("blocker") {
                self.gate.notified().await;
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(MapError::Http {
                    status: 503,
                    url: url.to_string(),
                });
            }
            Ok(self.png.clone())
        }
    }

    fn loader(root: &Path, workers: usize, fetcher: Arc<TestFetcher>) -> TileLoader {
        let mut config = MapViewConfig::for_testing(root);
        config.dispatcher.workers = workers;
        TileLoader::from_config(
            &config,
            Arc::new(TemplateSource::new("test", "http://tiles.test/{z}/{x}/{y}.png")),
            fetcher,
            TokioSpawner::current().unwrap().shared(),
        )
    }

    async fn wait_for_state(context: &TileLoadingContext, state: LoadState) {
        for _ in 0..200 {
            if context.state() == state {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("context never reached {:?}, stuck in {:?}", state, context.state());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cache_hit_skips_network() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = TestFetcher::new();
        let loader = loader(dir.path(), 2, fetcher.clone());
        let coord = TileCoord::new(4, 5, 6);
        loader
            .cache()
            .write(coord, &solid_png(8, 8, [9, 9, 9, 255]).unwrap())
            .await
            .unwrap();

        let context = loader.context(coord);
        let outcome = context.load().await;

        assert!(outcome.is_ready());
        assert_eq!(context.state(), LoadState::Ready);
        assert_eq!(context.image().unwrap().pixels().get_pixel(0, 0).0, [9, 9, 9, 255]);
        assert!(fetcher.calls().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_miss_downloads_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = TestFetcher::new();
        let loader = loader(dir.path(), 2, fetcher.clone());
        let coord = TileCoord::new(1, 2, 3);

        let context = loader.context(coord);
        assert_eq!(context.state(), LoadState::Idle);
        assert!(context.load().await.is_ready());

        assert_eq!(fetcher.calls(), vec!["http://tiles.test/3/1/2.png"]);
        assert_eq!(
            loader.cache().try_read(coord).await.unwrap(),
            fetcher.png
        );

        // A second context for the same key is served from disk
        assert!(loader.context(coord).load().await.is_ready());
        assert_eq!(fetcher.calls().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_abort_while_dispatching_never_fetches() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = TestFetcher::new();
        let loader = loader(dir.path(), 1, fetcher.clone());

        // Occupy the only slot
        let blocker = loader
            .dispatcher()
            .submit("http://tiles.test/blocker", &CancellationToken::new())
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let context = loader.context(TileCoord::new(7, 7, 7));
        let task = {
            let context = context.clone();
            tokio::spawn(async move { context.load().await })
        };
        wait_for_state(&context, LoadState::Dispatching).await;

        assert!(context.abort());
        assert!(matches!(task.await.unwrap(), LoadOutcome::Aborted));
        assert_eq!(context.state(), LoadState::Aborted);
        assert!(!context.abort());

        fetcher.gate.notify_waiters();
        blocker.wait().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(fetcher.calls(), vec!["http://tiles.test/blocker"]);
        assert!(!context.is_ready());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_failed_fetch_is_terminal() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = TestFetcher::new();
        fetcher.fail.store(true, Ordering::SeqCst);
        let loader = loader(dir.path(), 2, fetcher.clone());

        let context = loader.context(TileCoord::new(0, 0, 1));
        let outcome = context.load().await;

        assert!(matches!(outcome, LoadOutcome::Failed(MapError::Http { status: 503, .. })));
        assert_eq!(context.state(), LoadState::Failed);
        assert!(context.image().is_none());
        assert!(!context.abort());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_undecodable_download_fails() {
        struct GarbageFetcher;

        #[async_trait]
        impl TileFetcher for GarbageFetcher {
            async fn fetch(&self, _url: &str) -> Result<Vec<u8>> {
                Ok(b"<html>rate limited</html>".to_vec())
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let config = MapViewConfig::for_testing(dir.path());
        let loader = TileLoader::from_config(
            &config,
            Arc::new(TemplateSource::default()),
            Arc::new(GarbageFetcher),
            TokioSpawner::current().unwrap().shared(),
        );
        let coord = TileCoord::new(1, 1, 2);

        let outcome = loader.context(coord).load().await;
        assert!(matches!(outcome, LoadOutcome::Failed(MapError::Decode(_))));
        // Nothing is written for bytes that do not decode
        assert!(loader.cache().try_read(coord).await.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_corrupt_cache_file_is_refetched() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = TestFetcher::new();
        let loader = loader(dir.path(), 2, fetcher.clone());
        let coord = TileCoord::new(2, 2, 2);
        loader.cache().write(coord, b"truncated").await.unwrap();

        assert!(loader.context(coord).load().await.is_ready());
        assert_eq!(fetcher.calls().len(), 1);
        assert_eq!(loader.cache().try_read(coord).await.unwrap(), fetcher.png);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cache_write_failure_still_ready() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"").unwrap();
        let fetcher = TestFetcher::new();
        let loader = loader(&blocker, 2, fetcher.clone());

        let context = loader.context(TileCoord::new(3, 1, 2));
        assert!(context.load().await.is_ready());
        assert!(context.is_ready());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_ready_fires_once() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = TestFetcher::new();
        let loader = loader(dir.path(), 2, fetcher.clone());
        let context = loader.context(TileCoord::new(5, 5, 5));

        let (tx, rx) = crossbeam_channel::unbounded();
        let handle = context
            .start(move |event| {
                let _ = tx.send(event);
            })
            .unwrap();

        let event = tokio::task::spawn_blocking(move || rx.recv_timeout(Duration::from_secs(5)))
            .await
            .unwrap()
            .unwrap();
        assert!(event.outcome.is_ready());
        assert_eq!(event.context_id, context.id());

        // Re-running reports the finished state without another fetch
        assert!(context.load().await.is_ready());
        assert!(!context.abort());
        assert_eq!(fetcher.calls().len(), 1);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(handle.is_finished());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_repeated_start_reports_one_event() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = TestFetcher::new();
        let config = MapViewConfig::for_testing(dir.path());
        let loader = TileLoader::from_config(
            &config,
            Arc::new(TemplateSource::new("test", "http://tiles.test/blocker/{z}/{x}/{y}.png")),
            fetcher.clone(),
            TokioSpawner::current().unwrap().shared(),
        );
        let context = loader.context(TileCoord::new(5, 5, 5));

        let (tx, rx) = crossbeam_channel::unbounded();
        let first = tx.clone();
        assert!(context.start(move |event| drop(first.send(event))).is_some());
        wait_for_state(&context, LoadState::Downloading).await;

        // A second start while the first is downloading is ignored
        let second = tx.clone();
        assert!(context.start(move |event| drop(second.send(event))).is_none());
        let waiter = {
            let context = context.clone();
            tokio::spawn(async move { context.load().await })
        };

        for _ in 0..200 {
            fetcher.gate.notify_waiters();
            if context.is_ready() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(waiter.await.unwrap().is_ready());

        // And so is one after Ready
        let late = tx.clone();
        assert!(context.start(move |event| drop(late.send(event))).is_none());
        drop(tx);

        let events: Vec<TileEvent> = tokio::task::spawn_blocking(move || {
            let mut events = Vec::new();
            while let Ok(event) = rx.recv_timeout(Duration::from_millis(200)) {
                events.push(event);
            }
            events
        })
        .await
        .unwrap();
        assert_eq!(events.len(), 1);
        assert!(events[0].outcome.is_ready());
        assert_eq!(fetcher.calls().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_later_load_reports_failure() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = TestFetcher::new();
        fetcher.fail.store(true, Ordering::SeqCst);
        let loader = loader(dir.path(), 2, fetcher.clone());
        let context = loader.context(TileCoord::new(0, 1, 1));

        assert!(matches!(context.load().await, LoadOutcome::Failed(_)));
        assert!(matches!(context.load().await, LoadOutcome::Failed(MapError::Runtime(_))));
        assert_eq!(context.state(), LoadState::Failed);
        assert_eq!(fetcher.calls().len(), 1);
    }
}
