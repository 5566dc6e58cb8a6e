//! Task spawning for the tile pipeline
//!
//! The tile pipeline never reaches for a process-wide runtime. The host hands
//! in an [`AsyncSpawner`] (usually a [`TokioSpawner`] wrapping the handle of a
//! runtime it owns), and every background task is started through it.

use futures::future::BoxFuture;
use std::sync::Arc;

/// Starts pipeline tasks on a runtime owned by the host
pub trait AsyncSpawner: Send + Sync + 'static {
    fn spawn_boxed(&self, future: BoxFuture<'static, ()>) -> Box<dyn AsyncHandle>;

    /// Runs CPU-bound work such as image decoding off the async workers
    fn spawn_blocking_boxed(&self, job: Box<dyn FnOnce() + Send + 'static>);
}

/// A started task
pub trait AsyncHandle: Send + Sync {
    fn is_finished(&self) -> bool;

    /// Stops the task at its next suspension point
    fn cancel(&self);
}

/// Shared spawner handed to every pipeline component
pub type SharedSpawner = Arc<dyn AsyncSpawner>;

/// Boxes `future` and hands it to `spawner`
pub fn spawn<F>(spawner: &dyn AsyncSpawner, future: F) -> Box<dyn AsyncHandle>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    spawner.spawn_boxed(Box::pin(future))
}

/// Runs `job` on the blocking pool and awaits its result
pub async fn run_blocking<F, T>(spawner: &dyn AsyncSpawner, job: F) -> crate::Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let (tx, rx) = tokio::sync::oneshot::channel();
    spawner.spawn_blocking_boxed(Box::new(move || {
        let _ = tx.send(job());
    }));
    rx.await
        .map_err(|_| crate::MapError::Runtime("blocking task dropped".into()))
}

/// [`AsyncSpawner`] over a Tokio runtime handle
#[derive(Debug, Clone)]
pub struct TokioSpawner {
    handle: tokio::runtime::Handle,
}

impl TokioSpawner {
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// Spawner for the runtime the caller is running inside.
    ///
    /// Returns `None` outside a Tokio context.
    pub fn current() -> Option<Self> {
        tokio::runtime::Handle::try_current().ok().map(Self::new)
    }

    pub fn shared(self) -> SharedSpawner {
        Arc::new(self)
    }
}

impl AsyncSpawner for TokioSpawner {
    fn spawn_boxed(&self, future: BoxFuture<'static, ()>) -> Box<dyn AsyncHandle> {
        Box::new(TokioHandle(self.handle.spawn(future)))
    }

    fn spawn_blocking_boxed(&self, job: Box<dyn FnOnce() + Send + 'static>) {
        // The JoinHandle is not needed; results travel back through the job itself
        let _ = self.handle.spawn_blocking(job);
    }
}

struct TokioHandle(tokio::task::JoinHandle<()>);

impl AsyncHandle for TokioHandle {
    fn is_finished(&self) -> bool {
        self.0.is_finished()
    }

    fn cancel(&self) {
        self.0.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_spawned_task_finishes() {
        let spawner = TokioSpawner::current().expect("inside a runtime");
        let handle = spawn(&spawner, async {
            tokio::time::sleep(Duration::from_millis(10)).await;
        });

        assert!(!handle.is_finished());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(handle.is_finished());
    }

    #[tokio::test]
    async fn test_run_blocking_returns_value() {
        let spawner = TokioSpawner::current().unwrap();
        let value = run_blocking(&spawner, || 6 * 7).await.unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_cancel_aborts_task() {
        let spawner = TokioSpawner::current().unwrap();
        let handle = spawn(&spawner, async {
            tokio::time::sleep(Duration::from_secs(60)).await;
        });
        handle.cancel();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(handle.is_finished());
    }

    #[test]
    fn test_no_current_runtime() {
        assert!(TokioSpawner::current().is_none());
    }
}
