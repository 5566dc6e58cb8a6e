//! Bounded-parallel download dispatcher
//!
//! A fixed number of slots each own a FIFO queue and a worker task. New
//! requests join the least-loaded slot (ties go to the lowest slot id), so at
//! most `workers` transfers are ever in flight. Cancelling a queued request
//! flips its status in O(1) and the worker skips it; cancelling a running one
//! drops the fetch future, which aborts the transfer.

use super::fetch::TileFetcher;
use crate::core::config::DispatcherConfig;
use crate::runtime::{self, AsyncHandle, AsyncSpawner};
use crate::{MapError, Result};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{oneshot, Notify};
use tokio_util::sync::CancellationToken;

const QUEUED: u8 = 0;
const RUNNING: u8 = 1;
const DONE: u8 = 2;
const CANCELLED: u8 = 3;

struct Request {
    url: String,
    cancel: CancellationToken,
    status: AtomicU8,
    /// Fired once the request leaves the queue, started or not
    dequeued: Notify,
    reply: Mutex<Option<oneshot::Sender<Result<Vec<u8>>>>>,
}

impl Request {
    fn reply(&self, result: Result<Vec<u8>>) {
        let sender = self
            .reply
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(sender) = sender {
            // The waiter may have given up already
            let _ = sender.send(result);
        }
    }

    /// Moves a queued request to cancelled; false if it already started or finished
    fn cancel_if_queued(&self, slot: &Slot) -> bool {
        if self
            .status
            .compare_exchange(QUEUED, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            slot.load.fetch_sub(1, Ordering::AcqRel);
            self.dequeued.notify_one();
            self.reply(Err(MapError::Cancelled));
            log::debug!("cancelled queued download {} on slot {}", self.url, slot.id);
            true
        } else {
            false
        }
    }

    fn begin(&self) -> bool {
        let started = self
            .status
            .compare_exchange(QUEUED, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if started {
            self.dequeued.notify_one();
        }
        started
    }
}

struct Slot {
    id: usize,
    queue: Mutex<VecDeque<Arc<Request>>>,
    /// Queued (not cancelled) plus running requests
    load: AtomicUsize,
    notify: Notify,
}

impl Slot {
    fn new(id: usize) -> Self {
        Self {
            id,
            queue: Mutex::new(VecDeque::new()),
            load: AtomicUsize::new(0),
            notify: Notify::new(),
        }
    }

    fn queue(&self) -> MutexGuard<'_, VecDeque<Arc<Request>>> {
        self.queue
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn push(&self, request: Arc<Request>) {
        self.load.fetch_add(1, Ordering::AcqRel);
        self.queue().push_back(request);
        self.notify.notify_one();
    }

    fn pop(&self) -> Option<Arc<Request>> {
        self.queue().pop_front()
    }
}

#[derive(Default)]
struct Counters {
    in_flight: AtomicUsize,
    started: AtomicU64,
}

/// Pending result of [`DownloadDispatcher::submit`]
pub struct Download {
    request: Arc<Request>,
    slot: Arc<Slot>,
    rx: oneshot::Receiver<Result<Vec<u8>>>,
}

impl Download {
    /// Index of the slot the request was queued on
    pub fn slot(&self) -> usize {
        self.slot.id
    }

    /// Resolves once the request leaves its queue; true if the transfer started
    pub async fn started(&self) -> bool {
        if self.request.status.load(Ordering::Acquire) == QUEUED {
            self.request.dequeued.notified().await;
        }
        matches!(self.request.status.load(Ordering::Acquire), RUNNING | DONE)
    }

    /// Waits for the bytes, or `MapError::Cancelled` once the token fires
    pub async fn wait(mut self) -> Result<Vec<u8>> {
        tokio::select! {
            biased;
            result = &mut self.rx => return result.unwrap_or(Err(MapError::Cancelled)),
            _ = self.request.cancel.cancelled() => {}
        }

        if self.request.cancel_if_queued(&self.slot) {
            return Err(MapError::Cancelled);
        }
        // Already running: the worker observes the same token and replies shortly
        match self.rx.await {
            Ok(Ok(_)) | Err(_) => Err(MapError::Cancelled),
            Ok(Err(e)) => Err(e),
        }
    }
}

/// Fixed pool of download slots shared by every loading context
pub struct DownloadDispatcher {
    slots: Vec<Arc<Slot>>,
    counters: Arc<Counters>,
    shutdown: CancellationToken,
    _workers: Vec<Box<dyn AsyncHandle>>,
}

impl DownloadDispatcher {
    pub fn new(
        config: &DispatcherConfig,
        fetcher: Arc<dyn TileFetcher>,
        spawner: &dyn AsyncSpawner,
    ) -> Self {
        let workers = config.workers.max(1);
        let shutdown = CancellationToken::new();
        let counters = Arc::new(Counters::default());

        let slots: Vec<Arc<Slot>> = (0..workers).map(|id| Arc::new(Slot::new(id))).collect();
        let handles = slots
            .iter()
            .map(|slot| {
                runtime::spawn(
                    spawner,
                    run_slot(
                        slot.clone(),
                        fetcher.clone(),
                        counters.clone(),
                        shutdown.clone(),
                    ),
                )
            })
            .collect();

        log::debug!("download dispatcher started with {} slots", workers);

        Self {
            slots,
            counters,
            shutdown,
            _workers: handles,
        }
    }

    /// Queues `url` on the least-loaded slot.
    ///
    /// Fails immediately with `MapError::Cancelled` if `cancel` already fired.
    pub fn submit(&self, url: impl Into<String>, cancel: &CancellationToken) -> Result<Download> {
        if cancel.is_cancelled() {
            return Err(MapError::Cancelled);
        }
        if self.shutdown.is_cancelled() {
            return Err(MapError::Runtime("download dispatcher is shut down".into()));
        }

        let slot = self
            .slots
            .iter()
            .min_by_key(|slot| (slot.load.load(Ordering::Acquire), slot.id))
            .cloned()
            .ok_or_else(|| MapError::Runtime("download dispatcher has no slots".into()))?;

        let (tx, rx) = oneshot::channel();
        let request = Arc::new(Request {
            url: url.into(),
            cancel: cancel.clone(),
            status: AtomicU8::new(QUEUED),
            dequeued: Notify::new(),
            reply: Mutex::new(Some(tx)),
        });

        log::debug!("queued {} on slot {}", request.url, slot.id);
        slot.push(request.clone());

        Ok(Download { request, slot, rx })
    }

    pub fn workers(&self) -> usize {
        self.slots.len()
    }

    /// Current load of every slot, queued plus running
    pub fn slot_loads(&self) -> Vec<usize> {
        self.slots
            .iter()
            .map(|slot| slot.load.load(Ordering::Acquire))
            .collect()
    }

    /// Transfers running right now
    pub fn in_flight(&self) -> usize {
        self.counters.in_flight.load(Ordering::Acquire)
    }

    /// Transfers started since construction
    pub fn started(&self) -> u64 {
        self.counters.started.load(Ordering::Acquire)
    }

    /// Stops the workers; queued requests resolve as cancelled
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

impl Drop for DownloadDispatcher {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn run_slot(
    slot: Arc<Slot>,
    fetcher: Arc<dyn TileFetcher>,
    counters: Arc<Counters>,
    shutdown: CancellationToken,
) {
    loop {
        if shutdown.is_cancelled() {
            while let Some(request) = slot.pop() {
                request.cancel_if_queued(&slot);
            }
            break;
        }

        let request = match slot.pop() {
            Some(request) => request,
            None => {
                tokio::select! {
                    _ = slot.notify.notified() => {}
                    _ = shutdown.cancelled() => {}
                }
                continue;
            }
        };

        if request.cancel.is_cancelled() {
            request.cancel_if_queued(&slot);
            continue;
        }
        if !request.begin() {
            // Cancelled while queued; load was already released
            continue;
        }

        counters.in_flight.fetch_add(1, Ordering::AcqRel);
        counters.started.fetch_add(1, Ordering::AcqRel);

        let result = tokio::select! {
            biased;
            _ = request.cancel.cancelled() => Err(MapError::Cancelled),
            result = fetcher.fetch(&request.url) => result,
        };

        counters.in_flight.fetch_sub(1, Ordering::AcqRel);
        slot.load.fetch_sub(1, Ordering::AcqRel);
        request.status.store(DONE, Ordering::Release);

        if let Err(e) = &result {
            if !e.is_cancelled() {
                log::warn!("download of {} failed on slot {}: {}", request.url, slot.id, e);
            }
        }
        request.reply(result);
    }
    log::debug!("download slot {} stopped", slot.id);
}
