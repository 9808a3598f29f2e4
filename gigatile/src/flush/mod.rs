//! Background flush coordinator.
//!
//! Bounds the amount of dirtied page-cache data a build can leave
//! behind. Whenever a level finishes, its whole file size is added to
//! a dirty counter and a full fsync of that file is queued on a
//! background worker; the worker subtracts the size once the sync
//! hits media. While the counter sits above [`DIRTY_LIMIT_BYTES`] the
//! coordinator is throttled, and new level allocations wait until the
//! backlog drains.
//!
//! The worker runs in a dedicated named thread and shuts down when
//! the coordinator is dropped. Builds normally share one process-wide
//! coordinator ([`global`]); tests construct private instances.

use std::fs::File;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex, OnceLock};
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

/// Dirty-byte threshold above which new allocations are gated.
///
/// Past this point a typical low-memory device starts evicting
/// foreground pages to hold our dirty data.
pub const DIRTY_LIMIT_BYTES: u64 = 50 * 1024 * 1024;

/// One queued flush: sync every dirty page of `file`, then retire
/// `bytes` from the counter.
struct FlushJob {
    level: usize,
    file: Arc<File>,
    bytes: u64,
}

/// State shared between producers and the flush worker.
struct Shared {
    limit: u64,
    dirty_bytes: AtomicU64,
    /// Guards the throttle flag; paired with `cond` for both
    /// "throttle released" and "queue drained" waits.
    gate: Mutex<bool>,
    cond: Condvar,
}

impl Shared {
    /// Recompute the throttle flag from the current counter and wake waiters.
    fn settle(&self) {
        let dirty = self.dirty_bytes.load(Ordering::Acquire);
        let mut throttled = self.gate.lock().unwrap();
        *throttled = dirty >= self.limit;
        self.cond.notify_all();
    }
}

/// Schedules background full-file syncs and gates allocations while
/// too much dirty data is outstanding.
pub struct FlushCoordinator {
    shared: Arc<Shared>,
    tx: Mutex<Option<Sender<FlushJob>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl FlushCoordinator {
    /// Create a coordinator with the default dirty-byte limit.
    pub fn new() -> Arc<Self> {
        Self::with_limit(DIRTY_LIMIT_BYTES)
    }

    /// Create a coordinator with a custom limit (tests use small ones).
    pub fn with_limit(limit: u64) -> Arc<Self> {
        let shared = Arc::new(Shared {
            limit,
            dirty_bytes: AtomicU64::new(0),
            gate: Mutex::new(false),
            cond: Condvar::new(),
        });

        let (tx, rx) = mpsc::channel::<FlushJob>();
        let worker_shared = shared.clone();
        let worker = thread::Builder::new()
            .name("pyramid-flush".to_string())
            .spawn(move || Self::run_worker(rx, worker_shared))
            .expect("failed to spawn flush worker thread");

        Arc::new(Self {
            shared,
            tx: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Worker loop: drain the queue, sync each file, retire its bytes.
    fn run_worker(rx: Receiver<FlushJob>, shared: Arc<Shared>) {
        while let Ok(job) = rx.recv() {
            if let Err(e) = job.file.sync_all() {
                // A failed background sync does not retroactively fail
                // the build; the file is still readable from cache.
                warn!(level = job.level, error = %e, "background flush failed");
            } else {
                debug!(level = job.level, bytes = job.bytes, "level flushed to media");
            }
            shared.dirty_bytes.fetch_sub(job.bytes, Ordering::AcqRel);
            shared.settle();
        }
    }

    /// Account `bytes` of freshly dirtied data and queue a full sync
    /// of `file`.
    pub fn schedule(&self, level: usize, file: Arc<File>, bytes: u64) {
        self.shared.dirty_bytes.fetch_add(bytes, Ordering::AcqRel);
        self.shared.settle();

        let tx = self.tx.lock().unwrap();
        match tx.as_ref() {
            Some(tx) => {
                if tx.send(FlushJob { level, file, bytes }).is_err() {
                    // Worker is gone; retire the bytes ourselves.
                    self.shared.dirty_bytes.fetch_sub(bytes, Ordering::AcqRel);
                    self.shared.settle();
                }
            }
            None => {
                self.shared.dirty_bytes.fetch_sub(bytes, Ordering::AcqRel);
                self.shared.settle();
            }
        }
    }

    /// Outstanding dirtied bytes not yet confirmed on media.
    pub fn dirty_bytes(&self) -> u64 {
        self.shared.dirty_bytes.load(Ordering::Acquire)
    }

    /// Whether allocations are currently gated.
    pub fn is_throttled(&self) -> bool {
        *self.shared.gate.lock().unwrap()
    }

    /// Block until the dirty counter is back under the limit.
    ///
    /// Called before each new level allocation; a no-op when not
    /// throttled.
    pub fn wait_until_clear(&self) {
        let mut throttled = self.shared.gate.lock().unwrap();
        while *throttled {
            debug!("allocation gated on flush backlog");
            throttled = self.shared.cond.wait(throttled).unwrap();
        }
    }

    /// Block until every scheduled flush has completed.
    pub fn wait_idle(&self) {
        let mut guard = self.shared.gate.lock().unwrap();
        while self.shared.dirty_bytes.load(Ordering::Acquire) > 0 {
            guard = self.shared.cond.wait(guard).unwrap();
        }
        drop(guard);
    }

    /// Stop accepting work and join the worker after it drains the queue.
    pub fn shutdown(&self) {
        let tx = self.tx.lock().unwrap().take();
        drop(tx);
        if let Some(worker) = self.worker.lock().unwrap().take() {
            let _ = worker.join();
        }
    }
}

impl Drop for FlushCoordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for FlushCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlushCoordinator")
            .field("dirty_bytes", &self.dirty_bytes())
            .field("throttled", &self.is_throttled())
            .finish()
    }
}

/// The process-wide coordinator, created on first use.
pub fn global() -> Arc<FlushCoordinator> {
    static GLOBAL: OnceLock<Arc<FlushCoordinator>> = OnceLock::new();
    GLOBAL.get_or_init(FlushCoordinator::new).clone()
}
