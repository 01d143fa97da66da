use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};

use crate::config::PoolConfig;
use crate::error::Result;
use crate::queue::BoundedQueue;
use crate::task_future::TaskHandle;
use crate::wait_gate::WaitGate;
use crate::work_item::WorkItem;
use crate::worker;

/// Pool lifecycle. Moves forward only: `Running -> Draining -> Stopped`.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    /// Accepting submissions
    Running = 0,
    /// Shutdown started: new submissions are cancelled, queued work still runs
    Draining = 1,
    /// Shutdown finished and every worker has been joined. When a task shut
    /// down its own pool, that task's worker is not joined; it exits as soon
    /// as the task returns.
    Stopped = 2,
}

impl PoolState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => PoolState::Running,
            1 => PoolState::Draining,
            _ => PoolState::Stopped,
        }
    }
}

/// State shared between the pool handle and its workers
pub(crate) struct Shared {
    queue: Box<dyn BoundedQueue<WorkItem>>,
    state: AtomicU8,
    // submissions admitted while running whose push has not finished yet
    in_flight: AtomicUsize,
    gate: WaitGate,
}

impl Shared {
    fn new(queue: Box<dyn BoundedQueue<WorkItem>>) -> Self {
        Self {
            queue,
            state: AtomicU8::new(PoolState::Running as u8),
            in_flight: AtomicUsize::new(0),
            gate: WaitGate::new(),
        }
    }

    fn state(&self) -> PoolState {
        PoolState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn accepting(&self) -> bool {
        self.state() == PoolState::Running
    }

    /// Shutdown has begun, nothing is queued and no admitted push is pending.
    fn drained(&self) -> bool {
        !self.accepting() && self.in_flight.load(Ordering::SeqCst) == 0 && self.queue.is_empty()
    }

    /// Wait under the gate until the queue has room, then register an
    /// in-flight push. `false` once shutdown has begun.
    fn admit(&self) -> bool {
        let mut guard = self.gate.lock();
        loop {
            if !self.accepting() {
                return false;
            }
            if !self.queue.is_full() {
                break;
            }
            guard = self
                .gate
                .wait_for_space(guard, || self.accepting() && self.queue.is_full());
        }
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        true
    }

    /// Enqueue `item`, blocking while the queue is full.
    ///
    /// Hands the item back once shutdown has begun. The push itself runs
    /// outside the gate; a push that loses a race for the last slot goes back
    /// to waiting.
    fn push(&self, mut item: WorkItem) -> std::result::Result<(), WorkItem> {
        loop {
            if !self.admit() {
                return Err(item);
            }
            let pushed = self.queue.try_push(item);
            if self.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 && !self.accepting() {
                // draining workers may be waiting on this push to exit
                self.gate.wake_all();
            }
            match pushed {
                Ok(()) => {
                    self.gate.work_added();
                    return Ok(());
                }
                Err(back) => item = back,
            }
        }
    }

    /// Next item for a worker; `None` once shutdown has begun and the queue is drained.
    pub(crate) fn take(&self) -> Option<WorkItem> {
        loop {
            if let Some(item) = self.queue.try_pop() {
                self.gate.space_freed();
                return Some(item);
            }
            let guard = self.gate.lock();
            if self.drained() {
                return None;
            }
            let _guard = self.gate.wait_for_work(guard, || {
                self.queue.is_empty()
                    && (self.accepting() || self.in_flight.load(Ordering::SeqCst) > 0)
            });
        }
    }

    /// Single `Running -> Draining` transition; `false` if it already happened.
    fn begin_shutdown(&self) -> bool {
        let first = self
            .state
            .compare_exchange(
                PoolState::Running as u8,
                PoolState::Draining as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok();
        if first {
            self.gate.wake_all();
        }
        first
    }
}

/// Fixed set of worker threads fed through a bounded queue.
///
/// [`submit`](Self::submit) blocks while the queue is full and returns a
/// [`TaskHandle`] as soon as the task is queued. Dropping the pool shuts it
/// down: queued tasks still run, later submissions are cancelled.
pub struct ThreadPool {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    worker_count: usize,
}

impl ThreadPool {
    /// `workers` threads feeding from a lock-free queue of `queue_capacity`
    pub fn new(workers: usize, queue_capacity: usize) -> Result<Self> {
        Self::with_config(PoolConfig::new(workers, queue_capacity))
    }

    /// `workers` threads with a queue sized to match
    pub fn with_workers(workers: usize) -> Result<Self> {
        Self::new(workers, workers)
    }

    pub fn with_config(config: PoolConfig) -> Result<Self> {
        config.validate()?;

        let queue = config.queue_kind.build::<WorkItem>(config.queue_capacity)?;
        let capacity = queue.capacity();
        let shared = Arc::new(Shared::new(queue));

        let mut workers = Vec::with_capacity(config.workers);
        for id in 0..config.workers {
            match worker::spawn_worker(id, &config.thread_name_prefix, shared.clone()) {
                Ok(handle) => workers.push(handle),
                Err(err) => {
                    warn!(worker = id, error = %err, "failed to spawn worker, stopping pool");
                    shared.begin_shutdown();
                    for handle in workers {
                        if handle.join().is_err() {
                            warn!("worker thread panicked");
                        }
                    }
                    return Err(err.into());
                }
            }
        }

        info!(
            workers = config.workers,
            capacity,
            queue = ?config.queue_kind,
            "thread pool started"
        );

        Ok(ThreadPool {
            shared,
            workers: Mutex::new(workers),
            worker_count: config.workers,
        })
    }

    /// Queue `f` for execution and return a handle to its result.
    ///
    /// Blocks while the queue is full. During or after shutdown the task is
    /// dropped and the returned handle resolves to
    /// [`TaskError::Cancelled`](crate::TaskError::Cancelled).
    pub fn submit<F, R>(&self, f: F) -> TaskHandle<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (item, handle) = WorkItem::new(f);
        if let Err(item) = self.shared.push(item) {
            debug!("pool is shutting down, cancelling submitted task");
            drop(item);
        }
        handle
    }

    /// Stop accepting work, let workers drain the queue, then join them.
    ///
    /// Only the first call does anything; later calls, from any thread,
    /// return immediately.
    pub fn shutdown(&self) {
        if !self.shared.begin_shutdown() {
            return;
        }
        info!(pending = self.len(), "thread pool shutting down");

        let workers = std::mem::take(
            &mut *self.workers.lock().unwrap_or_else(PoisonError::into_inner),
        );
        let current = thread::current().id();
        for handle in workers {
            // a task that shuts down its own pool cannot join its own thread
            if handle.thread().id() == current {
                debug!("shutdown called from a worker, leaving it to exit on its own");
                continue;
            }
            if handle.join().is_err() {
                warn!("worker thread panicked");
            }
        }

        self.shared
            .state
            .store(PoolState::Stopped as u8, Ordering::SeqCst);
        info!("thread pool stopped");
    }

    pub fn state(&self) -> PoolState {
        self.shared.state()
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Approximate number of queued, not yet started tasks
    pub fn len(&self) -> usize {
        self.shared.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.queue.is_empty()
    }

    /// Usable queue capacity after rounding
    pub fn capacity(&self) -> usize {
        self.shared.queue.capacity()
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPool")
            .field("state", &self.state())
            .field("workers", &self.worker_count)
            .field("queued", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}
