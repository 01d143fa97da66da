use std::sync::atomic::{AtomicUsize, Ordering, fence};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use crossbeam_utils::CachePadded;

/// Blocking shell around a non-blocking queue.
///
/// The mutex only guards the decision to sleep; queue operations happen
/// outside it. Producers park on `not_full`, workers on `not_empty`.
///
/// A sleeper bumps its waiter count, fences, then re-checks its condition
/// before waiting. A notifier changes the queue, fences, then reads the count.
/// Either the sleeper sees the change or the notifier sees the sleeper, and the
/// notifier takes the mutex before signalling so the sleeper is already inside
/// `Condvar::wait`.
pub(crate) struct WaitGate {
    mutex: Mutex<()>,
    not_full: Condvar,
    not_empty: Condvar,
    producers_waiting: CachePadded<AtomicUsize>,
    workers_waiting: CachePadded<AtomicUsize>,
}

impl WaitGate {
    pub(crate) fn new() -> Self {
        Self {
            mutex: Mutex::new(()),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
            producers_waiting: CachePadded::new(AtomicUsize::new(0)),
            workers_waiting: CachePadded::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, ()> {
        self.mutex.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // producer side: sleeps only if `still_full` holds after registering
    pub(crate) fn wait_for_space<'a>(
        &self,
        guard: MutexGuard<'a, ()>,
        still_full: impl FnOnce() -> bool,
    ) -> MutexGuard<'a, ()> {
        Self::park(&self.not_full, &self.producers_waiting, guard, still_full)
    }

    // worker side: sleeps only if `still_idle` holds after registering
    pub(crate) fn wait_for_work<'a>(
        &self,
        guard: MutexGuard<'a, ()>,
        still_idle: impl FnOnce() -> bool,
    ) -> MutexGuard<'a, ()> {
        Self::park(&self.not_empty, &self.workers_waiting, guard, still_idle)
    }

    fn park<'a>(
        cv: &Condvar,
        waiting: &AtomicUsize,
        guard: MutexGuard<'a, ()>,
        still_blocked: impl FnOnce() -> bool,
    ) -> MutexGuard<'a, ()> {
        waiting.fetch_add(1, Ordering::SeqCst);
        fence(Ordering::SeqCst);
        let guard = if still_blocked() {
            cv.wait(guard).unwrap_or_else(PoisonError::into_inner)
        } else {
            guard
        };
        waiting.fetch_sub(1, Ordering::SeqCst);
        guard
    }

    fn signal(&self, cv: &Condvar, waiting: &AtomicUsize) {
        fence(Ordering::SeqCst);
        if waiting.load(Ordering::SeqCst) > 0 {
            drop(self.lock());
            cv.notify_one();
        }
    }

    /// One item was queued; wake one worker if any sleeps.
    pub(crate) fn work_added(&self) {
        self.signal(&self.not_empty, &self.workers_waiting);
    }

    /// One slot was freed; wake one producer if any sleeps.
    pub(crate) fn space_freed(&self) {
        self.signal(&self.not_full, &self.producers_waiting);
    }

    /// Broadcast to both sides. Taking the mutex orders this after any waiter
    /// that checked the pool state before it changed.
    pub(crate) fn wake_all(&self) {
        let _g = self.lock();
        self.not_full.notify_all();
        self.not_empty.notify_all();
    }

    #[cfg(all(test, not(loom)))]
    pub(crate) fn waiting(&self) -> (usize, usize) {
        (
            self.producers_waiting.load(Ordering::Relaxed),
            self.workers_waiting.load(Ordering::Relaxed),
        )
    }
}
