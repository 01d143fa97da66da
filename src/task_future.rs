use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::error::TaskError;

type Outcome<R> = Result<R, TaskError>;

struct Completion<R> {
    outcome: Mutex<Option<Outcome<R>>>,
    ready: Condvar,
}

impl<R> Completion<R> {
    fn outcome(&self) -> MutexGuard<'_, Option<Outcome<R>>> {
        self.outcome.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn resolve(&self, outcome: Outcome<R>) {
        let mut slot = self.outcome();
        if slot.is_none() {
            *slot = Some(outcome);
            self.ready.notify_all();
        }
    }
}

/// Caller-side handle to the result of a submitted task
///
/// Resolves exactly once: to the task's return value, to
/// [`TaskError::Panicked`] if it panicked, or to [`TaskError::Cancelled`] if
/// the pool discarded it during shutdown. Waiting never hangs on a task that
/// will not run.
pub struct TaskHandle<R> {
    completion: Arc<Completion<R>>,
}

/// Worker-side half of a [`TaskHandle`]; dropping it unfulfilled cancels the handle
pub(crate) struct Promise<R> {
    completion: Option<Arc<Completion<R>>>,
}

pub(crate) fn pair<R>() -> (Promise<R>, TaskHandle<R>) {
    let completion = Arc::new(Completion {
        outcome: Mutex::new(None),
        ready: Condvar::new(),
    });
    (
        Promise {
            completion: Some(completion.clone()),
        },
        TaskHandle { completion },
    )
}

impl<R> Promise<R> {
    pub(crate) fn fulfil(mut self, outcome: Outcome<R>) {
        if let Some(completion) = self.completion.take() {
            completion.resolve(outcome);
        }
    }
}

impl<R> Drop for Promise<R> {
    fn drop(&mut self) {
        if let Some(completion) = self.completion.take() {
            completion.resolve(Err(TaskError::Cancelled));
        }
    }
}

impl<R> TaskHandle<R> {
    /// A handle that is already resolved to [`TaskError::Cancelled`]
    pub fn cancelled() -> Self {
        let (promise, handle) = pair();
        drop(promise);
        handle
    }

    /// Check if the task has finished (or been cancelled) without blocking
    pub fn is_complete(&self) -> bool {
        self.completion.outcome().is_some()
    }

    /// Block until the task resolves and return its outcome
    pub fn wait(self) -> Result<R, TaskError> {
        let mut slot = self.completion.outcome();
        loop {
            if let Some(outcome) = slot.take() {
                return outcome;
            }
            slot = self
                .completion
                .ready
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Wait up to `timeout` for the task to resolve
    ///
    /// Returns `true` if the outcome is available; [`wait`](Self::wait) will
    /// then return immediately.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut slot = self.completion.outcome();
        while slot.is_none() {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self
                .completion
                .ready
                .wait_timeout(slot, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            slot = guard;
        }
        true
    }
}

impl<R> std::fmt::Debug for TaskHandle<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("complete", &self.is_complete())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn fulfilled_value_is_returned() {
        let (promise, handle) = pair();
        assert!(!handle.is_complete());
        promise.fulfil(Ok(7));
        assert!(handle.is_complete());
        assert_eq!(handle.wait(), Ok(7));
    }

    #[test]
    fn dropped_promise_cancels() {
        let (promise, handle) = pair::<u8>();
        drop(promise);
        assert_eq!(handle.wait(), Err(TaskError::Cancelled));
        assert_eq!(TaskHandle::<u8>::cancelled().wait(), Err(TaskError::Cancelled));
    }

    #[test]
    fn wait_blocks_until_another_thread_fulfils() {
        let (promise, handle) = pair();
        let t = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            promise.fulfil(Ok("done"));
        });
        assert_eq!(handle.wait(), Ok("done"));
        t.join().unwrap();
    }

    #[test]
    fn wait_timeout_reports_pending_then_ready() {
        let (promise, handle) = pair::<()>();
        assert!(!handle.wait_timeout(Duration::from_millis(5)));
        promise.fulfil(Err(TaskError::Panicked("x".into())));
        assert!(handle.wait_timeout(Duration::from_millis(5)));
        assert_eq!(handle.wait(), Err(TaskError::Panicked("x".into())));
    }
}
