use std::panic::{self, AssertUnwindSafe};

use crate::error::TaskError;
use crate::task_future::{self, TaskHandle};

/// Type-erased unit of work owned by the queue between submit and execution
pub(crate) struct WorkItem {
    job: Box<dyn FnOnce() + Send + 'static>,
}

impl WorkItem {
    /// Wrap `f` so that running the item resolves the returned handle.
    ///
    /// Panics are caught here and stored in the handle; the worker running the
    /// item never unwinds.
    pub(crate) fn new<F, R>(f: F) -> (WorkItem, TaskHandle<R>)
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (promise, handle) = task_future::pair();
        let job = move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(f)).map_err(TaskError::from_panic);
            if let Err(err) = &outcome {
                tracing::warn!(error = %err, "task panicked");
            }
            promise.fulfil(outcome);
        };
        (WorkItem { job: Box::new(job) }, handle)
    }

    #[inline]
    pub(crate) fn run(self) {
        (self.job)()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_resolves_the_handle() {
        let (item, handle) = WorkItem::new(|| 6 * 7);
        item.run();
        assert_eq!(handle.wait(), Ok(42));
    }

    #[test]
    fn panics_are_captured() {
        let (item, handle) = WorkItem::new(|| -> u32 { panic!("bad input") });
        item.run();
        assert_eq!(handle.wait(), Err(TaskError::Panicked("bad input".into())));
    }

    #[test]
    fn dropping_unrun_item_cancels() {
        let (item, handle) = WorkItem::new(|| ());
        drop(item);
        assert_eq!(handle.wait(), Err(TaskError::Cancelled));
    }
}
