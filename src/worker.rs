use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::pool::Shared;

// Idle: blocked in `take`. Running: executing an item.
// Draining: shutdown began, `take` still yields queued items.
// Terminated: `take` returned `None`.
pub(crate) fn spawn_worker(
    id: usize,
    name_prefix: &str,
    shared: Arc<Shared>,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("{name_prefix}-{id}"))
        .spawn(move || {
            tracing::debug!(worker = id, "worker started");

            let mut executed = 0u64;
            while let Some(item) = shared.take() {
                item.run();
                executed += 1;
            }

            tracing::debug!(worker = id, executed, "worker exiting");
        })
}
