use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::queue::QueueKind;

/// Thread pool configuration
///
/// Missing fields take their defaults when deserialized; a missing
/// `queue_capacity` follows `workers`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "PartialPoolConfig")]
pub struct PoolConfig {
    /// Number of worker threads, fixed for the pool's lifetime
    pub workers: usize,

    /// Requested queue size; rounded up to a power of two, one slot stays empty
    pub queue_capacity: usize,

    /// Queue implementation backing the pool
    pub queue_kind: QueueKind,

    /// Worker threads are named `<prefix>-<id>`
    pub thread_name_prefix: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        let workers = std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1);
        Self {
            workers,
            queue_capacity: workers,
            queue_kind: QueueKind::default(),
            thread_name_prefix: "rp".to_string(),
        }
    }
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct PartialPoolConfig {
    workers: Option<usize>,
    queue_capacity: Option<usize>,
    queue_kind: Option<QueueKind>,
    thread_name_prefix: Option<String>,
}

impl From<PartialPoolConfig> for PoolConfig {
    fn from(partial: PartialPoolConfig) -> Self {
        let defaults = PoolConfig::default();
        let workers = partial.workers.unwrap_or(defaults.workers);
        PoolConfig {
            workers,
            queue_capacity: partial.queue_capacity.unwrap_or(workers),
            queue_kind: partial.queue_kind.unwrap_or(defaults.queue_kind),
            thread_name_prefix: partial
                .thread_name_prefix
                .unwrap_or(defaults.thread_name_prefix),
        }
    }
}

impl PoolConfig {
    /// `workers` threads feeding from a queue of `queue_capacity`
    pub fn new(workers: usize, queue_capacity: usize) -> Self {
        Self {
            workers,
            queue_capacity,
            ..Default::default()
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_queue_kind(mut self, kind: QueueKind) -> Self {
        self.queue_kind = kind;
        self
    }

    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Reject settings a pool could never run with
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::InvalidConfiguration(
                "worker count must be at least 1".to_string(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(Error::InvalidCapacity {
                requested: self.queue_capacity,
            });
        }
        Ok(())
    }
}
