// Ring-Pool: fixed-size thread pool over a bounded lock-free ring buffer
// - Producers reserve and publish slots with CAS, no lock on the buffer itself
// - A mutex/condvar shell turns "full"/"empty" into blocking backpressure
// - Shutdown drains already queued work and cancels anything submitted later
// - Every submission gets a handle resolving to the value, a panic, or a cancel
mod config;
mod error;
mod macros;
mod pool;
mod queue;
mod ring_buffer;
mod task_future;
mod wait_gate;
mod work_item;
mod worker;

pub use config::PoolConfig;
pub use error::{Error, Result, TaskError};
pub use pool::{PoolState, ThreadPool};
pub use queue::{BoundedQueue, LockedQueue, QueueKind};
pub use ring_buffer::RingBuffer;
pub use task_future::TaskHandle;

// convenience function to create a pool sized to the machine
pub fn new() -> Result<ThreadPool> {
    ThreadPool::with_config(PoolConfig::default())
}

// create thread pool with specific worker count
pub fn with_workers(worker_count: usize) -> Result<ThreadPool> {
    ThreadPool::with_workers(worker_count)
}
