use std::any::Any;
use std::io;

/// Result alias for pool and buffer construction
pub type Result<T> = std::result::Result<T, Error>;

/// Structural errors raised while building a buffer or a pool
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Requested queue size was zero or too large to round to a power of two
    #[error("invalid queue capacity: {requested}")]
    InvalidCapacity { requested: usize },

    /// Pool settings that can never run, e.g. zero workers
    #[error("invalid pool configuration: {0}")]
    InvalidConfiguration(String),

    /// The OS refused to start a worker thread
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] io::Error),
}

/// Why a [`TaskHandle`](crate::TaskHandle) did not yield a value
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    /// The task panicked while running on a worker
    #[error("task panicked: {0}")]
    Panicked(String),

    /// The task was discarded before it ran (submitted during shutdown)
    #[error("task cancelled by pool shutdown")]
    Cancelled,
}

impl TaskError {
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = match payload.downcast::<&'static str>() {
            Ok(s) => (*s).to_string(),
            Err(payload) => match payload.downcast::<String>() {
                Ok(s) => *s,
                Err(_) => "non-string panic payload".to_string(),
            },
        };
        TaskError::Panicked(message)
    }
}
