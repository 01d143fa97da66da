use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::ring_buffer::{RingBuffer, round_slots};

/// Non-blocking bounded FIFO the pool layers its wait/notify protocol over.
///
/// Implementations never block for capacity reasons: a refused push hands the
/// value back and an empty pop returns `None`.
pub trait BoundedQueue<T>: Send + Sync {
    fn try_push(&self, value: T) -> std::result::Result<(), T>;

    fn try_pop(&self) -> Option<T>;

    /// Approximate number of queued items
    fn len(&self) -> usize;

    /// Usable capacity
    fn capacity(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_full(&self) -> bool {
        self.len() >= self.capacity()
    }
}

/// Which queue backs a pool
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueKind {
    /// [`RingBuffer`], CAS cursors only
    #[default]
    LockFree,
    /// [`LockedQueue`], a deque behind one mutex
    Locked,
}

impl QueueKind {
    pub(crate) fn build<T: Send + 'static>(
        self,
        requested: usize,
    ) -> Result<Box<dyn BoundedQueue<T>>> {
        Ok(match self {
            QueueKind::LockFree => Box::new(RingBuffer::new(requested)?),
            QueueKind::Locked => Box::new(LockedQueue::new(requested)?),
        })
    }
}

/// Mutex-guarded deque with the same capacity rule as [`RingBuffer`].
///
/// Baseline for comparing the lock-free buffer; pools behave identically on
/// either backend.
#[derive(Debug)]
pub struct LockedQueue<T> {
    items: Mutex<VecDeque<T>>,
    capacity: usize,
}

impl<T> LockedQueue<T> {
    pub fn new(requested: usize) -> Result<Self> {
        let capacity = round_slots(requested)? - 1;
        Ok(LockedQueue {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        })
    }

    fn items(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Send> BoundedQueue<T> for LockedQueue<T> {
    fn try_push(&self, value: T) -> std::result::Result<(), T> {
        let mut items = self.items();
        if items.len() >= self.capacity {
            return Err(value);
        }
        items.push_back(value);
        Ok(())
    }

    fn try_pop(&self) -> Option<T> {
        self.items().pop_front()
    }

    fn len(&self) -> usize {
        self.items().len()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;

    #[test]
    fn locked_queue_matches_ring_capacity() {
        for requested in [1, 3, 5, 9, 16] {
            let locked = LockedQueue::<u8>::new(requested).unwrap();
            let ring = RingBuffer::<u8>::new(requested).unwrap();
            assert_eq!(BoundedQueue::capacity(&locked), ring.capacity());
        }
        assert!(LockedQueue::<u8>::new(0).is_err());
    }

    #[test]
    fn backends_share_the_contract() {
        for kind in [QueueKind::LockFree, QueueKind::Locked] {
            let queue = kind.build::<u32>(4).unwrap();
            assert!(queue.is_empty());
            for i in 0..3 {
                assert!(queue.try_push(i).is_ok(), "{kind:?}");
            }
            assert!(queue.is_full(), "{kind:?}");
            assert_eq!(queue.try_push(7), Err(7));
            assert_eq!(queue.len(), 3);
            assert_eq!(queue.try_pop(), Some(0));
            assert!(!queue.is_full());
        }
    }

    #[test]
    fn queue_kind_serde_names() {
        assert_eq!(
            serde_json::to_string(&QueueKind::LockFree).unwrap(),
            "\"lock_free\""
        );
        let kind: QueueKind = serde_json::from_str("\"locked\"").unwrap();
        assert_eq!(kind, QueueKind::Locked);
    }
}
