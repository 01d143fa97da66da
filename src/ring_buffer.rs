//! Bounded multi-producer ring buffer driven purely by compare-and-swap.
//!
//! # Design
//!
//! The buffer is a power-of-two array of slots addressed by four monotonically
//! increasing cursors. Physical slot = `cursor & mask`; cursors themselves never
//! wrap modulo capacity, only modulo `usize`, so every comparison is done with
//! `wrapping_sub`.
//!
//! ```text
//!  released_read <= read_cursor <= published_write <= write_cursor
//!        |               |               |                  |
//!        |               |               |                  +-- next slot a producer may reserve
//!        |               |               +-- everything below is stored and visible to consumers
//!        |               +-- next slot a consumer may claim
//!        +-- everything below has been moved out and may be overwritten
//! ```
//!
//! Producers reserve a slot by CAS on `write_cursor`, store the payload, then
//! advance `published_write` strictly in reservation order. A consumer never
//! looks at a slot until `published_write` has passed it, so it cannot observe a
//! reserved-but-unwritten slot.
//!
//! Consumers mirror this: a slot is claimed by CAS on `read_cursor` before the
//! payload is moved out, and handed back to producers through `released_read`,
//! again in claim order. Producers test fullness against `released_read`, which
//! keeps a wrapping producer from overwriting a slot that is still being read.
//!
//! One slot always stays structurally empty, so usable capacity is `slots - 1`.
//!
//! # Ordering
//!
//! ```text
//! producer: write slot, Release-CAS published_write
//!     -> consumer: Acquire-load published_write, read slot
//! consumer: read slot, Release-CAS released_read
//!     -> producer: Acquire-load released_read, write slot
//! ```
//!
//! # Liveness
//!
//! The in-order publication (and release) step waits for the immediately
//! preceding producer (consumer). A predecessor that is descheduled between its
//! reservation and its publication stalls its successors until it runs again.
//! With a single producer and a single consumer the waits never trigger.

#[cfg(not(loom))]
use std::sync::atomic::{AtomicUsize, Ordering};

#[cfg(loom)]
use loom::sync::atomic::{AtomicUsize, Ordering};

use std::cell::UnsafeCell;
use std::fmt;
use std::mem::MaybeUninit;

use crossbeam_utils::{Backoff, CachePadded};

use crate::error::{Error, Result};
use crate::queue::BoundedQueue;

/// Physical slot count for a requested queue size.
///
/// Size 1 becomes 2 so that one slot can stay empty; everything else rounds up
/// to the next power of two.
pub(crate) fn round_slots(requested: usize) -> Result<usize> {
    match requested {
        0 => Err(Error::InvalidCapacity { requested }),
        1 => Ok(2),
        n => n
            .checked_next_power_of_two()
            .ok_or(Error::InvalidCapacity { requested }),
    }
}

#[cfg(not(loom))]
#[inline]
fn wait_for_predecessor(backoff: &Backoff) {
    backoff.snooze();
}

#[cfg(loom)]
#[inline]
fn wait_for_predecessor(_backoff: &Backoff) {
    loom::thread::yield_now();
}

/// Fixed-capacity FIFO shared by any number of producers and consumers.
///
/// Neither operation blocks: [`try_push`](Self::try_push) hands the value back
/// when the buffer is full and [`try_pop`](Self::try_pop) returns `None` when
/// nothing is published. Blocking is left to the caller.
pub struct RingBuffer<T> {
    slots: Box<[UnsafeCell<MaybeUninit<T>>]>,
    mask: usize,
    write_cursor: CachePadded<AtomicUsize>,
    published_write: CachePadded<AtomicUsize>,
    read_cursor: CachePadded<AtomicUsize>,
    released_read: CachePadded<AtomicUsize>,
}

// SAFETY: a slot is written only by the producer that reserved it and read only
// by the consumer that claimed it; the cursor protocol keeps those windows
// disjoint, so sharing the buffer only ever moves `T` between threads.
unsafe impl<T: Send> Sync for RingBuffer<T> {}

impl<T> RingBuffer<T> {
    /// Build a buffer able to hold at least `requested` items once rounded.
    ///
    /// Fails with [`Error::InvalidCapacity`] when `requested` is zero.
    pub fn new(requested: usize) -> Result<Self> {
        let slots = round_slots(requested)?;
        let storage = (0..slots)
            .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Ok(RingBuffer {
            slots: storage,
            mask: slots - 1,
            write_cursor: CachePadded::new(AtomicUsize::new(0)),
            published_write: CachePadded::new(AtomicUsize::new(0)),
            read_cursor: CachePadded::new(AtomicUsize::new(0)),
            released_read: CachePadded::new(AtomicUsize::new(0)),
        })
    }

    /// Try to append `value`, returning it back if the buffer is full.
    ///
    /// 1. Reserve `write_cursor` by CAS unless the reservation would reach a
    ///    slot not yet released by consumers.
    /// 2. Store the payload in the reserved slot.
    /// 3. Advance `published_write` past the slot once every earlier
    ///    reservation has been published.
    pub fn try_push(&self, value: T) -> std::result::Result<(), T> {
        let write = loop {
            // released first: it can only trail the write cursor loaded after it
            let released = self.released_read.load(Ordering::Acquire);
            let write = self.write_cursor.load(Ordering::Relaxed);
            if write.wrapping_sub(released) >= self.mask {
                return Err(value);
            }
            if self
                .write_cursor
                .compare_exchange_weak(
                    write,
                    write.wrapping_add(1),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                )
                .is_ok()
            {
                break write;
            }
        };

        // SAFETY: the reservation above gives this thread exclusive access to
        // the slot. Its previous occupant sits below `released_read`, so the
        // consumer that claimed it has finished moving it out, and no consumer
        // reads it again until `published_write` passes `write`.
        unsafe {
            (*self.slots[write & self.mask].get()).write(value);
        }

        let backoff = Backoff::new();
        while self
            .published_write
            .compare_exchange_weak(
                write,
                write.wrapping_add(1),
                Ordering::Release,
                Ordering::Relaxed,
            )
            .is_err()
        {
            wait_for_predecessor(&backoff);
        }

        Ok(())
    }

    /// Try to remove the oldest published value.
    ///
    /// Returns `None` when the buffer is empty or when the next slot has been
    /// reserved by a producer that has not published it yet.
    pub fn try_pop(&self) -> Option<T> {
        let read = loop {
            // Acquire pairs with the AcqRel claim below: a consumer that sees
            // `read` also sees the `published_write` its claimer acquired.
            let read = self.read_cursor.load(Ordering::Acquire);
            let published = self.published_write.load(Ordering::Acquire);
            if published.wrapping_sub(read) as isize <= 0 {
                return None;
            }
            if self
                .read_cursor
                .compare_exchange_weak(
                    read,
                    read.wrapping_add(1),
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_ok()
            {
                break read;
            }
        };

        // SAFETY: the slot lies below `published_write` (acquired above), so it
        // holds an initialized value, and winning the CAS makes this thread its
        // only reader. Producers cannot reuse it until `released_read` passes it.
        let value = unsafe { (*self.slots[read & self.mask].get()).assume_init_read() };

        let backoff = Backoff::new();
        while self
            .released_read
            .compare_exchange_weak(
                read,
                read.wrapping_add(1),
                Ordering::Release,
                Ordering::Relaxed,
            )
            .is_err()
        {
            wait_for_predecessor(&backoff);
        }

        Some(value)
    }

    /// Usable capacity: one less than the number of physical slots.
    pub fn capacity(&self) -> usize {
        self.mask
    }

    /// Physical slot count after power-of-two rounding.
    pub fn slots(&self) -> usize {
        self.slots.len()
    }

    /// Number of published, unclaimed values.
    ///
    /// A snapshot only; concurrent pushes and pops may change it immediately.
    pub fn len(&self) -> usize {
        let read = self.read_cursor.load(Ordering::Acquire);
        let published = self.published_write.load(Ordering::Acquire);
        (published.wrapping_sub(read) as isize).clamp(0, self.mask as isize) as usize
    }

    /// True when no published value is waiting to be popped.
    pub fn is_empty(&self) -> bool {
        let read = self.read_cursor.load(Ordering::Acquire);
        let published = self.published_write.load(Ordering::Acquire);
        published.wrapping_sub(read) as isize <= 0
    }

    /// True when a push would currently be refused.
    pub fn is_full(&self) -> bool {
        let released = self.released_read.load(Ordering::Acquire);
        let write = self.write_cursor.load(Ordering::Acquire);
        write.wrapping_sub(released) >= self.mask
    }
}

impl<T> Drop for RingBuffer<T> {
    fn drop(&mut self) {
        // `&mut self` rules out in-flight operations, so every value in
        // [read_cursor, published_write) is initialized and unclaimed.
        let mut read = self.read_cursor.load(Ordering::Relaxed);
        let published = self.published_write.load(Ordering::Relaxed);
        while read != published {
            // SAFETY: see above.
            unsafe { self.slots[read & self.mask].get_mut().assume_init_drop() };
            read = read.wrapping_add(1);
        }
    }
}

impl<T> fmt::Debug for RingBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .finish()
    }
}

impl<T: Send> BoundedQueue<T> for RingBuffer<T> {
    fn try_push(&self, value: T) -> std::result::Result<(), T> {
        RingBuffer::try_push(self, value)
    }

    fn try_pop(&self) -> Option<T> {
        RingBuffer::try_pop(self)
    }

    fn len(&self) -> usize {
        RingBuffer::len(self)
    }

    fn capacity(&self) -> usize {
        RingBuffer::capacity(self)
    }

    fn is_empty(&self) -> bool {
        RingBuffer::is_empty(self)
    }

    fn is_full(&self) -> bool {
        RingBuffer::is_full(self)
    }
}


#[cfg(all(test, not(loom)))]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::VecDeque;

    #[derive(Debug, Clone)]
    enum Op {
        Push(u64),
        Pop,
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![any::<u64>().prop_map(Op::Push), Just(Op::Pop)]
    }

    proptest! {
        /// Single-threaded push/pop sequences behave like a bounded VecDeque.
        #[test]
        fn matches_bounded_deque(
            requested in 1usize..20,
            ops in proptest::collection::vec(op_strategy(), 0..400),
        ) {
            let ring = RingBuffer::<u64>::new(requested).unwrap();
            let cap = ring.capacity();
            let mut model = VecDeque::new();

            for op in ops {
                match op {
                    Op::Push(v) => match ring.try_push(v) {
                        Ok(()) => {
                            prop_assert!(model.len() < cap);
                            model.push_back(v);
                        }
                        Err(back) => {
                            prop_assert_eq!(back, v);
                            prop_assert_eq!(model.len(), cap);
                        }
                    },
                    Op::Pop => prop_assert_eq!(ring.try_pop(), model.pop_front()),
                }
                prop_assert_eq!(ring.len(), model.len());
                prop_assert!(ring.len() <= cap);
            }
        }
    }
}
