//! Lock-free SPSC ring for inter-thread packet handoff.
//!
//! This module implements a bounded Single-Producer Single-Consumer queue
//! over a power-of-two backing array. One slot is kept open as a sentinel
//! to distinguish full from empty, so usable occupancy is `capacity - 1`.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};

use thiserror::Error;

use crate::{is_power_of_two, CachePadded};

/// Errors reported at ring construction time.
///
/// These are never produced by hot-path operations; `push` and `pop`
/// signal full/empty through their return values instead.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RingError {
    /// Capacity must not be zero.
    #[error("ring capacity must not be zero")]
    CapacityZero,

    /// Capacity must be a power of two.
    #[error("ring capacity must be a power of two")]
    CapacityNotPowerOfTwo,
}

/// Lock-free SPSC ring buffer.
///
/// Exactly one thread may push and exactly one thread may pop. The
/// producer owns `tail`, the consumer owns `head`; each publishes its
/// index with release ordering and reads the opposite index with acquire
/// ordering. Indices live on separate cache lines to prevent false
/// sharing.
///
/// # Capacity
///
/// The backing array holds `capacity` slots but one is reserved as a
/// sentinel, so at most `capacity - 1` elements are in flight at once.
pub struct SpscRing<T> {
    /// Ring storage; slots are initialized only between head and tail.
    buffer: Box<[UnsafeCell<MaybeUninit<T>>]>,
    /// Capacity (power of two).
    capacity: usize,
    /// Index mask: `index & mask == index % capacity`.
    mask: usize,
    /// Consumer index (next slot to read).
    head: CachePadded<AtomicUsize>,
    /// Producer index (next slot to write).
    tail: CachePadded<AtomicUsize>,
}

// Safety: slot handoff is synchronized by the release/acquire pair on the
// indices. Requires the one-producer/one-consumer usage contract.
unsafe impl<T: Send> Send for SpscRing<T> {}
unsafe impl<T: Send> Sync for SpscRing<T> {}

impl<T> SpscRing<T> {
    /// Creates a ring with the given capacity.
    ///
    /// # Errors
    ///
    /// Returns [`RingError::CapacityZero`] or
    /// [`RingError::CapacityNotPowerOfTwo`] if the capacity is invalid.
    /// The capacity is used as-is, never rounded.
    pub fn with_capacity(capacity: usize) -> Result<Self, RingError> {
        if capacity == 0 {
            return Err(RingError::CapacityZero);
        }
        if !is_power_of_two(capacity) {
            return Err(RingError::CapacityNotPowerOfTwo);
        }

        let buffer: Vec<UnsafeCell<MaybeUninit<T>>> = (0..capacity)
            .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
            .collect();

        Ok(Self {
            buffer: buffer.into_boxed_slice(),
            capacity,
            mask: capacity - 1,
            head: CachePadded::new(AtomicUsize::new(0)),
            tail: CachePadded::new(AtomicUsize::new(0)),
        })
    }

    /// Returns the ring capacity. Usable occupancy is `capacity() - 1`.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Pushes a single element.
    ///
    /// Returns `Err(v)` handing the element back when the ring is full.
    /// Must only be called from the producer thread.
    #[inline]
    pub fn push(&self, v: T) -> Result<(), T> {
        let tail = self.tail.0.load(Ordering::Relaxed);
        let next = (tail + 1) & self.mask;
        if next == self.head.0.load(Ordering::Acquire) {
            return Err(v); // full
        }

        // Safety: the slot at `tail` is outside the head..tail window, so
        // the consumer does not touch it until the store below.
        unsafe {
            (*self.buffer[tail].get()).write(v);
        }

        self.tail.0.store(next, Ordering::Release);
        Ok(())
    }

    /// Pops a single element.
    ///
    /// Returns `None` when the ring is empty. Must only be called from
    /// the consumer thread.
    #[inline]
    pub fn pop(&self) -> Option<T> {
        let head = self.head.0.load(Ordering::Relaxed);
        if head == self.tail.0.load(Ordering::Acquire) {
            return None; // empty
        }

        // Safety: the acquire load above pairs with the producer's
        // release store, so the slot at `head` is initialized.
        let v = unsafe { (*self.buffer[head].get()).assume_init_read() };

        self.head.0.store((head + 1) & self.mask, Ordering::Release);
        Some(v)
    }

    /// Returns true if the ring is empty (observer, racy by nature).
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.head.0.load(Ordering::Acquire) == self.tail.0.load(Ordering::Acquire)
    }

    /// Returns true if the ring is full (observer, racy by nature).
    #[inline]
    #[must_use]
    pub fn is_full(&self) -> bool {
        let tail = self.tail.0.load(Ordering::Acquire);
        ((tail + 1) & self.mask) == self.head.0.load(Ordering::Acquire)
    }

    /// Returns the approximate number of elements in the ring.
    ///
    /// Not linearizable across threads; only a hint.
    #[inline]
    #[must_use]
    pub fn approx_len(&self) -> usize {
        let tail = self.tail.0.load(Ordering::Acquire);
        let head = self.head.0.load(Ordering::Acquire);
        (tail + self.capacity - head) & self.mask
    }
}

impl<T> Drop for SpscRing<T> {
    fn drop(&mut self) {
        while self.pop().is_some() {}
    }
}

impl<T> std::fmt::Debug for SpscRing<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpscRing")
            .field("capacity", &self.capacity)
            .field("approx_len", &self.approx_len())
            .field("head", &self.head.0.load(Ordering::Relaxed))
            .field("tail", &self.tail.0.load(Ordering::Relaxed))
            .finish()
    }
}
