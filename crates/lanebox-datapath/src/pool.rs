//! Pre-allocated packet descriptor pool.
//!
//! Free handles ride on an SPSC ring sized at twice the pool capacity, so
//! every handle fits in the ring alongside the one-slot sentinel. The
//! pool itself is not thread-safe as a whole: typical usage assigns the
//! producer/consumer roles of the free ring to fixed threads (RX
//! acquires, TX releases) so the SPSC discipline holds.

use std::cell::UnsafeCell;

use crate::packet::{Packet, PacketHandle};
use crate::ring::{RingError, SpscRing};

/// Fixed-capacity pool of packet descriptors with an SPSC free-list.
///
/// Every handle in `0..capacity` is at all times either in the free ring
/// or held by exactly one in-flight owner.
pub struct PacketPool {
    /// Descriptor storage, addressed by handle.
    storage: Box<[UnsafeCell<Packet>]>,
    /// Free-list of handles (SPSC: one acquiring, one releasing thread).
    free_ring: SpscRing<PacketHandle>,
    /// Pool capacity.
    capacity: usize,
}

// Safety: handle exchange goes through the SPSC free ring; descriptor
// access is tied to handle ownership per the usage contract.
unsafe impl Send for PacketPool {}
unsafe impl Sync for PacketPool {}

impl PacketPool {
    /// Creates a pool with `capacity` descriptors, all initially free.
    ///
    /// # Errors
    ///
    /// Returns a [`RingError`] if `capacity` is zero or not a power of
    /// two (the free ring inherits the SPSC capacity rules).
    pub fn new(capacity: usize) -> Result<Self, RingError> {
        // 2x so all handles fit despite the ring's one-slot sentinel.
        let free_ring = SpscRing::with_capacity(capacity.wrapping_mul(2))?;

        let storage: Vec<UnsafeCell<Packet>> =
            (0..capacity).map(|_| UnsafeCell::new(Packet::new())).collect();

        for handle in 0..capacity {
            // Cannot fail: the ring holds up to 2*capacity - 1 handles.
            let _ = free_ring.push(handle as PacketHandle);
        }

        Ok(Self {
            storage: storage.into_boxed_slice(),
            free_ring,
            capacity,
        })
    }

    /// Returns the pool capacity.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the approximate number of free descriptors.
    #[inline]
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.free_ring.approx_len()
    }

    /// Acquires a free packet handle.
    ///
    /// Returns `None` when the pool is exhausted. Must only be called
    /// from the consuming side of the free ring.
    #[inline]
    pub fn acquire(&self) -> Option<PacketHandle> {
        self.free_ring.pop()
    }

    /// Returns a handle to the pool.
    ///
    /// Returns `Err(handle)` if the free ring is full, which indicates a
    /// double release. Must only be called from the producing side of
    /// the free ring.
    #[inline]
    pub fn release(&self, handle: PacketHandle) -> Result<(), PacketHandle> {
        debug_assert!((handle as usize) < self.capacity, "handle out of range");
        self.free_ring.push(handle)
    }

    /// Returns the descriptor for a handle.
    ///
    /// # Safety
    ///
    /// The handle must be currently acquired from this pool and no
    /// mutable reference to the same descriptor may exist.
    #[inline]
    #[must_use]
    pub unsafe fn get(&self, handle: PacketHandle) -> &Packet {
        debug_assert!((handle as usize) < self.capacity, "handle out of range");
        // Safety: caller holds the handle, so no writer aliases the slot.
        unsafe { &*self.storage[handle as usize].get() }
    }

    /// Returns the descriptor for a handle, mutably.
    ///
    /// # Safety
    ///
    /// The handle must be currently acquired from this pool and the
    /// caller must have exclusive access to it.
    #[inline]
    #[must_use]
    pub unsafe fn get_mut(&self, handle: PacketHandle) -> &mut Packet {
        debug_assert!((handle as usize) < self.capacity, "handle out of range");
        // Safety: handle ownership is exclusive per the usage contract.
        unsafe { &mut *self.storage[handle as usize].get() }
    }
}

impl std::fmt::Debug for PacketPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketPool")
            .field("capacity", &self.capacity)
            .field("free_count", &self.free_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_rejects_invalid_capacity() {
        assert_eq!(PacketPool::new(0).err(), Some(RingError::CapacityZero));
        assert_eq!(
            PacketPool::new(100).err(),
            Some(RingError::CapacityNotPowerOfTwo)
        );
    }

    #[test]
    fn test_pool_seeds_all_handles() {
        let pool = PacketPool::new(64).unwrap();
        assert_eq!(pool.capacity(), 64);
        assert_eq!(pool.free_count(), 64);

        let mut handles = Vec::new();
        while let Some(h) = pool.acquire() {
            handles.push(h);
        }
        assert_eq!(handles.len(), 64);
        assert!(pool.acquire().is_none());

        // All handles are distinct and in range.
        let mut sorted = handles.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), 64);
        assert!(sorted.iter().all(|&h| (h as usize) < 64));

        for h in handles {
            assert!(pool.release(h).is_ok());
        }
        assert_eq!(pool.free_count(), 64);
    }

    #[test]
    fn test_acquire_release_round_trip() {
        let pool = PacketPool::new(8).unwrap();

        let mut drained = Vec::new();
        for _ in 0..8 {
            drained.push(pool.acquire().unwrap());
        }

        // Write metadata, release in order.
        for (i, &h) in drained.iter().enumerate() {
            let pkt = unsafe { pool.get_mut(h) };
            pkt.len = 100 + i as u32;
            pkt.meta = i as u32;
            pool.release(h).unwrap();
        }

        // Re-acquire: FIFO free ring hands back the same order, with the
        // descriptor contents intact.
        for (i, &expected) in drained.iter().enumerate() {
            let h = pool.acquire().unwrap();
            assert_eq!(h, expected);
            let pkt = unsafe { pool.get(h) };
            assert_eq!(pkt.len, 100 + i as u32);
            assert_eq!(pkt.meta, i as u32);
        }
    }

    #[test]
    fn test_conservation_under_churn() {
        let pool = PacketPool::new(16).unwrap();
        let mut in_flight = Vec::new();

        for round in 0..1000 {
            if round % 3 == 0 {
                if let Some(h) = in_flight.pop() {
                    pool.release(h).unwrap();
                }
            } else if let Some(h) = pool.acquire() {
                in_flight.push(h);
            }

            assert_eq!(pool.free_count() + in_flight.len(), 16);
        }

        for h in in_flight {
            pool.release(h).unwrap();
        }
        assert_eq!(pool.free_count(), 16);
    }
}
