//! Seqlock-published per-path metrics.
//!
//! Each path has one [`MetricsSlot`] written by a single control-plane
//! thread and read by any number of data-plane workers. The sequence
//! counter is even while the payload is stable and odd while the writer
//! is mid-update; readers copy the payload and accept it only if the
//! counter was even and unchanged across the copy.

use std::cell::UnsafeCell;
use std::ptr;
use std::sync::atomic::{AtomicU32, Ordering};

/// Bounded retry count for seqlock reads. Caps worst-case read latency
/// under heavy writer churn; on exhaustion the caller falls back to its
/// last choice or the no-path sentinel.
const LOAD_RETRIES: u32 = 4;

/// Per-path metrics visible to the data plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathMetrics {
    /// Round-trip time in microseconds.
    pub rtt_us: u32,
    /// One-way delay in microseconds.
    pub one_way_delay_us: u32,
    /// Packet loss in parts per million.
    pub loss_ppm: u32,
    /// Available bandwidth in kbit/s.
    pub avail_kbps: u32,
    /// Traffic class currently assigned to the path (0 = none).
    pub qos_class: u8,
    /// Whether the path is usable.
    pub healthy: bool,
}

impl Default for PathMetrics {
    fn default() -> Self {
        Self {
            rtt_us: u32::MAX,
            one_way_delay_us: u32::MAX,
            loss_ppm: 0,
            avail_kbps: 0,
            qos_class: 0,
            healthy: false,
        }
    }
}

/// Single-writer, many-reader metrics slot.
///
/// Aligned to a cache line so adjacent slots never share one.
///
/// # Invariant
///
/// `seq` even means the payload is stable; odd means the writer is in the
/// middle of an update. Exactly one thread may write a given slot.
#[repr(C, align(64))]
#[derive(Debug, Default)]
pub struct MetricsSlot {
    /// Sequence counter (even = stable, odd = writer active).
    seq: AtomicU32,
    /// Payload; torn reads are detected via `seq`, never returned.
    metrics: UnsafeCell<PathMetrics>,
}

// Safety: readers discard any payload copied while `seq` was odd or
// changed, so the only surviving reads are of fully published data.
unsafe impl Sync for MetricsSlot {}

impl MetricsSlot {
    /// Creates a slot with default (unhealthy) metrics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes new metrics into the slot.
    ///
    /// # Safety
    ///
    /// Exactly one thread may call `publish` on a given slot. Concurrent
    /// writers would race on the payload undetectably.
    pub unsafe fn publish(&self, m: PathMetrics) {
        let start = self.seq.load(Ordering::Relaxed);
        // Writer enters: odd seq parks readers.
        self.seq.store(start | 1, Ordering::Relaxed);
        // Safety: single-writer contract; readers validate via seq.
        unsafe {
            ptr::write_volatile(self.metrics.get(), m);
        }
        // Publish: next even value, release pairs with reader acquire.
        self.seq.store((start | 1).wrapping_add(1), Ordering::Release);
    }

    /// Loads a consistent snapshot of the metrics.
    ///
    /// Returns `None` after [`LOAD_RETRIES`] failed attempts ("no fresh
    /// snapshot"); the caller must fall back to its previous choice or
    /// the no-path sentinel.
    #[inline]
    pub fn load(&self) -> Option<PathMetrics> {
        for _ in 0..LOAD_RETRIES {
            let s1 = self.seq.load(Ordering::Acquire);
            if s1 & 1 != 0 {
                continue; // writer active
            }
            // Safety: a torn copy is possible here and rejected below.
            let snap = unsafe { ptr::read_volatile(self.metrics.get()) };
            let s2 = self.seq.load(Ordering::Acquire);
            if s1 == s2 {
                return Some(snap);
            }
        }
        None
    }

    /// Returns the raw sequence value (diagnostics only).
    #[inline]
    #[must_use]
    pub fn sequence(&self) -> u32 {
        self.seq.load(Ordering::Relaxed)
    }
}
