//! # lanebox-datapath
//!
//! Hot-path memory and publication primitives for the LaneBox router.
//!
//! Everything in this crate is built for the packet path: no locks, no
//! allocation, no panics once a structure is constructed. The control
//! plane owns construction and single-writer updates; data-plane workers
//! only ever read or move values through pre-sized structures.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      LaneBox Datapath                        │
//! │                                                              │
//! │  ┌──────────────┐    ┌──────────────┐    ┌──────────────┐    │
//! │  │ Packet Pool  │ ─→ │  SPSC Ring   │ ─→ │  Datapath    │    │
//! │  │ (free-list)  │    │  (handoff)   │    │  Statistics  │    │
//! │  └──────────────┘    └──────────────┘    └──────────────┘    │
//! │         ↑                   ↑                                │
//! │    Pre-allocated       1P/1C design     ┌──────────────┐     │
//! │    descriptors         No locks         │ Metrics Slot │     │
//! │                                         │  (seqlock)   │     │
//! │                                         └──────────────┘     │
//! └──────────────────────────────────────────────────────────────┘
//! ```

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod metrics;
pub mod packet;
pub mod pool;
pub mod ring;
pub mod stats;

pub use metrics::{MetricsSlot, PathMetrics};
pub use packet::{Packet, PacketHandle};
pub use pool::PacketPool;
pub use ring::{RingError, SpscRing};
pub use stats::DatapathStats;

/// Cache line size for padding (64 bytes on most architectures).
pub const CACHE_LINE_SIZE: usize = 64;

/// Default ring capacity (must be a power of 2).
pub const DEFAULT_RING_CAPACITY: usize = 4096;

/// Default packet pool capacity (must be a power of 2).
pub const DEFAULT_POOL_CAPACITY: usize = 8192;

/// Cache line padding to prevent false sharing.
#[repr(C, align(64))]
#[derive(Debug, Default)]
pub struct CachePadded<T>(pub T);

impl<T> CachePadded<T> {
    /// Creates a new cache-padded value.
    #[inline]
    pub const fn new(value: T) -> Self {
        Self(value)
    }

    /// Returns a reference to the inner value.
    #[inline]
    pub const fn get(&self) -> &T {
        &self.0
    }

    /// Returns a mutable reference to the inner value.
    #[inline]
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.0
    }
}

/// Checks if a value is a nonzero power of 2.
#[inline]
#[must_use]
pub const fn is_power_of_two(n: usize) -> bool {
    n != 0 && (n & (n - 1)) == 0
}
