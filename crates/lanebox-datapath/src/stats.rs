//! Performance statistics for the datapath.
//!
//! Cache-line aligned counters so workers on different cores never false
//! share while updating them.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::CachePadded;

/// Datapath performance statistics.
#[derive(Debug, Default)]
pub struct DatapathStats {
    /// Packets handed to egress.
    pub tx_packets: CachePadded<AtomicU64>,
    /// Bytes handed to egress.
    pub tx_bytes: CachePadded<AtomicU64>,
    /// Egress packets dropped on a full ring.
    pub tx_dropped: CachePadded<AtomicU64>,

    /// Packets taken from ingress.
    pub rx_packets: CachePadded<AtomicU64>,
    /// Bytes taken from ingress.
    pub rx_bytes: CachePadded<AtomicU64>,
    /// Ingress packets dropped on a full ring.
    pub rx_dropped: CachePadded<AtomicU64>,

    /// Packet pool exhaustion events (acquire with no free handle).
    pub pool_exhausted: CachePadded<AtomicU64>,
}

impl DatapathStats {
    /// Creates empty statistics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records transmitted packets.
    #[inline]
    pub fn record_tx(&self, packets: u64, bytes: u64) {
        self.tx_packets.0.fetch_add(packets, Ordering::Relaxed);
        self.tx_bytes.0.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Records a TX drop.
    #[inline]
    pub fn record_tx_drop(&self) {
        self.tx_dropped.0.fetch_add(1, Ordering::Relaxed);
    }

    /// Records received packets.
    #[inline]
    pub fn record_rx(&self, packets: u64, bytes: u64) {
        self.rx_packets.0.fetch_add(packets, Ordering::Relaxed);
        self.rx_bytes.0.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Records an RX drop.
    #[inline]
    pub fn record_rx_drop(&self) {
        self.rx_dropped.0.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a pool exhaustion event.
    #[inline]
    pub fn record_pool_exhausted(&self) {
        self.pool_exhausted.0.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a point-in-time snapshot of the counters.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            tx_packets: self.tx_packets.0.load(Ordering::Relaxed),
            tx_bytes: self.tx_bytes.0.load(Ordering::Relaxed),
            tx_dropped: self.tx_dropped.0.load(Ordering::Relaxed),
            rx_packets: self.rx_packets.0.load(Ordering::Relaxed),
            rx_bytes: self.rx_bytes.0.load(Ordering::Relaxed),
            rx_dropped: self.rx_dropped.0.load(Ordering::Relaxed),
            pool_exhausted: self.pool_exhausted.0.load(Ordering::Relaxed),
        }
    }

    /// Resets all counters to zero.
    pub fn reset(&self) {
        self.tx_packets.0.store(0, Ordering::Relaxed);
        self.tx_bytes.0.store(0, Ordering::Relaxed);
        self.tx_dropped.0.store(0, Ordering::Relaxed);
        self.rx_packets.0.store(0, Ordering::Relaxed);
        self.rx_bytes.0.store(0, Ordering::Relaxed);
        self.rx_dropped.0.store(0, Ordering::Relaxed);
        self.pool_exhausted.0.store(0, Ordering::Relaxed);
    }
}

/// A point-in-time snapshot of datapath statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Packets transmitted.
    pub tx_packets: u64,
    /// Bytes transmitted.
    pub tx_bytes: u64,
    /// TX drops.
    pub tx_dropped: u64,
    /// Packets received.
    pub rx_packets: u64,
    /// Bytes received.
    pub rx_bytes: u64,
    /// RX drops.
    pub rx_dropped: u64,
    /// Pool exhaustion events.
    pub pool_exhausted: u64,
}

impl StatsSnapshot {
    /// Total packets across both directions.
    #[inline]
    #[must_use]
    pub const fn total_packets(&self) -> u64 {
        self.tx_packets + self.rx_packets
    }

    /// Computes the delta between two snapshots.
    #[must_use]
    pub fn delta(&self, prev: &Self) -> Self {
        Self {
            tx_packets: self.tx_packets.saturating_sub(prev.tx_packets),
            tx_bytes: self.tx_bytes.saturating_sub(prev.tx_bytes),
            tx_dropped: self.tx_dropped.saturating_sub(prev.tx_dropped),
            rx_packets: self.rx_packets.saturating_sub(prev.rx_packets),
            rx_bytes: self.rx_bytes.saturating_sub(prev.rx_bytes),
            rx_dropped: self.rx_dropped.saturating_sub(prev.rx_dropped),
            pool_exhausted: self.pool_exhausted.saturating_sub(prev.pool_exhausted),
        }
    }
}

impl std::fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Datapath Statistics:")?;
        writeln!(
            f,
            "  TX: {} packets, {} bytes, {} dropped",
            self.tx_packets, self.tx_bytes, self.tx_dropped
        )?;
        writeln!(
            f,
            "  RX: {} packets, {} bytes, {} dropped",
            self.rx_packets, self.rx_bytes, self.rx_dropped
        )?;
        writeln!(f, "  Pool: {} exhaustion events", self.pool_exhausted)?;
        Ok(())
    }
}
