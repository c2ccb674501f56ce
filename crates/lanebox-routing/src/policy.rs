//! Path-selection policies for the data plane.
//!
//! All three choosers share the same shape: given a candidate set and a
//! per-packet context, return a path id. They are allocation-free, never
//! block, and read per-path metrics through the seqlock slots.

use std::sync::atomic::{AtomicU32, Ordering};

use lanebox_datapath::{MetricsSlot, PathMetrics};

/// Path identifier. `0` is the no-path sentinel.
pub type PathId = u32;

/// Minimal per-packet context used by policies.
#[derive(Debug, Clone, Copy, Default)]
pub struct PacketContext {
    /// Flow hash computed at ingress.
    pub flow_hash: u32,
    /// DSCP codepoint carried by the packet.
    pub dscp: u8,
}

/// Reference to a candidate path: id plus its metrics slot.
///
/// The slot reference outlives any use within a single packet decision;
/// the candidate set itself is rebuilt per packet from the registry
/// snapshot.
#[derive(Debug, Clone, Copy)]
pub struct CandidateRef<'a> {
    /// Path identifier (nonzero).
    pub id: PathId,
    /// Metrics slot for the path.
    pub slot: &'a MetricsSlot,
}

/// A path chooser invoked per packet.
pub trait PathPolicy: Send + Sync {
    /// Chooses a path from `candidates` for the packet in `pkt`.
    ///
    /// Returns the no-path sentinel `0` only when `candidates` is empty.
    fn choose(&self, candidates: &[CandidateRef<'_>], pkt: &PacketContext) -> PathId;
}

/// QoS class / DSCP match predicate.
///
/// TODO: replace the weak non-zero-class match with a lookup against the
/// configured DSCP↔class table once it is plumbed through to policies.
#[inline]
fn qos_match(path_class: u8, _dscp: u8) -> bool {
    path_class != 0
}

/// xorshift32 PRNG for the exploration branch; cheap and seedable from
/// per-packet state.
struct XorShift32 {
    state: u32,
}

impl XorShift32 {
    fn new(seed: u32) -> Self {
        Self {
            state: if seed == 0 { 0x9E37_79B9 } else { seed },
        }
    }

    fn next(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        x
    }

    fn next_bounded(&mut self, bound: u32) -> u32 {
        if bound == 0 {
            0
        } else {
            self.next() % bound
        }
    }
}

/// Round-robin over the candidate set, skipping unhealthy paths.
#[derive(Debug, Default)]
pub struct RoundRobinPolicy {
    idx: AtomicU32,
}

impl RoundRobinPolicy {
    /// Creates a policy starting at the first candidate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl PathPolicy for RoundRobinPolicy {
    fn choose(&self, candidates: &[CandidateRef<'_>], _pkt: &PacketContext) -> PathId {
        let n = candidates.len() as u32;
        if n == 0 {
            return 0;
        }
        let start = self.idx.fetch_add(1, Ordering::Relaxed) % n;

        for i in 0..n {
            let k = ((start + i) % n) as usize;
            if let Some(m) = candidates[k].slot.load() {
                if m.healthy {
                    return candidates[k].id;
                }
            }
        }
        // All unhealthy or unreadable: degrade to the starting slot.
        candidates[start as usize].id
    }
}

/// Stable flow-hash mapping onto the candidate set.
///
/// A flow keeps hitting the same candidate while it stays healthy; with
/// `skip_unhealthy` the mapping advances past unhealthy candidates and
/// returns once they recover.
#[derive(Debug)]
pub struct FlowHashPolicy {
    skip_unhealthy: bool,
}

impl Default for FlowHashPolicy {
    fn default() -> Self {
        Self::new(true)
    }
}

impl FlowHashPolicy {
    /// Creates a policy; `skip_unhealthy` enables forward scanning past
    /// unhealthy candidates.
    #[must_use]
    pub const fn new(skip_unhealthy: bool) -> Self {
        Self { skip_unhealthy }
    }
}

impl PathPolicy for FlowHashPolicy {
    fn choose(&self, candidates: &[CandidateRef<'_>], pkt: &PacketContext) -> PathId {
        let n = candidates.len() as u32;
        if n == 0 {
            return 0;
        }
        let base = pkt.flow_hash % n;
        if !self.skip_unhealthy {
            return candidates[base as usize].id;
        }

        for i in 0..n {
            let k = ((base + i) % n) as usize;
            if let Some(m) = candidates[k].slot.load() {
                if m.healthy {
                    return candidates[k].id;
                }
            }
        }
        // Keep the mapping stable even when everything is unhealthy.
        candidates[base as usize].id
    }
}

/// Configuration for [`LatencyAwarePolicy`].
#[derive(Debug, Clone, Copy)]
pub struct LatencyAwareConfig {
    /// RTT window within which QoS class preference breaks ties, in µs.
    pub tie_margin_us: u32,
    /// Probability per million of exploring a non-best healthy path.
    pub explore_ppm: u32,
    /// Whether QoS class matching participates in tie-breaks.
    pub prefer_qos_class: bool,
}

impl Default for LatencyAwareConfig {
    fn default() -> Self {
        Self {
            tie_margin_us: 200,
            explore_ppm: 0,
            prefer_qos_class: true,
        }
    }
}

/// Minimum-RTT chooser with QoS tie-breaking and optional exploration.
#[derive(Debug)]
pub struct LatencyAwarePolicy {
    cfg: LatencyAwareConfig,
    /// Perturbed after each exploration so repeat flows explore
    /// different alternatives.
    salt: AtomicU32,
}

impl Default for LatencyAwarePolicy {
    fn default() -> Self {
        Self::new(LatencyAwareConfig::default())
    }
}

impl LatencyAwarePolicy {
    /// Creates a policy with the given configuration.
    #[must_use]
    pub const fn new(cfg: LatencyAwareConfig) -> Self {
        Self {
            cfg,
            salt: AtomicU32::new(0xA5A5_5A5A),
        }
    }
}

impl PathPolicy for LatencyAwarePolicy {
    fn choose(&self, candidates: &[CandidateRef<'_>], pkt: &PacketContext) -> PathId {
        if candidates.is_empty() {
            return 0;
        }

        // Min-RTT among healthy candidates, QoS class as tie-breaker.
        let mut best: usize = 0;
        let mut best_metrics = PathMetrics::default();
        let mut have_best = false;

        for (i, cand) in candidates.iter().enumerate() {
            let Some(m) = cand.slot.load() else { continue };
            if !m.healthy {
                continue;
            }
            if !have_best || m.rtt_us < best_metrics.rtt_us {
                best = i;
                best_metrics = m;
                have_best = true;
            } else if self.cfg.prefer_qos_class {
                let close = m.rtt_us <= best_metrics.rtt_us.saturating_add(self.cfg.tie_margin_us);
                if close
                    && qos_match(m.qos_class, pkt.dscp)
                    && !qos_match(best_metrics.qos_class, pkt.dscp)
                {
                    best = i;
                    best_metrics = m;
                }
            }
        }

        if !have_best {
            // No healthy candidate: absolute minimum RTT, deterministic.
            let mut idx = 0;
            let mut min_rtt = u32::MAX;
            let mut found = false;
            for (i, cand) in candidates.iter().enumerate() {
                let Some(m) = cand.slot.load() else { continue };
                if !found || m.rtt_us < min_rtt {
                    idx = i;
                    min_rtt = m.rtt_us;
                    found = true;
                }
            }
            return candidates[if found { idx } else { 0 }].id;
        }

        if self.cfg.explore_ppm > 0 {
            let mut rng = XorShift32::new(pkt.flow_hash ^ self.salt.load(Ordering::Relaxed));
            if rng.next_bounded(1_000_000) < self.cfg.explore_ppm {
                let n = candidates.len() as u32;
                let start = rng.next_bounded(n);
                for i in 0..n {
                    let k = ((start + i) % n) as usize;
                    if k == best {
                        continue;
                    }
                    if let Some(m) = candidates[k].slot.load() {
                        if m.healthy {
                            self.salt.fetch_add(0x9E37, Ordering::Relaxed);
                            return candidates[k].id;
                        }
                    }
                }
            }
        }

        candidates[best].id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn healthy(rtt_us: u32, qos_class: u8) -> PathMetrics {
        PathMetrics {
            rtt_us,
            one_way_delay_us: rtt_us / 2,
            loss_ppm: 0,
            avail_kbps: 100_000,
            qos_class,
            healthy: true,
        }
    }

    fn unhealthy(rtt_us: u32) -> PathMetrics {
        PathMetrics {
            healthy: false,
            ..healthy(rtt_us, 0)
        }
    }

    fn slots(metrics: &[PathMetrics]) -> Vec<MetricsSlot> {
        metrics
            .iter()
            .map(|m| {
                let slot = MetricsSlot::new();
                unsafe { slot.publish(*m) };
                slot
            })
            .collect()
    }

    fn candidates(slots: &[MetricsSlot]) -> Vec<CandidateRef<'_>> {
        slots
            .iter()
            .enumerate()
            .map(|(i, slot)| CandidateRef {
                id: i as PathId + 1,
                slot,
            })
            .collect()
    }

    #[test]
    fn test_empty_candidates_is_sentinel() {
        let pkt = PacketContext::default();
        assert_eq!(RoundRobinPolicy::new().choose(&[], &pkt), 0);
        assert_eq!(FlowHashPolicy::default().choose(&[], &pkt), 0);
        assert_eq!(LatencyAwarePolicy::default().choose(&[], &pkt), 0);
    }

    #[test]
    fn test_round_robin_rotates() {
        let s = slots(&[healthy(1000, 0), healthy(1000, 0), healthy(1000, 0)]);
        let cands = candidates(&s);
        let policy = RoundRobinPolicy::new();
        let pkt = PacketContext::default();

        let picks: Vec<PathId> = (0..6).map(|_| policy.choose(&cands, &pkt)).collect();
        assert_eq!(picks, vec![1, 2, 3, 1, 2, 3]);
    }

    #[test]
    fn test_round_robin_skips_unhealthy() {
        let s = slots(&[healthy(1000, 0), unhealthy(500), healthy(1000, 0)]);
        let cands = candidates(&s);
        let policy = RoundRobinPolicy::new();
        let pkt = PacketContext::default();

        for _ in 0..10 {
            assert_ne!(policy.choose(&cands, &pkt), 2);
        }
    }

    #[test]
    fn test_round_robin_degrades_when_all_unhealthy() {
        let s = slots(&[unhealthy(1), unhealthy(2)]);
        let cands = candidates(&s);
        let policy = RoundRobinPolicy::new();
        let pkt = PacketContext::default();

        // Still returns some candidate rather than the sentinel.
        assert_ne!(policy.choose(&cands, &pkt), 0);
    }

    #[test]
    fn test_flow_hash_is_stable() {
        let s = slots(&[healthy(1000, 0), healthy(1000, 0), healthy(1000, 0)]);
        let cands = candidates(&s);
        let policy = FlowHashPolicy::default();

        let pkt = PacketContext {
            flow_hash: 7,
            dscp: 0,
        };
        let first = policy.choose(&cands, &pkt);
        for _ in 0..50 {
            assert_eq!(policy.choose(&cands, &pkt), first);
        }
        assert_eq!(first, 2); // 7 % 3 == 1 -> second candidate
    }

    #[test]
    fn test_flow_hash_skips_unhealthy_then_returns() {
        let metrics = [healthy(1000, 0), unhealthy(500), healthy(1000, 0)];
        let s = slots(&metrics);
        let cands = candidates(&s);
        let policy = FlowHashPolicy::default();
        let pkt = PacketContext {
            flow_hash: 1, // maps onto the unhealthy candidate
            dscp: 0,
        };

        assert_eq!(policy.choose(&cands, &pkt), 3);

        // Candidate recovers: the original mapping resumes.
        unsafe { s[1].publish(healthy(500, 0)) };
        assert_eq!(policy.choose(&cands, &pkt), 2);
    }

    #[test]
    fn test_flow_hash_unconditional_when_not_skipping() {
        let s = slots(&[healthy(1000, 0), unhealthy(500)]);
        let cands = candidates(&s);
        let policy = FlowHashPolicy::new(false);
        let pkt = PacketContext {
            flow_hash: 1,
            dscp: 0,
        };

        assert_eq!(policy.choose(&cands, &pkt), 2);
    }

    #[test]
    fn test_latency_aware_picks_min_rtt() {
        let s = slots(&[healthy(3000, 0), healthy(1200, 0), healthy(2000, 0)]);
        let cands = candidates(&s);
        let policy = LatencyAwarePolicy::default();

        assert_eq!(policy.choose(&cands, &PacketContext::default()), 2);
    }

    #[test]
    fn test_latency_aware_qos_tie_break() {
        // Candidate 2 is 100 us slower (within the 200 us margin) but
        // carries a QoS class; it wins the tie-break.
        let s = slots(&[healthy(1000, 0), healthy(1100, 3)]);
        let cands = candidates(&s);
        let policy = LatencyAwarePolicy::default();

        let pkt = PacketContext {
            flow_hash: 0,
            dscp: 0x2E,
        };
        assert_eq!(policy.choose(&cands, &pkt), 2);
    }

    #[test]
    fn test_latency_aware_outside_margin_keeps_min() {
        let s = slots(&[healthy(1000, 0), healthy(1500, 3)]);
        let cands = candidates(&s);
        let policy = LatencyAwarePolicy::default();

        let pkt = PacketContext {
            flow_hash: 0,
            dscp: 0x2E,
        };
        assert_eq!(policy.choose(&cands, &pkt), 1);
    }

    #[test]
    fn test_latency_aware_no_healthy_falls_back_to_min_rtt() {
        let s = slots(&[unhealthy(3000), unhealthy(900), unhealthy(2000)]);
        let cands = candidates(&s);
        let policy = LatencyAwarePolicy::default();

        assert_eq!(policy.choose(&cands, &PacketContext::default()), 2);
    }

    #[test]
    fn test_latency_aware_exploration_stays_healthy() {
        let s = slots(&[healthy(1000, 0), healthy(2000, 0), unhealthy(100)]);
        let cands = candidates(&s);
        let policy = LatencyAwarePolicy::new(LatencyAwareConfig {
            explore_ppm: 1_000_000, // always explore
            ..LatencyAwareConfig::default()
        });

        for flow in 0..64u32 {
            let pkt = PacketContext {
                flow_hash: flow,
                dscp: 0,
            };
            let pick = policy.choose(&cands, &pkt);
            // Never the unhealthy candidate, never the sentinel.
            assert!(pick == 1 || pick == 2);
        }
    }
}
