//! Ingress selection: deterministic local policy or route-informed
//! anycast delegation.
//!
//! The PoP list, configuration, and oracle attachment are all published
//! through `ArcSwap`, so control-plane reloads never block the workers
//! calling [`IngressSelector::choose`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::{ArcSwap, ArcSwapOption};
use serde::{Deserialize, Serialize};

use crate::oracle::AnycastOracle;
use crate::pop::Pop;

/// Default salt for the hashing strategies.
pub const DEFAULT_HASH_SEED: u64 = 0xA17A_5EED;

/// Local deterministic strategies for selecting an ingress PoP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IngressStrategy {
    /// Monotonic round-robin over the configured PoP list.
    #[default]
    RoundRobin,
    /// Hash the source IP into a PoP index.
    HashSourceIp,
    /// Hash the 5-tuple into a PoP index.
    Hash5Tuple,
}

/// Top-level mode: app-layer policy vs route-informed anycast best path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IngressMode {
    /// App-layer RR/hash; no routing consult.
    #[default]
    PolicyDeterministic,
    /// Anycast best path via the attached oracle.
    RouteInformed,
}

/// Configuration for ingress selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressConfig {
    /// High-level mode.
    pub mode: IngressMode,
    /// Local strategy for the deterministic path.
    pub strategy: IngressStrategy,
    /// Salt for the hashing strategies.
    pub seed: u64,
}

impl Default for IngressConfig {
    fn default() -> Self {
        Self {
            mode: IngressMode::PolicyDeterministic,
            strategy: IngressStrategy::RoundRobin,
            seed: DEFAULT_HASH_SEED,
        }
    }
}

/// Selects the ingress PoP for a request.
///
/// Safe to call from many workers concurrently: the round-robin counter
/// is a single atomic and all replaceable state is snapshot-swapped.
pub struct IngressSelector {
    cfg: ArcSwap<IngressConfig>,
    pops: ArcSwap<Vec<Pop>>,
    // Boxed because the swap slot needs a thin pointer.
    oracle: ArcSwapOption<Box<dyn AnycastOracle>>,
    rr: AtomicU64,
}

impl Default for IngressSelector {
    fn default() -> Self {
        Self::new(IngressConfig::default())
    }
}

impl IngressSelector {
    /// Creates a selector with no PoPs and no oracle.
    #[must_use]
    pub fn new(cfg: IngressConfig) -> Self {
        Self {
            cfg: ArcSwap::from_pointee(cfg),
            pops: ArcSwap::from_pointee(Vec::new()),
            oracle: ArcSwapOption::empty(),
            rr: AtomicU64::new(0),
        }
    }

    /// Loads or replaces the set of available PoPs.
    pub fn load_pops(&self, pops: Vec<Pop>) {
        tracing::debug!(count = pops.len(), "loaded ingress PoPs");
        self.pops.store(Arc::new(pops));
    }

    /// Replaces the configuration.
    pub fn update_config(&self, cfg: IngressConfig) {
        self.cfg.store(Arc::new(cfg));
    }

    /// Attaches an oracle for route-informed mode.
    pub fn attach_oracle(&self, oracle: Box<dyn AnycastOracle>) {
        self.oracle.store(Some(Arc::new(oracle)));
    }

    /// Detaches the oracle; route-informed mode falls back to the
    /// deterministic policy.
    pub fn detach_oracle(&self) {
        self.oracle.store(None);
    }

    /// Chooses an ingress PoP without client information.
    ///
    /// Returns an empty identifier when no PoPs are configured.
    #[must_use]
    pub fn choose(&self, service_id: &str) -> String {
        self.choose_inner(service_id, None)
    }

    /// Chooses an ingress PoP for a specific client.
    ///
    /// Enables client-aware oracle answers, and feeds the client address
    /// into the hashing strategies.
    #[must_use]
    pub fn choose_for_client(&self, service_id: &str, client_src_ip: &str) -> String {
        self.choose_inner(service_id, Some(client_src_ip))
    }

    fn choose_inner(&self, service_id: &str, client_src_ip: Option<&str>) -> String {
        let cfg = **self.cfg.load();

        if cfg.mode == IngressMode::RouteInformed {
            if let Some(oracle) = self.oracle.load_full() {
                if let Some(pop) = oracle.serving_pop(service_id, client_src_ip) {
                    return pop;
                }
            }
            // No oracle or no answer: fall through to local policy.
        }

        let flow_hash = client_src_ip.map_or(0, |ip| fnv1a(ip.as_bytes()));
        self.choose_deterministic(&cfg, flow_hash)
    }

    fn choose_deterministic(&self, cfg: &IngressConfig, flow_hash: u64) -> String {
        let pops = self.pops.load();
        if pops.is_empty() {
            return String::new();
        }
        let n = pops.len() as u64;

        let idx = match cfg.strategy {
            IngressStrategy::RoundRobin => self.rr.fetch_add(1, Ordering::Relaxed) % n,
            IngressStrategy::HashSourceIp | IngressStrategy::Hash5Tuple => {
                mix(flow_hash, cfg.seed) % n
            }
        };
        pops[idx as usize].id.clone()
    }
}

impl std::fmt::Debug for IngressSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cfg = **self.cfg.load();
        f.debug_struct("IngressSelector")
            .field("cfg", &cfg)
            .field("pops", &self.pops.load().len())
            .field("oracle", &self.oracle.load().is_some())
            .finish()
    }
}

/// Two-stage 64-bit avalanche mix (splitmix64/wyhash lineage).
#[inline]
#[must_use]
pub fn mix(mut x: u64, seed: u64) -> u64 {
    const PHI: u64 = 0x9e37_79b9_7f4a_7c15;
    const M1: u64 = 0xff51_afd7_ed55_8ccd;
    const M2: u64 = 0xc4ce_b9fe_1a85_ec53;

    x ^= seed
        .wrapping_add(PHI)
        .wrapping_add(x << 6)
        .wrapping_add(x >> 2);
    x = (x ^ (x >> 33)).wrapping_mul(M1);
    x = (x ^ (x >> 33)).wrapping_mul(M2);
    x ^ (x >> 33)
}

/// FNV-1a over raw bytes, used to derive a flow hash from a client
/// address for the hashing strategies.
#[inline]
fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for &b in bytes {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}
