//! Anycast oracle: which PoP would routing actually deliver to?
//!
//! The ingress selector consults an [`AnycastOracle`] in route-informed
//! mode and never inspects oracle internals. [`SimulatedBgpOracle`] is a
//! table-driven stand-in with the standard BGP tie-breaker order, good
//! until a live routing daemon is hooked up.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

/// Answers "which PoP serves this anycast service for this client?".
pub trait AnycastOracle: Send + Sync {
    /// Returns the serving PoP id, if the oracle knows one.
    ///
    /// `client_src_ip` enables client-aware answers; `None` asks for the
    /// best overall.
    fn serving_pop(&self, service_id: &str, client_src_ip: Option<&str>) -> Option<String>;
}

/// Simulated BGP route candidate to a given service (anycast prefix).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimRoute {
    /// Candidate PoP.
    pub pop_id: String,
    /// Local preference; higher wins.
    pub local_pref: u32,
    /// AS-path length; lower wins.
    pub as_path_len: u32,
    /// Multi-exit discriminator; lower wins.
    pub med: u32,
    /// IGP cost to the next hop; lower wins.
    pub igp_cost: u32,
}

impl SimRoute {
    /// Creates a route with default attributes.
    #[must_use]
    pub fn new(pop_id: impl Into<String>) -> Self {
        Self {
            pop_id: pop_id.into(),
            local_pref: 100,
            as_path_len: 2,
            med: 100,
            igp_cost: 100,
        }
    }

    /// Sets the local preference.
    #[must_use]
    pub const fn with_local_pref(mut self, local_pref: u32) -> Self {
        self.local_pref = local_pref;
        self
    }

    /// Sets the AS-path length.
    #[must_use]
    pub const fn with_as_path_len(mut self, as_path_len: u32) -> Self {
        self.as_path_len = as_path_len;
        self
    }

    /// Sets the MED.
    #[must_use]
    pub const fn with_med(mut self, med: u32) -> Self {
        self.med = med;
        self
    }

    /// Sets the IGP cost.
    #[must_use]
    pub const fn with_igp_cost(mut self, igp_cost: u32) -> Self {
        self.igp_cost = igp_cost;
        self
    }

    /// BGP-style preference: true if `self` beats `other`.
    fn beats(&self, other: &Self) -> bool {
        // local-pref DESC, as-path ASC, MED ASC, IGP ASC, then
        // lexicographic pop_id as the final deterministic tiebreaker.
        (
            std::cmp::Reverse(self.local_pref),
            self.as_path_len,
            self.med,
            self.igp_cost,
            &self.pop_id,
        ) < (
            std::cmp::Reverse(other.local_pref),
            other.as_path_len,
            other.med,
            other.igp_cost,
            &other.pop_id,
        )
    }
}

/// Route-informed oracle backed by static simulated BGP attributes.
#[derive(Debug, Clone, Default)]
pub struct SimulatedBgpOracle {
    routes: HashMap<String, Vec<SimRoute>>,
}

impl SimulatedBgpOracle {
    /// Creates an oracle with no routes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the simulator's route table.
    pub fn load_routes(&mut self, routes: HashMap<String, Vec<SimRoute>>) {
        self.routes = routes;
    }

    /// Adds candidate routes for a service.
    pub fn add_routes(&mut self, service_id: impl Into<String>, routes: Vec<SimRoute>) {
        self.routes.insert(service_id.into(), routes);
    }
}

impl AnycastOracle for SimulatedBgpOracle {
    fn serving_pop(&self, service_id: &str, _client_src_ip: Option<&str>) -> Option<String> {
        let candidates = self.routes.get(service_id)?;
        let mut best = candidates.first()?;
        for route in candidates {
            if route.beats(best) {
                best = route;
            }
        }
        Some(best.pop_id.clone())
    }
}
