//! Point-of-Presence model shared across routing components.
//!
//! One tri-state health enum serves both PoP health (registry, ingress)
//! and path health (failover); the semantics are identical.

use serde::{Deserialize, Serialize};

/// Health state reported for a PoP or path.
///
/// - `Up`: eligible for selection.
/// - `Degraded`: eligible, but policies may deprioritize it.
/// - `Down`: ineligible for selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Health {
    /// Eligible for selection.
    #[default]
    Up,
    /// Eligible but deprioritized.
    Degraded,
    /// Ineligible.
    Down,
}

/// Point-of-presence descriptor.
///
/// Equality is structural over all fields; the registry relies on this
/// for copy-on-write diffs. Uniqueness of `id` within a service is
/// enforced by the registry, not here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pop {
    /// PoP identifier, e.g. `"nyc"`. Unique within a service.
    pub id: String,
    /// Region or group label, e.g. `"us-east"`.
    pub region: String,
    /// Control-plane address as an IPv4/IPv6 literal.
    pub ip: String,
    /// Load-balancing weight.
    #[serde(default = "default_weight")]
    pub weight: u16,
    /// Reported health.
    #[serde(default)]
    pub health: Health,
}

const fn default_weight() -> u16 {
    100
}

impl Pop {
    /// Creates a PoP with default weight and health.
    #[must_use]
    pub fn new(id: impl Into<String>, region: impl Into<String>, ip: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            region: region.into(),
            ip: ip.into(),
            weight: default_weight(),
            health: Health::Up,
        }
    }

    /// Sets the weight.
    #[must_use]
    pub fn with_weight(mut self, weight: u16) -> Self {
        self.weight = weight;
        self
    }

    /// Sets the health state.
    #[must_use]
    pub fn with_health(mut self, health: Health) -> Self {
        self.health = health;
        self
    }
}
