//! Aggregate router configuration.
//!
//! The control plane owns one [`RouterConfig`] and replaces sub-configs
//! wholesale on its components. Defaults carry the documented production
//! values; file parsing lives with the embedding application.

use serde::{Deserialize, Serialize};

use crate::failover::FailoverConfig;
use crate::ingress::IngressConfig;
use crate::qos::QosConfig;

/// Aggregate of the sub-configs required by the control plane.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RouterConfig {
    /// QoS thresholds, weights, and DSCP mapping.
    #[serde(default)]
    pub qos: QosConfig,
    /// Failover hysteresis and return-to-primary.
    #[serde(default)]
    pub failover: FailoverConfig,
    /// Ingress mode, strategy, and hash seed.
    #[serde(default)]
    pub ingress: IngressConfig,
}
