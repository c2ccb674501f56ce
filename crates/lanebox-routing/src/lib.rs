//! # lanebox-routing
//!
//! Routing state for the LaneBox router, organized around a strict
//! control-plane / data-plane split: a single control-plane writer
//! mutates the registry, metrics, configs, and the policy binding, while
//! data-plane workers read all of it at packet rate without locks,
//! allocation, or panics.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                        Control Plane                           │
//! │  ServiceRegistry ── QosPolicy ── FailoverPolicy ── Ingress     │
//! │        │ (RCU publish)                │ (seqlock publish)      │
//! ├────────┼──────────────────────────────┼────────────────────────┤
//! │        ↓                              ↓                        │
//! │   snapshot map                  PolicyBinding                  │
//! │        │                              │                        │
//! │        └──── candidates ──→ RoundRobin | FlowHash | Latency    │
//! │                                       │                        │
//! │                        Data Plane     ↓   path id              │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Readers may observe state that is one publish interval stale, but
//! never a torn or partially applied update.

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod binding;
pub mod config;
pub mod error;
pub mod failover;
pub mod ingress;
pub mod oracle;
pub mod policy;
pub mod pop;
pub mod qos;
pub mod registry;
pub mod stats;

pub use binding::PolicyBinding;
pub use config::RouterConfig;
pub use error::{RegistryError, Result};
pub use failover::{FailoverConfig, FailoverDecision, FailoverPolicy, PathHealth};
pub use ingress::{IngressConfig, IngressMode, IngressSelector, IngressStrategy};
pub use oracle::{AnycastOracle, SimRoute, SimulatedBgpOracle};
pub use policy::{
    CandidateRef, FlowHashPolicy, LatencyAwareConfig, LatencyAwarePolicy, PacketContext, PathId,
    PathPolicy, RoundRobinPolicy,
};
pub use pop::{Health, Pop};
pub use qos::{PathSample, QosClass, QosConfig, QosPolicy, QosScore, QosThresholds, QosWeights};
pub use registry::{RegistryStats, ServiceMap, ServiceRegistry};
pub use stats::{DecisionEvent, DecisionStats};
