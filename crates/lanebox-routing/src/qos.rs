//! QoS policy: per-class thresholds and weighted scoring of candidate
//! paths.
//!
//! Read-mostly and deterministic. Metrics are normalized against the
//! class targets, blended with configurable weights into a scalar score
//! in `[0, 1]`, and accompanied by a binary compliance flag.

use serde::{Deserialize, Serialize};

/// Best Effort: 000000.
pub const DSCP_BE: u8 = 0x00;
/// Class Selector 1: 001000.
pub const DSCP_CS1: u8 = 0x08;
/// Assured Forwarding 31: 101000.
pub const DSCP_AF31: u8 = 0x28;
/// Expedited Forwarding: 101110.
pub const DSCP_EF: u8 = 0x2E;

/// Application-level traffic classes, mapped to DSCP PHBs by config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum QosClass {
    /// Backups and sync; latency-insensitive.
    Bulk = 0,
    /// Default class.
    #[default]
    BestEffort = 1,
    /// Latency-sensitive but tolerant.
    Interactive = 2,
    /// Voice/video; most stringent.
    Realtime = 3,
}

impl QosClass {
    /// Number of traffic classes.
    pub const COUNT: usize = 4;

    /// All classes, in threshold-table order.
    pub const ALL: [Self; Self::COUNT] =
        [Self::Bulk, Self::BestEffort, Self::Interactive, Self::Realtime];

    #[inline]
    const fn index(self) -> usize {
        self as usize
    }
}

/// SLO-style targets used for normalization and compliance checks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QosThresholds {
    /// Target ceiling for latency in microseconds.
    pub max_latency_us: u32,
    /// Target ceiling for jitter in microseconds.
    pub max_jitter_us: u32,
    /// Target ceiling for packet loss as a fraction in `[0, 1]`.
    pub max_loss: f64,
}

impl Default for QosThresholds {
    fn default() -> Self {
        Self {
            max_latency_us: 10_000,
            max_jitter_us: 5_000,
            max_loss: 0.01,
        }
    }
}

/// Relative importance of each metric in the blended score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QosWeights {
    /// Weight of the latency component.
    pub latency: f64,
    /// Weight of the jitter component.
    pub jitter: f64,
    /// Weight of the loss component.
    pub loss: f64,
}

impl Default for QosWeights {
    fn default() -> Self {
        Self {
            latency: 0.6,
            jitter: 0.3,
            loss: 0.1,
        }
    }
}

/// Telemetry snapshot of a path, as supplied by the metrics collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathSample {
    /// Stable path identifier, e.g. `"pop_sfo_primary"`.
    pub path_id: String,
    /// Measured latency in microseconds.
    pub latency_us: u32,
    /// Measured jitter in microseconds.
    pub jitter_us: u32,
    /// Measured packet loss ratio in `[0, 1]`.
    pub loss: f64,
}

impl PathSample {
    /// Creates a sample for a path.
    #[must_use]
    pub fn new(path_id: impl Into<String>, latency_us: u32, jitter_us: u32, loss: f64) -> Self {
        Self {
            path_id: path_id.into(),
            latency_us,
            jitter_us,
            loss,
        }
    }
}

/// Scoring result for a path. Higher score is better.
#[derive(Debug, Clone, PartialEq)]
pub struct QosScore {
    /// Path identifier scored.
    pub path_id: String,
    /// Blended score in `[0, 1]`.
    pub score: f64,
    /// True if all metrics meet the class targets.
    pub within_thresholds: bool,
}

/// Configuration bundle for QoS scoring and DSCP mapping.
///
/// Thresholds and DSCP codepoints are stored per class in fixed arrays
/// indexed by [`QosClass`], so lookups never allocate and every class
/// always has an entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QosConfig {
    /// Targets per class, indexed by `QosClass as usize`.
    pub thresholds: [QosThresholds; QosClass::COUNT],
    /// Blend weights.
    pub weights: QosWeights,
    /// DSCP codepoint (6 bits) per class.
    pub dscp: [u8; QosClass::COUNT],
}

impl Default for QosConfig {
    fn default() -> Self {
        Self {
            thresholds: [
                // Bulk: 20 ms / 10 ms / 5%
                QosThresholds {
                    max_latency_us: 20_000,
                    max_jitter_us: 10_000,
                    max_loss: 0.05,
                },
                // BestEffort: 15 ms / 8 ms / 2%
                QosThresholds {
                    max_latency_us: 15_000,
                    max_jitter_us: 8_000,
                    max_loss: 0.02,
                },
                // Interactive: 8 ms / 3 ms / 1%
                QosThresholds {
                    max_latency_us: 8_000,
                    max_jitter_us: 3_000,
                    max_loss: 0.01,
                },
                // Realtime: 4 ms / 1.5 ms / 0.5%
                QosThresholds {
                    max_latency_us: 4_000,
                    max_jitter_us: 1_500,
                    max_loss: 0.005,
                },
            ],
            weights: QosWeights::default(),
            dscp: [DSCP_CS1, DSCP_BE, DSCP_AF31, DSCP_EF],
        }
    }
}

/// QoS policy over a read-mostly configuration.
///
/// Safe for concurrent readers; the control plane replaces the
/// configuration wholesale through [`QosPolicy::update_config`].
#[derive(Debug, Clone, Default)]
pub struct QosPolicy {
    cfg: QosConfig,
}

impl QosPolicy {
    /// Creates a policy with the given configuration.
    #[must_use]
    pub fn new(cfg: QosConfig) -> Self {
        Self { cfg }
    }

    /// Looks up the DSCP codepoint (6 bits) for a class.
    ///
    /// Falls back to Best Effort for anything left unmapped in config.
    #[inline]
    #[must_use]
    pub fn dscp(&self, class: QosClass) -> u8 {
        self.cfg.dscp[class.index()]
    }

    /// Scores a single path against the class targets and weights.
    #[must_use]
    pub fn score_path(&self, sample: &PathSample, class: QosClass) -> QosScore {
        let th = &self.cfg.thresholds[class.index()];

        // ~1.0 means "meets target"; worse values decay toward 0.
        let nlat = normalize(f64::from(sample.latency_us), f64::from(th.max_latency_us));
        let njit = normalize(f64::from(sample.jitter_us), f64::from(th.max_jitter_us));
        let nloss = normalize(sample.loss, th.max_loss);

        let within_thresholds = sample.latency_us <= th.max_latency_us
            && sample.jitter_us <= th.max_jitter_us
            && sample.loss <= th.max_loss;

        QosScore {
            path_id: sample.path_id.clone(),
            score: blend(nlat, njit, nloss, &self.cfg.weights),
            within_thresholds,
        }
    }

    /// Chooses the best candidate among paths.
    ///
    /// With `strict` set, compliant candidates are preferred; if none
    /// complies, the best overall is returned so traffic is never
    /// blackholed. Returns `None` only when `candidates` is empty.
    #[must_use]
    pub fn choose_best(
        &self,
        candidates: &[PathSample],
        class: QosClass,
        strict: bool,
    ) -> Option<QosScore> {
        let mut best: Option<QosScore> = None;

        for sample in candidates {
            let s = self.score_path(sample, class);
            if strict && !s.within_thresholds {
                continue;
            }
            if best.as_ref().is_none_or(|b| s.score > b.score) {
                best = Some(s);
            }
        }

        // Nothing complied: take the best overall instead of blackholing.
        if best.is_none() && strict {
            for sample in candidates {
                let s = self.score_path(sample, class);
                if best.as_ref().is_none_or(|b| s.score > b.score) {
                    best = Some(s);
                }
            }
        }

        best
    }

    /// Returns the current configuration.
    #[must_use]
    pub fn config(&self) -> &QosConfig {
        &self.cfg
    }

    /// Replaces the configuration wholesale (single control-plane writer).
    pub fn update_config(&mut self, cfg: QosConfig) {
        tracing::debug!("replaced QoS configuration");
        self.cfg = cfg;
    }
}

/// Normalizes a metric against its target: `m <= t` maps to 1.0 and
/// worse values decay smoothly toward 0. A zero target yields 0.0
/// (non-compliant by construction, avoids division by zero).
fn normalize(value: f64, target: f64) -> f64 {
    if target <= 0.0 {
        return 0.0;
    }
    let ratio = value / target;
    1.0 / (1.0 + (ratio - 1.0).max(0.0))
}

/// Blends the normalized components with weights and clamps to `[0, 1]`.
fn blend(nlat: f64, njit: f64, nloss: f64, w: &QosWeights) -> f64 {
    let sum = (w.latency + w.jitter + w.loss).max(1e-9);
    let raw = nlat.mul_add(w.latency, njit.mul_add(w.jitter, nloss * w.loss)) / sum;
    raw.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dscp_defaults() {
        let policy = QosPolicy::default();
        assert_eq!(policy.dscp(QosClass::Bulk), DSCP_CS1);
        assert_eq!(policy.dscp(QosClass::BestEffort), DSCP_BE);
        assert_eq!(policy.dscp(QosClass::Interactive), DSCP_AF31);
        assert_eq!(policy.dscp(QosClass::Realtime), DSCP_EF);
    }

    #[test]
    fn test_compliant_path_scores_one() {
        let policy = QosPolicy::default();
        // Realtime targets: 4000 us / 1500 us / 0.5%.
        let sample = PathSample::new("pa", 3000, 1000, 0.001);

        let s = policy.score_path(&sample, QosClass::Realtime);
        assert!((s.score - 1.0).abs() < 1e-9);
        assert!(s.within_thresholds);
    }

    #[test]
    fn test_violating_path_scores_below_one() {
        let policy = QosPolicy::default();
        let sample = PathSample::new("pb", 6000, 2000, 0.01);

        let s = policy.score_path(&sample, QosClass::Realtime);
        assert!(s.score < 1.0);
        assert!(!s.within_thresholds);
    }

    #[test]
    fn test_choose_best_strict_prefers_compliant() {
        let policy = QosPolicy::default();
        let a = PathSample::new("pa", 3000, 1000, 0.001);
        let b = PathSample::new("pb", 6000, 2000, 0.01);

        let best = policy
            .choose_best(&[a, b], QosClass::Realtime, true)
            .unwrap();
        assert_eq!(best.path_id, "pa");
        assert!(best.within_thresholds);
    }

    #[test]
    fn test_choose_best_strict_falls_back_when_none_comply() {
        let policy = QosPolicy::default();
        let worse = PathSample::new("pw", 20_000, 9_000, 0.2);
        let bad = PathSample::new("pb", 50_000, 20_000, 0.5);

        // Neither complies with Realtime; strict mode must still pick
        // the better of the two rather than returning nothing.
        let best = policy
            .choose_best(&[worse, bad], QosClass::Realtime, true)
            .unwrap();
        assert_eq!(best.path_id, "pw");
        assert!(!best.within_thresholds);
    }

    #[test]
    fn test_choose_best_empty_is_none() {
        let policy = QosPolicy::default();
        assert!(policy.choose_best(&[], QosClass::Bulk, true).is_none());
        assert!(policy.choose_best(&[], QosClass::Bulk, false).is_none());
    }

    #[test]
    fn test_zero_target_is_non_compliant() {
        let mut cfg = QosConfig::default();
        cfg.thresholds[QosClass::Bulk as usize].max_latency_us = 0;
        let policy = QosPolicy::new(cfg);

        let s = policy.score_path(&PathSample::new("pz", 0, 0, 0.0), QosClass::Bulk);
        // Latency component normalizes to 0; score drops accordingly.
        assert!(s.score < 1.0);
    }

    #[test]
    fn test_score_bounds() {
        let policy = QosPolicy::default();
        let extremes = [
            PathSample::new("p0", 0, 0, 0.0),
            PathSample::new("p1", u32::MAX, u32::MAX, 1.0),
            PathSample::new("p2", 1, u32::MAX, 0.0),
        ];

        for class in QosClass::ALL {
            for sample in &extremes {
                let s = policy.score_path(sample, class);
                assert!((0.0..=1.0).contains(&s.score), "score out of bounds");
            }
        }
    }

    #[test]
    fn test_dominance_monotonicity() {
        let policy = QosPolicy::default();

        // A dominates B in every metric, so A must never score lower.
        let cases = [
            ((1000, 500, 0.001), (2000, 900, 0.02)),
            ((8000, 3000, 0.01), (8000, 3001, 0.01)),
            ((0, 0, 0.0), (1, 0, 0.0)),
        ];

        for class in QosClass::ALL {
            for ((la, ja, lo_a), (lb, jb, lo_b)) in cases {
                let a = policy.score_path(&PathSample::new("pa", la, ja, lo_a), class);
                let b = policy.score_path(&PathSample::new("pb", lb, jb, lo_b), class);
                assert!(a.score >= b.score, "dominated path outscored dominant");
            }
        }
    }
}
