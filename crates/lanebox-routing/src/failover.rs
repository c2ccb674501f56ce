//! Failover policy with hysteresis and optional return-to-primary.
//!
//! The policy is a stateless evaluator: the caller owns the per-path
//! health records and their transition timestamps, and asks for a
//! decision at a point in time. Dwell timers prevent path flapping.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::pop::Health;
use crate::qos::QosScore;

/// Decision reason: the current path is down.
pub const REASON_CURRENT_DOWN: &str = "current_down";
/// Decision reason: the current path has no score.
pub const REASON_NO_CURRENT_SCORE: &str = "no_current_score";
/// Decision reason: a candidate beats the current path by the margin.
pub const REASON_BETTER_CANDIDATE: &str = "better_candidate_with_margin";
/// Decision reason: the primary path recovered.
pub const REASON_RETURN_TO_PRIMARY: &str = "return_to_primary";

/// Configuration for failover hysteresis and return-to-primary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailoverConfig {
    /// Preferred path identifier; empty disables return-to-primary.
    pub primary_path_id: String,
    /// Whether to switch back to the primary once it recovers.
    pub return_to_primary: bool,
    /// Relative score improvement required to switch away.
    pub improve_pct_to_switch: f64,
    /// Dwell time on the current path before switching, in ms.
    pub min_hold_ms: u32,
    /// Time the primary must remain healthy before returning, in ms.
    pub recovery_hold_ms: u32,
}

impl Default for FailoverConfig {
    fn default() -> Self {
        Self {
            primary_path_id: String::new(),
            return_to_primary: true,
            improve_pct_to_switch: 0.10,
            min_hold_ms: 3000,
            recovery_hold_ms: 5000,
        }
    }
}

/// Health state of a path and the time of its last transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathHealth {
    /// Path identifier.
    pub path_id: String,
    /// Current health state.
    pub state: Health,
    /// Last state change (steady clock). `None` means the path has never
    /// transitioned and dwell timers never hold it back.
    pub last_change: Option<Instant>,
}

impl PathHealth {
    /// Creates a record with no recorded transition.
    #[must_use]
    pub fn new(path_id: impl Into<String>, state: Health) -> Self {
        Self {
            path_id: path_id.into(),
            state,
            last_change: None,
        }
    }

    /// Sets the last transition time.
    #[must_use]
    pub const fn changed_at(mut self, at: Instant) -> Self {
        self.last_change = Some(at);
        self
    }
}

/// Result of a failover evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailoverDecision {
    /// Path to switch to.
    pub next_path_id: String,
    /// Reason label for logs and counters.
    pub reason: &'static str,
}

/// Decides whether and when to switch paths based on score and health.
#[derive(Debug, Clone, Default)]
pub struct FailoverPolicy {
    cfg: FailoverConfig,
}

impl FailoverPolicy {
    /// Creates a policy with the given configuration.
    #[must_use]
    pub fn new(cfg: FailoverConfig) -> Self {
        Self { cfg }
    }

    /// Returns the current configuration.
    #[must_use]
    pub fn config(&self) -> &FailoverConfig {
        &self.cfg
    }

    /// Replaces the configuration.
    pub fn update_config(&mut self, cfg: FailoverConfig) {
        self.cfg = cfg;
    }

    /// Evaluates the need to switch away from `current_path_id`.
    ///
    /// Returns `Some` with the target path and reason when a switch is
    /// recommended, `None` to keep the current path. Paths without a
    /// health record are treated as `Down` (conservative). First match
    /// wins:
    ///
    /// 1. current path down → best non-down candidate,
    /// 2. current path unscored → best candidate,
    /// 3. candidate beats current by the configured margin after the
    ///    minimum hold,
    /// 4. recovered primary after the recovery hold,
    /// 5. otherwise keep.
    #[must_use]
    pub fn evaluate(
        &self,
        current_path_id: &str,
        scored_candidates: &[QosScore],
        health: &[PathHealth],
        now: Instant,
    ) -> Option<FailoverDecision> {
        let current_state = state_of(current_path_id, health);
        let current_score = find_score(scored_candidates, current_path_id);
        let current_last_change = last_change_of(current_path_id, health);

        // Best non-down candidate (first wins on ties); nothing usable
        // means keep current.
        let mut best: Option<&QosScore> = None;
        for s in scored_candidates {
            if state_of(&s.path_id, health) == Health::Down {
                continue;
            }
            if best.is_none_or(|b| s.score > b.score) {
                best = Some(s);
            }
        }
        let best = best?;

        if current_state == Health::Down {
            return Some(FailoverDecision {
                next_path_id: best.path_id.clone(),
                reason: REASON_CURRENT_DOWN,
            });
        }

        match current_score {
            None => {
                return Some(FailoverDecision {
                    next_path_id: best.path_id.clone(),
                    reason: REASON_NO_CURRENT_SCORE,
                });
            }
            Some(cur) => {
                let needed = cur.score * (1.0 + self.cfg.improve_pct_to_switch);
                if best.path_id != current_path_id
                    && best.score >= needed
                    && hold_elapsed(current_last_change, now, self.cfg.min_hold_ms)
                {
                    return Some(FailoverDecision {
                        next_path_id: best.path_id.clone(),
                        reason: REASON_BETTER_CANDIDATE,
                    });
                }
            }
        }

        if self.cfg.return_to_primary
            && !self.cfg.primary_path_id.is_empty()
            && self.cfg.primary_path_id != current_path_id
        {
            let primary = &self.cfg.primary_path_id;
            if let Some(primary_score) = find_score(scored_candidates, primary) {
                if state_of(primary, health) != Health::Down
                    && primary_score.score >= best.score
                    && hold_elapsed(last_change_of(primary, health), now, self.cfg.recovery_hold_ms)
                {
                    return Some(FailoverDecision {
                        next_path_id: primary.clone(),
                        reason: REASON_RETURN_TO_PRIMARY,
                    });
                }
            }
        }

        None
    }
}

fn find_score<'a>(scores: &'a [QosScore], path_id: &str) -> Option<&'a QosScore> {
    scores.iter().find(|s| s.path_id == path_id)
}

/// Unknown paths are treated as down.
fn state_of(path_id: &str, health: &[PathHealth]) -> Health {
    health
        .iter()
        .find(|h| h.path_id == path_id)
        .map_or(Health::Down, |h| h.state)
}

fn last_change_of(path_id: &str, health: &[PathHealth]) -> Option<Instant> {
    health
        .iter()
        .find(|h| h.path_id == path_id)
        .and_then(|h| h.last_change)
}

/// A path with no recorded transition is always eligible.
fn hold_elapsed(last_change: Option<Instant>, now: Instant, hold_ms: u32) -> bool {
    last_change.is_none_or(|last| {
        now.saturating_duration_since(last) >= Duration::from_millis(u64::from(hold_ms))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(path_id: &str, score: f64) -> QosScore {
        QosScore {
            path_id: path_id.to_owned(),
            score,
            within_thresholds: true,
        }
    }

    #[test]
    fn test_current_down_switches_immediately() {
        let policy = FailoverPolicy::default();
        let t0 = Instant::now();

        let scores = [score("p1", 1.0), score("p2", 0.5)];
        let health = [
            PathHealth::new("p1", Health::Down).changed_at(t0),
            PathHealth::new("p2", Health::Up).changed_at(t0),
        ];

        let d = policy.evaluate("p1", &scores, &health, t0).unwrap();
        assert_eq!(d.next_path_id, "p2");
        assert_eq!(d.reason, REASON_CURRENT_DOWN);
    }

    #[test]
    fn test_no_candidates_keeps_current() {
        let policy = FailoverPolicy::default();
        let now = Instant::now();

        // All candidates down: nothing to switch to, even though the
        // current path is down too.
        let scores = [score("p2", 1.0)];
        let health = [PathHealth::new("p2", Health::Down)];
        assert!(policy.evaluate("p1", &scores, &health, now).is_none());

        // No scores at all.
        assert!(policy.evaluate("p1", &[], &[], now).is_none());
    }

    #[test]
    fn test_unscored_current_switches_to_best() {
        let policy = FailoverPolicy::default();
        let now = Instant::now();

        let scores = [score("p2", 0.8), score("p3", 0.9)];
        let health = [
            PathHealth::new("p1", Health::Up),
            PathHealth::new("p2", Health::Up),
            PathHealth::new("p3", Health::Up),
        ];

        let d = policy.evaluate("p1", &scores, &health, now).unwrap();
        assert_eq!(d.next_path_id, "p3");
        assert_eq!(d.reason, REASON_NO_CURRENT_SCORE);
    }

    #[test]
    fn test_hysteresis_holds_then_switches() {
        let policy = FailoverPolicy::default();
        let t0 = Instant::now();

        let scores = [score("p1", 1.0), score("p2", 1.20)];
        let health = [
            PathHealth::new("p1", Health::Up).changed_at(t0),
            PathHealth::new("p2", Health::Up).changed_at(t0),
        ];

        // Margin is met (1.20 >= 1.10) but the hold has not elapsed.
        let at_1s = t0 + Duration::from_millis(1000);
        assert!(policy.evaluate("p1", &scores, &health, at_1s).is_none());

        // After min_hold_ms the switch goes through.
        let at_3_5s = t0 + Duration::from_millis(3500);
        let d = policy.evaluate("p1", &scores, &health, at_3_5s).unwrap();
        assert_eq!(d.next_path_id, "p2");
        assert_eq!(d.reason, REASON_BETTER_CANDIDATE);
    }

    #[test]
    fn test_insufficient_margin_never_switches() {
        let policy = FailoverPolicy::default();
        let t0 = Instant::now();

        // 1.05 < 1.0 * 1.10: below the required improvement.
        let scores = [score("p1", 1.0), score("p2", 1.05)];
        let health = [
            PathHealth::new("p1", Health::Up).changed_at(t0),
            PathHealth::new("p2", Health::Up).changed_at(t0),
        ];

        let much_later = t0 + Duration::from_secs(60);
        assert!(policy.evaluate("p1", &scores, &health, much_later).is_none());
    }

    #[test]
    fn test_missing_health_is_down() {
        let policy = FailoverPolicy::default();
        let now = Instant::now();

        // p2 has a score but no health record: treated as down, so it is
        // not eligible as a candidate.
        let scores = [score("p1", 1.0), score("p2", 2.0)];
        let health = [PathHealth::new("p1", Health::Up)];

        assert!(policy.evaluate("p1", &scores, &health, now).is_none());
    }

    #[test]
    fn test_return_to_primary_after_recovery_hold() {
        let policy = FailoverPolicy::new(FailoverConfig {
            primary_path_id: "p1".to_owned(),
            ..FailoverConfig::default()
        });
        let t0 = Instant::now();

        // Primary recovered with a score matching the best candidate.
        let scores = [score("p1", 0.9), score("p2", 0.9)];
        let health = [
            PathHealth::new("p1", Health::Up).changed_at(t0),
            PathHealth::new("p2", Health::Up).changed_at(t0),
        ];

        // Recovery hold (5000 ms) not yet elapsed.
        let early = t0 + Duration::from_millis(4000);
        assert!(policy.evaluate("p2", &scores, &health, early).is_none());

        let late = t0 + Duration::from_millis(5500);
        let d = policy.evaluate("p2", &scores, &health, late).unwrap();
        assert_eq!(d.next_path_id, "p1");
        assert_eq!(d.reason, REASON_RETURN_TO_PRIMARY);
    }

    #[test]
    fn test_return_to_primary_disabled() {
        let policy = FailoverPolicy::new(FailoverConfig {
            primary_path_id: "p1".to_owned(),
            return_to_primary: false,
            ..FailoverConfig::default()
        });

        let scores = [score("p1", 0.9), score("p2", 0.9)];
        let health = [
            PathHealth::new("p1", Health::Up),
            PathHealth::new("p2", Health::Up),
        ];

        assert!(policy
            .evaluate("p2", &scores, &health, Instant::now())
            .is_none());
    }

    #[test]
    fn test_no_transition_time_is_always_eligible() {
        let policy = FailoverPolicy::default();
        let now = Instant::now();

        // Current path has no recorded transition: the hold never
        // applies and the margin alone decides.
        let scores = [score("p1", 1.0), score("p2", 1.5)];
        let health = [
            PathHealth::new("p1", Health::Up),
            PathHealth::new("p2", Health::Up),
        ];

        let d = policy.evaluate("p1", &scores, &health, now).unwrap();
        assert_eq!(d.next_path_id, "p2");
        assert_eq!(d.reason, REASON_BETTER_CANDIDATE);
    }
}
