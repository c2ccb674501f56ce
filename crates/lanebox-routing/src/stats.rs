//! Decision observability: counters and structured decision events.
//!
//! Counters are cache-padded atomics safe to bump from any worker;
//! events go to the `tracing` subscriber the embedding application
//! installs.

use std::sync::atomic::{AtomicU64, Ordering};

use lanebox_datapath::CachePadded;

use crate::qos::{QosClass, QosScore};

/// Payload describing a single routing decision.
#[derive(Debug, Clone)]
pub struct DecisionEvent {
    /// Caller-provided decision identifier (UUID or monotonic id).
    pub decision_id: String,
    /// Chosen path identifier.
    pub selected_path: String,
    /// Traffic class of the decision.
    pub class: QosClass,
    /// Score of the selected path.
    pub best_score: f64,
    /// Whether threshold compliance was enforced.
    pub strict: bool,
    /// Scores for all candidates considered.
    pub scored: Vec<QosScore>,
    /// Reason label.
    pub reason: String,
}

/// Process-level counters for routing decisions.
#[derive(Debug, Default)]
pub struct DecisionStats {
    /// Total decisions recorded.
    pub decisions: CachePadded<AtomicU64>,
    /// Times a failover was triggered.
    pub failover_triggers: CachePadded<AtomicU64>,
    /// Decisions that selected a non-compliant path.
    pub degraded_choices: CachePadded<AtomicU64>,
    /// Decisions that returned the no-path sentinel.
    pub no_path_choices: CachePadded<AtomicU64>,
    /// Metric reads that exhausted the seqlock retry bound.
    pub stale_metric_reads: CachePadded<AtomicU64>,
}

/// A point-in-time snapshot of decision counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecisionCounters {
    /// Total decisions recorded.
    pub decisions: u64,
    /// Failover triggers.
    pub failover_triggers: u64,
    /// Non-compliant selections.
    pub degraded_choices: u64,
    /// No-path selections.
    pub no_path_choices: u64,
    /// Seqlock retry exhaustions.
    pub stale_metric_reads: u64,
}

impl DecisionStats {
    /// Creates empty statistics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a decision event, updating counters and emitting a
    /// structured trace event.
    pub fn record(&self, event: &DecisionEvent) {
        self.decisions.0.fetch_add(1, Ordering::Relaxed);

        if event.reason.contains("failover") || event.reason.contains("current_down") {
            self.failover_triggers.0.fetch_add(1, Ordering::Relaxed);
        }
        let degraded = event
            .scored
            .iter()
            .any(|s| s.path_id == event.selected_path && !s.within_thresholds);
        if degraded {
            self.degraded_choices.0.fetch_add(1, Ordering::Relaxed);
        }

        tracing::debug!(
            decision_id = %event.decision_id,
            path = %event.selected_path,
            class = ?event.class,
            score = event.best_score,
            strict = event.strict,
            degraded,
            reason = %event.reason,
            "routing decision"
        );
    }

    /// Records a decision that found no usable path.
    #[inline]
    pub fn record_no_path(&self) {
        self.decisions.0.fetch_add(1, Ordering::Relaxed);
        self.no_path_choices.0.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a seqlock read that exhausted its retries.
    #[inline]
    pub fn record_stale_read(&self) {
        self.stale_metric_reads.0.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a snapshot of the counters.
    #[must_use]
    pub fn snapshot(&self) -> DecisionCounters {
        DecisionCounters {
            decisions: self.decisions.0.load(Ordering::Relaxed),
            failover_triggers: self.failover_triggers.0.load(Ordering::Relaxed),
            degraded_choices: self.degraded_choices.0.load(Ordering::Relaxed),
            no_path_choices: self.no_path_choices.0.load(Ordering::Relaxed),
            stale_metric_reads: self.stale_metric_reads.0.load(Ordering::Relaxed),
        }
    }
}
