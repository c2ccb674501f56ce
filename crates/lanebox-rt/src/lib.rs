//! # lanebox-rt
//!
//! Real-time scheduling helpers for worker threads: pin the calling
//! thread to a CPU and apply a fixed-priority scheduling policy.
//!
//! The routing core never depends on this for correctness, only for
//! latency. Failures (missing privileges, unsupported platform) are
//! non-fatal by design; use [`apply_best_effort`] on worker entry.

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

use thiserror::Error;

/// Real-time priority profile for dataplane threads.
///
/// Values are mid-band to leave headroom for exceptional tasks. Linux
/// `SCHED_{FIFO,RR}` priorities typically range over `1..=99`. Prefer
/// `RoundRobin` when several threads share one priority, to reduce
/// starvation.
pub mod prio {
    /// General-purpose RT work (telemetry, soft real-time tasks).
    pub const DEFAULT: i32 = 50;
    /// Ingress worker (RX); preempts `DEFAULT`.
    pub const RX: i32 = 60;
    /// Egress worker (TX); above RX to drain queues promptly.
    pub const TX: i32 = 70;
    /// Critical short-lived tasks (watchdog). Use sparingly.
    pub const WATCHDOG: i32 = 80;
}

/// Errors from applying RT configuration to the current thread.
#[derive(Debug, Error)]
pub enum RtError {
    /// CPU affinity could not be applied.
    #[error("failed to set CPU affinity: {0}")]
    Affinity(std::io::Error),

    /// Scheduling policy/priority could not be applied.
    #[error("failed to set scheduling policy: {0}")]
    Scheduler(std::io::Error),

    /// RT scheduling is not supported on this platform.
    #[error("real-time scheduling is not supported on this platform")]
    Unsupported,
}

/// Real-time scheduling policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RtPolicy {
    /// Fixed priority, run-to-block.
    #[default]
    Fifo,
    /// Fixed priority, time-sliced among equal priorities.
    RoundRobin,
}

/// RT configuration for the current thread.
///
/// There is no default `priority`: pick one explicitly, normally from
/// [`prio`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtConfig {
    /// CPU index to pin to; `None` skips pinning.
    pub cpu: Option<usize>,
    /// Desired scheduling policy.
    pub policy: RtPolicy,
    /// RT priority.
    pub priority: i32,
}

impl RtConfig {
    /// Creates a config with the given policy and priority, no pinning.
    #[must_use]
    pub const fn new(policy: RtPolicy, priority: i32) -> Self {
        Self {
            cpu: None,
            policy,
            priority,
        }
    }

    /// Pins the thread to a CPU.
    #[must_use]
    pub const fn on_cpu(mut self, cpu: usize) -> Self {
        self.cpu = Some(cpu);
        self
    }
}

/// Applies CPU affinity (optional) and the RT policy/priority to the
/// current thread.
///
/// Affinity is applied first so the thread does not migrate after
/// becoming real-time.
///
/// # Errors
///
/// Returns an [`RtError`] if either step fails (typically insufficient
/// privileges) or the platform is unsupported.
pub fn bind_and_prioritize(cfg: &RtConfig) -> Result<(), RtError> {
    imp::bind_and_prioritize(cfg)
}

/// Like [`bind_and_prioritize`], but logs failures and continues.
///
/// Worker threads call this on entry; running without RT scheduling is
/// degraded, not broken.
pub fn apply_best_effort(cfg: &RtConfig) {
    if let Err(err) = bind_and_prioritize(cfg) {
        tracing::warn!(
            cpu = ?cfg.cpu,
            policy = ?cfg.policy,
            priority = cfg.priority,
            %err,
            "could not apply RT scheduling; continuing without it"
        );
    }
}

#[cfg(target_os = "linux")]
mod imp {
    use super::{RtConfig, RtError, RtPolicy};
    use nix::sched::{sched_setaffinity, CpuSet};
    use nix::unistd::Pid;

    fn set_affinity(cpu: Option<usize>) -> Result<(), RtError> {
        let Some(cpu) = cpu else { return Ok(()) };
        let mut set = CpuSet::new();
        set.set(cpu)
            .map_err(|e| RtError::Affinity(std::io::Error::from(e)))?;
        // Pid 0 targets the calling thread.
        sched_setaffinity(Pid::from_raw(0), &set)
            .map_err(|e| RtError::Affinity(std::io::Error::from(e)))
    }

    fn set_sched(policy: RtPolicy, priority: i32) -> Result<(), RtError> {
        let native = match policy {
            RtPolicy::Fifo => libc::SCHED_FIFO,
            RtPolicy::RoundRobin => libc::SCHED_RR,
        };
        let param = libc::sched_param {
            sched_priority: priority,
        };
        // Safety: plain syscall on the calling thread with a valid param.
        let rc = unsafe { libc::pthread_setschedparam(libc::pthread_self(), native, &param) };
        if rc == 0 {
            Ok(())
        } else {
            Err(RtError::Scheduler(std::io::Error::from_raw_os_error(rc)))
        }
    }

    pub fn bind_and_prioritize(cfg: &RtConfig) -> Result<(), RtError> {
        set_affinity(cfg.cpu)?;
        set_sched(cfg.policy, cfg.priority)
    }
}

#[cfg(not(target_os = "linux"))]
mod imp {
    use super::{RtConfig, RtError};

    pub fn bind_and_prioritize(_cfg: &RtConfig) -> Result<(), RtError> {
        Err(RtError::Unsupported)
    }
}
