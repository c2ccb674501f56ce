//! Dynamic policy binding: the data-plane entry point.
//!
//! The control plane publishes a `(chooser fn, state pointer)` pair under
//! the same even/odd seqlock discipline as the metrics slots. Data-plane
//! workers snapshot the pair per packet and invoke the chooser without
//! any locking or dynamic dispatch. The fn-pointer encoding is
//! intentional: publishing a new policy swaps two words, and the hot
//! path pays one indirect call.

use std::sync::atomic::{AtomicPtr, AtomicU32, Ordering};

use crate::policy::{CandidateRef, PacketContext, PathId, PathPolicy};

/// Bounded retry count for binding snapshots, matching the metrics slots.
const SNAPSHOT_RETRIES: u32 = 4;

/// Type-erased chooser invoked by the data plane.
type ChooseFn = unsafe fn(*const (), &[CandidateRef<'_>], &PacketContext) -> PathId;

/// Monomorphized trampoline from the erased pair back to `P::choose`.
unsafe fn choose_thunk<P: PathPolicy>(
    state: *const (),
    candidates: &[CandidateRef<'_>],
    pkt: &PacketContext,
) -> PathId {
    // Safety: `state` was produced from a `&P` in `publish` and the
    // publisher keeps the referent alive per the publish contract.
    unsafe { &*state.cast::<P>() }.choose(candidates, pkt)
}

/// Seqlock-published policy binding.
///
/// Exactly one publisher thread; any number of reader threads. Aligned
/// to a cache line so the binding never false-shares with neighbors.
#[repr(C, align(64))]
#[derive(Debug)]
pub struct PolicyBinding {
    /// Sequence counter (even = stable, odd = publisher active).
    seq: AtomicU32,
    /// Erased chooser fn pointer; null when cleared.
    chooser: AtomicPtr<()>,
    /// Erased policy state pointer; null when cleared.
    state: AtomicPtr<()>,
}

impl Default for PolicyBinding {
    fn default() -> Self {
        Self::new()
    }
}

impl PolicyBinding {
    /// Creates an empty binding; `select` returns the sentinel until a
    /// policy is published.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            seq: AtomicU32::new(0),
            chooser: AtomicPtr::new(std::ptr::null_mut()),
            state: AtomicPtr::new(std::ptr::null_mut()),
        }
    }

    /// Publishes `policy` as the active chooser.
    ///
    /// # Safety
    ///
    /// The caller must keep `policy` alive and unmoved until it is
    /// certain no reader can still observe this publication: after a
    /// subsequent [`clear`](Self::clear) or re-publish, readers mid-
    /// flight may still hold the old pair, so the referent must outlive
    /// a quiescent point (e.g. all workers having completed their
    /// current packet). Exactly one thread may publish to a binding.
    pub unsafe fn publish<P: PathPolicy>(&self, policy: &P) {
        let start = self.seq.load(Ordering::Relaxed);
        // Publisher enters: odd seq parks readers.
        self.seq.store(start | 1, Ordering::Relaxed);
        self.state
            .store((policy as *const P).cast_mut().cast(), Ordering::Relaxed);
        self.chooser
            .store(choose_thunk::<P> as ChooseFn as *mut (), Ordering::Relaxed);
        // Publish even seq; release pairs with reader acquire.
        self.seq.store((start | 1).wrapping_add(1), Ordering::Release);
        tracing::debug!("published policy binding");
    }

    /// Clears the binding; `select` returns the sentinel afterwards.
    ///
    /// The previously bound policy must still outlive in-flight readers
    /// (see [`publish`](Self::publish)).
    pub fn clear(&self) {
        let start = self.seq.load(Ordering::Relaxed);
        self.seq.store(start | 1, Ordering::Relaxed);
        self.state.store(std::ptr::null_mut(), Ordering::Relaxed);
        self.chooser.store(std::ptr::null_mut(), Ordering::Relaxed);
        self.seq.store((start | 1).wrapping_add(1), Ordering::Release);
        tracing::debug!("cleared policy binding");
    }

    /// Snapshots the current `(chooser, state)` pair.
    ///
    /// Returns `None` on retry exhaustion or when the binding is
    /// cleared.
    #[inline]
    fn snapshot(&self) -> Option<(ChooseFn, *const ())> {
        for _ in 0..SNAPSHOT_RETRIES {
            let s1 = self.seq.load(Ordering::Acquire);
            if s1 & 1 != 0 {
                continue; // publisher active
            }
            let state = self.state.load(Ordering::Relaxed);
            let chooser = self.chooser.load(Ordering::Relaxed);
            let s2 = self.seq.load(Ordering::Acquire);
            if s1 == s2 {
                if chooser.is_null() || state.is_null() {
                    return None;
                }
                // Safety: the pointer was stored from a `ChooseFn` in
                // `publish`; the seqlock check proves the pair is from
                // one publication.
                let f = unsafe { std::mem::transmute::<*mut (), ChooseFn>(chooser) };
                return Some((f, state.cast_const()));
            }
        }
        None
    }

    /// Resolves the current policy and chooses a path.
    ///
    /// Returns the sentinel `0` when no policy is bound or no stable
    /// snapshot could be taken within the retry bound; callers keep
    /// their last path or count a degraded choice.
    #[inline]
    #[must_use]
    pub fn select(&self, candidates: &[CandidateRef<'_>], pkt: &PacketContext) -> PathId {
        match self.snapshot() {
            // Safety: pair validity is guaranteed by the publish
            // contract and the seqlock consistency check.
            Some((f, state)) => unsafe { f(state, candidates, pkt) },
            None => 0,
        }
    }
}
