//! [`Generation`]: `spec.md` §3's `AllocatableResourceGeneration`, promoted to
//! a first-class type (`SPEC_FULL.md`) so "discard stale decisions" is a
//! single comparison rather than ad hoc integer bookkeeping.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonically non-decreasing counter, bumped on quota changes and on
/// workload deletion (`spec.md` §3). `spec.md` §5: "a stale decision whose
/// generation no longer matches the cache is discarded."
#[derive(Debug, Default)]
pub struct Generation(AtomicU64);

impl Generation {
    pub fn new() -> Self {
        Generation(AtomicU64::new(0))
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    /// Bumps the counter and returns the new value.
    pub fn bump(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }
}

impl Clone for Generation {
    fn clone(&self) -> Self {
        Generation(AtomicU64::new(self.get()))
    }
}

impl PartialEq for Generation {
    fn eq(&self, other: &Self) -> bool {
        self.get() == other.get()
    }
}

impl Eq for Generation {}

/// A generation value captured at snapshot time, compared later against the
/// live cache to decide whether a scheduling decision is still valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct GenerationStamp(u64);

impl GenerationStamp {
    pub fn capture(generation: &Generation) -> Self {
        GenerationStamp(generation.get())
    }

    pub fn value(self) -> u64 {
        self.0
    }

    /// True if `current` has moved on since this stamp was captured.
    pub fn is_stale_against(self, current: &Generation) -> bool {
        current.get() != self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bump_is_monotonic_and_stamp_detects_staleness() {
        let g = Generation::new();
        let stamp = GenerationStamp::capture(&g);
        assert!(!stamp.is_stale_against(&g));
        g.bump();
        assert!(stamp.is_stale_against(&g));
    }
}
