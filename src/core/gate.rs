//! Concurrency gate: counts running tasks against a resizable limit.
//!
//! The gate lives inside the pool state, so every call happens under the
//! pool lock together with the other counters. Resizing never touches
//! permits that are already held; it only changes what `try_acquire`
//! answers from then on.

/// Running-slot accounting with a live-adjustable limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConcurrencyGate {
    limit: usize,
    running: usize,
    peak: usize,
}

impl ConcurrencyGate {
    /// Create a gate admitting at most `limit` concurrent holders.
    #[must_use]
    pub const fn new(limit: usize) -> Self {
        Self {
            limit,
            running: 0,
            peak: 0,
        }
    }

    /// Take a slot if one is free. Never blocks.
    pub fn try_acquire(&mut self) -> bool {
        if self.running >= self.limit {
            return false;
        }
        self.running += 1;
        self.peak = self.peak.max(self.running);
        true
    }

    /// Give a slot back. Returns `false` if no slot was held.
    pub fn release(&mut self) -> bool {
        if self.running == 0 {
            tracing::error!("concurrency gate released with no running tasks");
            return false;
        }
        self.running -= 1;
        true
    }

    /// Change the limit and return the previous one. A limit of zero pauses
    /// admission; a limit below `running` lets the excess finish naturally.
    pub fn set_limit(&mut self, limit: usize) -> usize {
        std::mem::replace(&mut self.limit, limit)
    }

    /// Current limit.
    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }

    /// Slots currently held.
    #[must_use]
    pub const fn running(&self) -> usize {
        self.running
    }

    /// Highest number of slots ever held at once.
    #[must_use]
    pub const fn peak(&self) -> usize {
        self.peak
    }

    /// Slots that can still be acquired under the current limit.
    #[must_use]
    pub const fn available(&self) -> usize {
        self.limit.saturating_sub(self.running)
    }

    pub(crate) fn reset_peak(&mut self) {
        self.peak = self.running;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_up_to_limit() {
        let mut gate = ConcurrencyGate::new(2);
        assert!(gate.try_acquire());
        assert!(gate.try_acquire());
        assert!(!gate.try_acquire());
        assert_eq!(gate.running(), 2);
        assert_eq!(gate.available(), 0);
        assert_eq!(gate.peak(), 2);
    }

    #[test]
    fn test_release_frees_slot() {
        let mut gate = ConcurrencyGate::new(1);
        assert!(gate.try_acquire());
        assert!(gate.release());
        assert!(gate.try_acquire());
        assert_eq!(gate.peak(), 1);
    }

    #[test]
    fn test_release_without_acquire() {
        let mut gate = ConcurrencyGate::new(3);
        assert!(!gate.release());
        assert_eq!(gate.running(), 0);
    }

    #[test]
    fn test_zero_limit_pauses_admission() {
        let mut gate = ConcurrencyGate::new(2);
        assert!(gate.try_acquire());
        assert_eq!(gate.set_limit(0), 2);
        assert!(!gate.try_acquire());
        // In-flight holder is untouched.
        assert_eq!(gate.running(), 1);

        gate.set_limit(3);
        assert!(gate.try_acquire());
        assert!(gate.try_acquire());
        assert!(!gate.try_acquire());
    }

    #[test]
    fn test_shrink_below_running() {
        let mut gate = ConcurrencyGate::new(4);
        for _ in 0..4 {
            assert!(gate.try_acquire());
        }
        gate.set_limit(1);
        assert_eq!(gate.available(), 0);

        // Excess holders drain before anything new gets in.
        for _ in 0..3 {
            assert!(gate.release());
            assert!(!gate.try_acquire());
        }
        assert!(gate.release());
        assert!(gate.try_acquire());
        assert_eq!(gate.peak(), 4);
    }

    #[test]
    fn test_reset_peak_keeps_running() {
        let mut gate = ConcurrencyGate::new(5);
        for _ in 0..3 {
            gate.try_acquire();
        }
        gate.release();
        gate.reset_peak();
        assert_eq!(gate.peak(), 2);
    }
}
