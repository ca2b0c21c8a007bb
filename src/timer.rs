//! The source of time of a partition.
//!
//! The protocol never reads the system time directly: every deadline is derived from the
//! [`Clock`] the [`Raft`](crate::Raft) instance is created with.

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

/// Provides the current time to a partition.
pub trait Clock {
    fn now(&self) -> Instant;
}

/// A [`Clock`] backed by [`Instant::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct StdClock;

impl Clock for StdClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A [`Clock`] that only moves forward when told to.
///
/// Clones share the same time, so a test harness can drive every member of a cluster with one
/// clock.
#[derive(Debug, Clone)]
pub struct ManualClock {
    /// The time when this clock is created.
    ///
    /// The `elapsed_us` stores the time relative to `init` in micro second.
    init: Instant,

    elapsed_us: Arc<AtomicU64>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            init: Instant::now(),
            elapsed_us: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Move the clock forward by `d`.
    pub fn advance(&self, d: Duration) {
        self.elapsed_us.fetch_add(d.as_micros() as u64, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.init + Duration::from_micros(self.elapsed_us.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::timer::Clock;
    use crate::timer::ManualClock;

    #[test]
    fn test_manual_clock_is_shared_by_clones() {
        let c1 = ManualClock::new();
        let c2 = c1.clone();

        let t0 = c1.now();
        assert_eq!(t0, c2.now());

        c2.advance(Duration::from_millis(150));
        assert_eq!(t0 + Duration::from_millis(150), c1.now());
    }
}
