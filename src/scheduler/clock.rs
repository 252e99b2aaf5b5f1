//! Monotonic tick clock and the start-of-unit alignment wait.
//!
//! One tick is 100 ns. Durations are always taken from the monotonic clock, never from wall-clock time.

use std::hint;
use std::time::{Duration, Instant};

pub const NANOS_PER_TICK: u64 = 100;
pub const TICKS_PER_SECOND: u64 = 1_000_000_000 / NANOS_PER_TICK;

/// Whole ticks in `duration`, saturating at `u64::MAX`.
pub fn duration_to_ticks(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos() / u128::from(NANOS_PER_TICK)).unwrap_or(u64::MAX)
}

/// Tick counter relative to a fixed origin.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }

    pub fn ticks(&self) -> u64 {
        duration_to_ticks(self.origin.elapsed())
    }

    /// Busy-wait until the tick counter changes and return the new tick.
    ///
    /// Spins with a processor hint instead of yielding the thread, so the wait is bounded by one tick and the caller
    /// resumes right at a tick boundary.
    pub fn align(&self) -> u64 {
        let current = self.ticks();
        loop {
            let now = self.ticks();
            if now != current {
                return now;
            }
            hint::spin_loop();
        }
    }
}
