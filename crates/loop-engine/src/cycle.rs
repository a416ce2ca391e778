//! The cycle clock.
//!
//! Time is partitioned into consecutive cycles of a configurable duration.
//! `tick` is the single authority on rollover, so the cycle index can never
//! be advanced twice for the same boundary.

use loopdraw_common::clock::Millis;

/// Result of evaluating the clock at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleTick {
    /// Milliseconds since the current cycle started (0 on rollover).
    pub elapsed_ms: Millis,
    /// Whether this tick started a new cycle.
    pub rolled_over: bool,
    /// Index of the cycle the tick belongs to (1-based).
    pub index: u64,
}

#[derive(Debug, Clone)]
pub struct CycleClock {
    start_ms: Millis,
    index: u64,
    duration_ms: Millis,
}

impl CycleClock {
    /// Start cycle 1 at `now_ms`. A zero duration is raised to 1 ms.
    pub fn new(now_ms: Millis, duration_ms: Millis) -> Self {
        Self {
            start_ms: now_ms,
            index: 1,
            duration_ms: duration_ms.max(1),
        }
    }

    /// Evaluate the clock at `now_ms`, rolling over when the cycle is complete.
    pub fn tick(&mut self, now_ms: Millis) -> CycleTick {
        let elapsed = now_ms.saturating_sub(self.start_ms);
        if elapsed >= self.duration_ms {
            self.index += 1;
            self.start_ms = now_ms;
            tracing::debug!(index = self.index, "Cycle rolled over");
            return CycleTick {
                elapsed_ms: 0,
                rolled_over: true,
                index: self.index,
            };
        }
        CycleTick {
            elapsed_ms: elapsed,
            rolled_over: false,
            index: self.index,
        }
    }

    /// Change the cycle length. Takes effect at the next rollover check.
    ///
    /// Returns false (and keeps the old duration) for zero.
    pub fn set_duration(&mut self, duration_ms: Millis) -> bool {
        if duration_ms == 0 {
            tracing::warn!("Ignoring zero cycle duration");
            return false;
        }
        self.duration_ms = duration_ms;
        true
    }

    /// Restart at cycle 1.
    pub fn reset_for_clear(&mut self, now_ms: Millis) {
        self.index = 1;
        self.start_ms = now_ms;
    }

    /// Elapsed time in the current cycle without evaluating rollover.
    pub fn elapsed_at(&self, now_ms: Millis) -> Millis {
        now_ms.saturating_sub(self.start_ms)
    }

    /// Fraction of the cycle represented by `elapsed_ms`, in `[0, 1]`.
    pub fn progress(&self, elapsed_ms: Millis) -> f64 {
        (elapsed_ms as f64 / self.duration_ms as f64).clamp(0.0, 1.0)
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn duration_ms(&self) -> Millis {
        self.duration_ms
    }

    pub fn start_ms(&self) -> Millis {
        self.start_ms
    }
}
