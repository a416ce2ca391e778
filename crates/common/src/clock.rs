//! Clock and timing utilities for the driving loop.
//!
//! All LoopDraw timing is expressed in whole milliseconds on a monotonic
//! session clock whose epoch is recorded at session start. This module
//! provides:
//! - The session epoch and `now_ms` readings
//! - Wall-clock unix time for artifact naming
//! - A rate controller for fixed-interval sampling

use std::time::Instant;

/// Milliseconds on the session clock.
pub type Millis = u64;

/// A session clock that provides monotonic millisecond timestamps relative
/// to a fixed epoch (the moment the session started).
#[derive(Debug, Clone)]
pub struct SessionClock {
    /// The instant the session started.
    epoch: Instant,

    /// Wall-clock time at epoch (RFC 3339 string).
    epoch_wall: String,
}

impl SessionClock {
    /// Create a new session clock anchored to now.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
            epoch_wall: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Milliseconds elapsed since session start.
    pub fn now_ms(&self) -> Millis {
        self.epoch.elapsed().as_millis() as Millis
    }

    /// Wall-clock time at session start.
    pub fn epoch_wall(&self) -> &str {
        &self.epoch_wall
    }

    /// Convert fractional seconds to whole milliseconds (rounded, never negative).
    pub fn secs_to_ms(secs: f64) -> Millis {
        if !secs.is_finite() || secs <= 0.0 {
            return 0;
        }
        (secs * 1000.0).round() as Millis
    }

    /// Convert milliseconds to fractional seconds.
    pub fn ms_to_secs(ms: Millis) -> f64 {
        ms as f64 / 1000.0
    }
}

/// Current wall-clock time as unix milliseconds.
pub fn unix_time_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Rate controller for fixed-interval sampling.
#[derive(Debug, Clone)]
pub struct RateController {
    target_interval_ms: Millis,
    last_tick_ms: Option<Millis>,
}

impl RateController {
    /// Create a controller with an explicit minimum spacing between ticks.
    pub fn from_interval_ms(interval_ms: Millis) -> Self {
        Self {
            target_interval_ms: interval_ms,
            last_tick_ms: None,
        }
    }

    /// Check if enough time has passed for the next tick.
    /// Returns true and updates internal state if ready.
    /// The first call always returns true.
    pub fn should_tick(&mut self, current_ms: Millis) -> bool {
        match self.last_tick_ms {
            None => {
                self.last_tick_ms = Some(current_ms);
                true
            }
            Some(last) if current_ms >= last + self.target_interval_ms => {
                self.last_tick_ms = Some(current_ms);
                true
            }
            _ => false,
        }
    }

    /// Forget the last tick so the next call fires immediately.
    pub fn reset(&mut self) {
        self.last_tick_ms = None;
    }

    /// Target interval in milliseconds.
    pub fn interval_ms(&self) -> Millis {
        self.target_interval_ms
    }
}

/// Fixed-rate frame slots anchored at the start of a capture.
///
/// Slot `n` is due `n * 1000 / fps` milliseconds after the start. Due times
/// are derived from the slot index with integer math, so a 30 fps schedule
/// stays at exactly 1800 slots per minute instead of rounding each interval.
#[derive(Debug, Clone)]
pub struct FrameSchedule {
    fps: u64,
    emitted: u64,
}

impl FrameSchedule {
    pub fn new(fps: u32) -> Self {
        Self {
            fps: fps.max(1) as u64,
            emitted: 0,
        }
    }

    pub fn fps(&self) -> u32 {
        self.fps as u32
    }

    /// Offset of slot `n` from the start, rounded down to whole milliseconds.
    pub fn slot_offset_ms(&self, n: u64) -> Millis {
        n.saturating_mul(1000) / self.fps
    }

    /// Number of slots due at or before `offset_ms`.
    pub fn slots_through(&self, offset_ms: Millis) -> u64 {
        offset_ms.saturating_mul(self.fps) / 1000 + 1
    }

    /// Number of slots due strictly before `offset_ms`.
    pub fn slots_before(&self, offset_ms: Millis) -> u64 {
        offset_ms.saturating_mul(self.fps).div_ceil(1000)
    }

    /// Claim every unclaimed slot due at or before `offset_ms`.
    /// Returns how many frames the caller owes.
    pub fn take_through(&mut self, offset_ms: Millis) -> u64 {
        self.claim(self.slots_through(offset_ms))
    }

    /// Claim every unclaimed slot due strictly before `offset_ms`.
    pub fn take_before(&mut self, offset_ms: Millis) -> u64 {
        self.claim(self.slots_before(offset_ms))
    }

    /// Slots claimed so far.
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    fn claim(&mut self, due: u64) -> u64 {
        let owed = due.saturating_sub(self.emitted);
        self.emitted += owed;
        owed
    }
}
