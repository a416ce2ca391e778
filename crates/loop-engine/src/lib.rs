//! LoopDraw Loop Engine
//!
//! Composes the stroke timeline, cycle clock, renderers, onion overlay and
//! capture coordinator into a single-threaded session that is advanced once
//! per display frame.
//!
//! # Tick Order
//!
//! ```text
//!  queued commands (t <= now) ──► timeline / tool / onion / capture arm
//!               │
//!               ▼
//!  CycleClock::tick(now) ──rollover──► new color, clear live, arm → Active
//!               │
//!               ▼
//!  render_replay(elapsed) ──► CaptureCoordinator::on_tick ──► DownloadSink
//! ```

pub mod command;
pub mod cycle;
pub mod session;

pub use command::{SessionCommand, TimedCommand};
pub use cycle::{CycleClock, CycleTick};
pub use session::*;
