//! LoopDraw Stroke Model
//!
//! Defines the core data contracts for LoopDraw sessions:
//! - **Strokes:** Ordered, cycle-relative timestamped points with a color
//! - **Tools:** Pen/eraser styling and the per-cycle color palette
//! - **Timeline:** The append-only store of committed strokes plus the
//!   single open stroke
//! - **Script events:** JSONL input scripts that drive a session
//!
//! Point coordinates are canvas-local pixels. Point timestamps are
//! milliseconds since the start of the cycle the point was captured in.

pub mod event;
pub mod stroke;
pub mod timeline;
pub mod tool;

pub use event::*;
pub use stroke::*;
pub use timeline::*;
pub use tool::*;
