//! LoopDraw Render Engine
//!
//! Turns the stroke timeline into pixels. Every rendering path goes through
//! the [`PaintSurface`](surface::PaintSurface) contract, so the same
//! renderers drive the on-screen layers, export proxies, and test recorders.
//!
//! # Layer Architecture
//!
//! ```text
//! timeline ──┬── Live renderer ──────► live surface ────┐
//!            │                                           │
//!            ├── Replay renderer ────► replay surface ──┼── Compositor ──► display frame
//!            │                              │            │   (white bg)
//!            └── Snapshot renderer ──► onion surface ───┘
//!                       │                   │
//!                       ▼                   ▼
//!                  PNG export        video proxy / GIF samples
//! ```

pub mod compositor;
pub mod export;
pub mod onion;
pub mod raster;
pub mod renderer;
pub mod surface;

pub use export::*;
pub use onion::OnionSkin;
pub use raster::RasterSurface;
pub use renderer::*;
pub use surface::*;
