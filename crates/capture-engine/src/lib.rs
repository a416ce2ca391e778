//! LoopDraw Capture Engine
//!
//! Records exactly one loop cycle of the replay surface and turns it into a
//! downloadable artifact. A capture is armed on request, begins at the next
//! cycle rollover, and stops just before the one after.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │              CaptureCoordinator               │
//! │   Idle ──arm──▶ ArmedWaiting ──rollover──▶    │
//! │   Active ──(elapsed ≥ duration - guard)──▶    │
//! │        │                        │             │
//! │        ▼                        ▼             │
//! │  ┌─────────────┐        ┌────────────────┐    │
//! │  │ VideoStream │        │ GifFrame buffer│    │
//! │  │  (ffmpeg)   │        │ (100ms samples)│    │
//! │  └──────┬──────┘        └───────┬────────┘    │
//! │         ▼                       ▼             │
//! │     .webm bytes        AnimationEncoder (gif) │
//! └───────────────────────────────────────────────┘
//! ```

pub mod coordinator;
pub mod encoder;
pub mod pipeline;

pub use coordinator::*;
pub use encoder::{AnimationEncoder, GifAnimationEncoder, GifFrame};
pub use pipeline::{
    command_exists, FfmpegSettings, FfmpegVideoStreamFactory, PipelineStats, VideoStream,
    VideoStreamFactory,
};
