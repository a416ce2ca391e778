//! Onion-skin overlay: a faint static snapshot of every committed stroke.

use loopdraw_stroke_model::stroke::Stroke;

use crate::raster::RasterSurface;
use crate::renderer::{draw_stroke, render_snapshot, SnapshotOptions};
use crate::surface::PaintSurface;

/// A toggleable overlay layer.
///
/// Enabling renders the full snapshot once; each stroke committed while
/// enabled is drawn on top of the existing content without clearing.
/// Eraser strokes never appear on the overlay.
#[derive(Debug, Clone)]
pub struct OnionSkin {
    surface: RasterSurface,
    enabled: bool,
    enabled_opacity: f32,
    opacity: f32,
}

impl OnionSkin {
    pub fn new(width: u32, height: u32, enabled_opacity: f32) -> Self {
        Self {
            surface: RasterSurface::new(width, height),
            enabled: false,
            enabled_opacity: enabled_opacity.clamp(0.0, 1.0),
            opacity: 0.0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Current display opacity; zero while hidden.
    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub fn surface(&self) -> &RasterSurface {
        &self.surface
    }

    /// Flip the toggle. Returns the new enabled state.
    pub fn toggle(&mut self, strokes: &[Stroke]) -> bool {
        if self.enabled {
            self.disable();
        } else {
            self.enable(strokes);
        }
        self.enabled
    }

    /// Show the overlay, rebuilding it from the committed strokes.
    pub fn enable(&mut self, strokes: &[Stroke]) {
        render_snapshot(&mut self.surface, strokes, SnapshotOptions::pen_only());
        self.enabled = true;
        self.opacity = self.enabled_opacity;
        tracing::debug!(strokes = strokes.len(), "Onion skin enabled");
    }

    /// Hide and clear the overlay.
    pub fn disable(&mut self) {
        self.surface.clear();
        self.enabled = false;
        self.opacity = 0.0;
        tracing::debug!("Onion skin disabled");
    }

    /// Append a newly committed stroke. Returns whether anything was drawn.
    pub fn on_stroke_committed(&mut self, stroke: &Stroke) -> bool {
        if !self.enabled || stroke.is_eraser {
            return false;
        }
        draw_stroke(&mut self.surface, stroke);
        true
    }

    /// Wipe the overlay content without changing the toggle.
    pub fn clear(&mut self) {
        self.surface.clear();
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.surface.resize(width, height);
    }
}
