//! Stroke renderers.
//!
//! Three independent strategies read the timeline and issue path commands
//! against a [`PaintSurface`]:
//!
//! - **Live:** one segment, the newest of the open stroke, per pointer move
//! - **Replay:** every committed stroke clipped to the elapsed cycle time
//! - **Snapshot:** every stroke in full, no time clipping
//!
//! None of them mutate the timeline.

use loopdraw_stroke_model::stroke::{CycleMs, Point, Stroke};

use crate::surface::PaintSurface;

/// Options for a snapshot render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotOptions {
    /// Whether eraser strokes are painted.
    pub include_eraser: bool,
    /// Whether the surface is cleared first. Callers compositing onto an
    /// already-filled background leave this off.
    pub clear: bool,
}

impl SnapshotOptions {
    /// All strokes onto a cleared surface.
    pub fn full() -> Self {
        Self {
            include_eraser: true,
            clear: true,
        }
    }

    /// Pen strokes only, onto a cleared surface.
    pub fn pen_only() -> Self {
        Self {
            include_eraser: false,
            clear: true,
        }
    }
}

/// Draw the newest segment of the open stroke.
///
/// Returns false when the stroke has fewer than two points.
pub fn render_live_segment<S: PaintSurface + ?Sized>(surface: &mut S, stroke: &Stroke) -> bool {
    let Some((from, to)) = stroke.last_segment() else {
        return false;
    };
    surface.begin_path();
    surface.move_to(from.x, from.y);
    surface.line_to(to.x, to.y);
    surface.stroke(stroke.color, stroke.line_width());
    true
}

/// Clear the surface and redraw every stroke up to `elapsed_ms`.
///
/// Strokes with no points at or before `elapsed_ms` are skipped.
pub fn render_replay<S: PaintSurface + ?Sized>(
    surface: &mut S,
    strokes: &[Stroke],
    elapsed_ms: CycleMs,
) {
    surface.clear();
    for stroke in strokes {
        let visible = stroke.points_until(elapsed_ms);
        if visible.is_empty() {
            continue;
        }
        draw_polyline(surface, stroke, visible);
    }
}

/// Redraw every stroke in full.
pub fn render_snapshot<S: PaintSurface + ?Sized>(
    surface: &mut S,
    strokes: &[Stroke],
    options: SnapshotOptions,
) {
    if options.clear {
        surface.clear();
    }
    for stroke in strokes {
        if stroke.is_eraser && !options.include_eraser {
            continue;
        }
        draw_stroke(surface, stroke);
    }
}

/// Draw a single stroke in full.
pub fn draw_stroke<S: PaintSurface + ?Sized>(surface: &mut S, stroke: &Stroke) {
    if stroke.points.is_empty() {
        return;
    }
    draw_polyline(surface, stroke, &stroke.points);
}

fn draw_polyline<S: PaintSurface + ?Sized>(surface: &mut S, stroke: &Stroke, points: &[Point]) {
    let Some((first, rest)) = points.split_first() else {
        return;
    };
    surface.begin_path();
    surface.move_to(first.x, first.y);
    for p in rest {
        surface.line_to(p.x, p.y);
    }
    surface.stroke(stroke.color, stroke.line_width());
}
