//! CPU raster implementation of [`PaintSurface`].

use image::{Rgba, RgbaImage};
use loopdraw_stroke_model::stroke::Color;

use crate::surface::PaintSurface;

const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// An RGBA pixel buffer that paints strokes as round-capped thick segments.
///
/// Cleared pixels are fully transparent so layers can be composited onto
/// any background afterwards.
#[derive(Debug, Clone)]
pub struct RasterSurface {
    image: RgbaImage,
    path: Vec<Vec<(f64, f64)>>,
}

impl RasterSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbaImage::from_pixel(width, height, TRANSPARENT),
            path: Vec::new(),
        }
    }

    /// Wrap an existing image.
    pub fn from_image(image: RgbaImage) -> Self {
        Self {
            image,
            path: Vec::new(),
        }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    /// Resize the surface, keeping the overlapping top-left content.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == self.image.width() && height == self.image.height() {
            return;
        }
        let mut resized = RgbaImage::from_pixel(width, height, TRANSPARENT);
        image::imageops::replace(&mut resized, &self.image, 0, 0);
        self.image = resized;
    }

    /// Fill every pixel with an opaque color.
    pub fn fill(&mut self, color: Color) {
        let pixel = to_rgba(color);
        for p in self.image.pixels_mut() {
            *p = pixel;
        }
    }

    /// Whether nothing has been painted since the last clear.
    pub fn is_blank(&self) -> bool {
        self.image.pixels().all(|p| p.0[3] == 0)
    }

    /// Number of non-transparent pixels.
    pub fn painted_pixel_count(&self) -> usize {
        self.image.pixels().filter(|p| p.0[3] != 0).count()
    }

    /// Paint every pixel within `width / 2` of the segment.
    ///
    /// Only the part of the segment's bounding box that overlaps the surface
    /// is visited, so far off-canvas points cost nothing extra.
    fn stamp_segment(&mut self, from: (f64, f64), to: (f64, f64), width: f64, pixel: Rgba<u8>) {
        let half = width / 2.0;
        if half <= 0.0 || ![half, from.0, from.1, to.0, to.1].iter().all(|v| v.is_finite()) {
            return;
        }
        // Odd widths center on pixel coordinates, even widths on pixel
        // centers, so a horizontal line covers exactly `width` rows.
        let offset = if (width.round() as i64) % 2 == 0 { 0.5 } else { 0.0 };

        let Some((x0, x1)) = pixel_span(
            from.0.min(to.0) - half,
            from.0.max(to.0) + half,
            offset,
            self.image.width(),
        ) else {
            return;
        };
        let Some((y0, y1)) = pixel_span(
            from.1.min(to.1) - half,
            from.1.max(to.1) + half,
            offset,
            self.image.height(),
        ) else {
            return;
        };

        let limit = half * half - 1e-9;
        for y in y0..=y1 {
            for x in x0..=x1 {
                let sample = (x as f64 + offset, y as f64 + offset);
                if distance_sq_to_segment(sample, from, to) < limit {
                    self.image.put_pixel(x, y, pixel);
                }
            }
        }
    }
}

/// Inclusive range of pixel indices whose sample point falls in `[lo, hi]`,
/// clamped to `0..size`.
fn pixel_span(lo: f64, hi: f64, offset: f64, size: u32) -> Option<(u32, u32)> {
    if size == 0 {
        return None;
    }
    let first = (lo - offset).ceil().max(0.0);
    let last = (hi - offset).floor().min((size - 1) as f64);
    (first <= last).then(|| (first as u32, last as u32))
}

fn distance_sq_to_segment(p: (f64, f64), a: (f64, f64), b: (f64, f64)) -> f64 {
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let length_sq = dx * dx + dy * dy;
    let t = if length_sq > 0.0 {
        (((p.0 - a.0) * dx + (p.1 - a.1) * dy) / length_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let (cx, cy) = (a.0 + dx * t, a.1 + dy * t);
    (p.0 - cx).powi(2) + (p.1 - cy).powi(2)
}

impl PaintSurface for RasterSurface {
    fn width(&self) -> u32 {
        self.image.width()
    }

    fn height(&self) -> u32 {
        self.image.height()
    }

    fn clear(&mut self) {
        for p in self.image.pixels_mut() {
            *p = TRANSPARENT;
        }
    }

    fn begin_path(&mut self) {
        self.path.clear();
    }

    fn move_to(&mut self, x: f64, y: f64) {
        self.path.push(vec![(x, y)]);
    }

    fn line_to(&mut self, x: f64, y: f64) {
        match self.path.last_mut() {
            Some(sub_path) => sub_path.push((x, y)),
            // Canvas semantics: a line_to with no current point acts as move_to.
            None => self.path.push(vec![(x, y)]),
        }
    }

    fn stroke(&mut self, color: Color, width: f64) {
        let pixel = to_rgba(color);
        let path = std::mem::take(&mut self.path);
        for sub_path in &path {
            for pair in sub_path.windows(2) {
                self.stamp_segment(pair[0], pair[1], width, pixel);
            }
        }
        self.path = path;
    }
}

/// Opaque RGBA pixel for a stroke color.
pub fn to_rgba(color: Color) -> Rgba<u8> {
    Rgba([color.r, color.g, color.b, 255])
}
