//! Frame compositor: flattens transparent layers onto a background.
//!
//! The live, replay, and onion surfaces are kept transparent; every frame
//! that leaves the engine (display preview, video proxy, GIF sample, PNG)
//! is composed here onto an opaque background.

use image::imageops::FilterType;
use image::{Rgba, RgbaImage};
use loopdraw_stroke_model::stroke::Color;

use crate::raster::{to_rgba, RasterSurface};
use crate::surface::PaintSurface;

/// One layer of a composition.
#[derive(Debug, Clone, Copy)]
pub struct Layer<'a> {
    pub surface: &'a RasterSurface,
    /// Multiplier applied to the layer's own alpha.
    pub opacity: f32,
}

impl<'a> Layer<'a> {
    pub fn opaque(surface: &'a RasterSurface) -> Self {
        Self {
            surface,
            opacity: 1.0,
        }
    }
}

/// Flatten a single surface onto an opaque background.
pub fn flatten(surface: &RasterSurface, background: Color) -> RgbaImage {
    compose(
        surface.width(),
        surface.height(),
        background,
        &[Layer::opaque(surface)],
    )
}

/// Compose layers bottom-to-top onto an opaque background.
///
/// Layers smaller than the output only cover their own extent.
pub fn compose(width: u32, height: u32, background: Color, layers: &[Layer<'_>]) -> RgbaImage {
    let mut out = RgbaImage::from_pixel(width, height, to_rgba(background));
    for layer in layers {
        let opacity = layer.opacity.clamp(0.0, 1.0);
        if opacity == 0.0 {
            continue;
        }
        let src = layer.surface.image();
        let w = width.min(src.width());
        let h = height.min(src.height());
        for y in 0..h {
            for x in 0..w {
                let s = src.get_pixel(x, y);
                let alpha = s.0[3] as f32 / 255.0 * opacity;
                if alpha == 0.0 {
                    continue;
                }
                let d = out.get_pixel_mut(x, y);
                *d = blend(*d, *s, alpha);
            }
        }
    }
    out
}

/// Scale a frame by `factor` (at least one pixel per side).
pub fn scale_frame(frame: &RgbaImage, factor: f64) -> RgbaImage {
    let (width, height) = scaled_dimensions(frame.width(), frame.height(), factor);
    if width == frame.width() && height == frame.height() {
        return frame.clone();
    }
    image::imageops::resize(frame, width, height, FilterType::Triangle)
}

/// Dimensions after scaling by `factor`.
pub fn scaled_dimensions(width: u32, height: u32, factor: f64) -> (u32, u32) {
    let scale = |v: u32| ((v as f64 * factor).round() as u32).max(1);
    (scale(width), scale(height))
}

fn blend(dst: Rgba<u8>, src: Rgba<u8>, alpha: f32) -> Rgba<u8> {
    let mix = |d: u8, s: u8| (s as f32 * alpha + d as f32 * (1.0 - alpha)).round() as u8;
    Rgba([
        mix(dst.0[0], src.0[0]),
        mix(dst.0[1], src.0[1]),
        mix(dst.0[2], src.0[2]),
        255,
    ])
}
