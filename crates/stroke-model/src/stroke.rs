//! Points, strokes, and stroke colors.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Milliseconds since the start of the cycle a point was captured in.
pub type CycleMs = u64;

/// A single sampled pointer position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    /// Cycle-relative capture time.
    pub t: CycleMs,
}

impl Point {
    pub fn new(x: f64, y: f64, t: CycleMs) -> Self {
        Self { x, y, t }
    }
}

/// An RGB color, serialized as `#rrggbb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgb(0xff, 0xff, 0xff);
    pub const BLACK: Color = Color::rgb(0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rrggbb` or `rrggbb` (case-insensitive).
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if digits.len() != 6 || !digits.is_ascii() {
            return None;
        }
        let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&digits[range], 16).ok();
        Some(Self {
            r: channel(0..2)?,
            g: channel(2..4)?,
            b: channel(4..6)?,
        })
    }

    /// Lowercase `#rrggbb` form.
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Error returned when a color string is not `#rrggbb`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid color `{0}`, expected #rrggbb")]
pub struct ParseColorError(pub String);

impl FromStr for Color {
    type Err = ParseColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s).ok_or_else(|| ParseColorError(s.to_string()))
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// One continuous pointer-down-to-pointer-up gesture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub color: Color,
    pub is_eraser: bool,
    pub points: Vec<Point>,
}

impl Stroke {
    pub fn new(color: Color, is_eraser: bool) -> Self {
        Self {
            color,
            is_eraser,
            points: Vec::new(),
        }
    }

    /// Line width used when painting this stroke.
    pub fn line_width(&self) -> f64 {
        if self.is_eraser {
            crate::tool::ERASER_WIDTH
        } else {
            crate::tool::PEN_WIDTH
        }
    }

    /// Points whose timestamp is at or before `elapsed_ms`.
    ///
    /// Points are ordered by `t`, so this is always a prefix.
    pub fn points_until(&self, elapsed_ms: CycleMs) -> &[Point] {
        let end = self.points.partition_point(|p| p.t <= elapsed_ms);
        &self.points[..end]
    }

    /// Latest timestamp in the stroke.
    pub fn last_t(&self) -> Option<CycleMs> {
        self.points.last().map(|p| p.t)
    }

    /// Last two points, used for incremental live drawing.
    pub fn last_segment(&self) -> Option<(Point, Point)> {
        match self.points.as_slice() {
            [.., a, b] => Some((*a, *b)),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
