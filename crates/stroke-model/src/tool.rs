//! Drawing tools and the per-cycle color palette.

use serde::{Deserialize, Serialize};

use crate::stroke::Color;

/// Pen line width in canvas units.
pub const PEN_WIDTH: f64 = 3.0;

/// Eraser line width in canvas units.
pub const ERASER_WIDTH: f64 = 20.0;

/// Eraser strokes paint over pen strokes in the background color.
pub const ERASER_COLOR: Color = Color::WHITE;

/// Colors a cycle may be assigned; distinct hues keep cycles apart visually.
pub const CYCLE_PALETTE: [Color; 8] = [
    Color::rgb(0x25, 0x63, 0xeb),
    Color::rgb(0xdc, 0x26, 0x26),
    Color::rgb(0x16, 0xa3, 0x4a),
    Color::rgb(0xd9, 0x77, 0x06),
    Color::rgb(0x7c, 0x3a, 0xed),
    Color::rgb(0xdb, 0x27, 0x77),
    Color::rgb(0x08, 0x91, 0xb2),
    Color::rgb(0x4f, 0x46, 0xe5),
];

/// The active drawing tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    #[default]
    Pen,
    Eraser,
}

impl Tool {
    pub fn is_eraser(self) -> bool {
        matches!(self, Tool::Eraser)
    }

    /// Color a stroke started with this tool gets during a cycle of `cycle_color`.
    pub fn stroke_color(self, cycle_color: Color) -> Color {
        match self {
            Tool::Pen => cycle_color,
            Tool::Eraser => ERASER_COLOR,
        }
    }

    pub fn line_width(self) -> f64 {
        match self {
            Tool::Pen => PEN_WIDTH,
            Tool::Eraser => ERASER_WIDTH,
        }
    }
}
