//! The paint-surface contract the renderers draw against.

use loopdraw_stroke_model::stroke::Color;

/// A 2D target that accepts path-style drawing commands.
///
/// Paths are built from `move_to`/`line_to` and painted by `stroke` with
/// round caps and joins. A sub-path consisting of a single `move_to`
/// paints nothing.
pub trait PaintSurface {
    /// Surface width in pixels.
    fn width(&self) -> u32;

    /// Surface height in pixels.
    fn height(&self) -> u32;

    /// Erase all content.
    fn clear(&mut self);

    /// Discard the current path and start a new one.
    fn begin_path(&mut self);

    /// Start a new sub-path at `(x, y)`.
    fn move_to(&mut self, x: f64, y: f64);

    /// Extend the current sub-path to `(x, y)`.
    fn line_to(&mut self, x: f64, y: f64);

    /// Paint the current path.
    fn stroke(&mut self, color: Color, width: f64);
}

/// A drawing command as issued to a surface.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Clear,
    BeginPath,
    MoveTo { x: f64, y: f64 },
    LineTo { x: f64, y: f64 },
    Stroke { color: Color, width: f64 },
}

/// A surface that records commands instead of painting them.
#[derive(Debug, Clone, Default)]
pub struct RecordingSurface {
    width: u32,
    height: u32,
    commands: Vec<DrawCommand>,
}

impl RecordingSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            commands: Vec::new(),
        }
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<DrawCommand> {
        std::mem::take(&mut self.commands)
    }

    /// Line segments that a stroke call would actually paint.
    pub fn painted_segments(&self) -> Vec<((f64, f64), (f64, f64))> {
        let mut painted = Vec::new();
        let mut pending = Vec::new();
        let mut cursor: Option<(f64, f64)> = None;
        for command in &self.commands {
            match command {
                DrawCommand::Clear => {}
                DrawCommand::BeginPath => {
                    pending.clear();
                    cursor = None;
                }
                DrawCommand::MoveTo { x, y } => cursor = Some((*x, *y)),
                DrawCommand::LineTo { x, y } => {
                    if let Some(from) = cursor {
                        pending.push((from, (*x, *y)));
                    }
                    cursor = Some((*x, *y));
                }
                DrawCommand::Stroke { .. } => painted.extend(pending.iter().copied()),
            }
        }
        painted
    }
}

impl PaintSurface for RecordingSurface {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn clear(&mut self) {
        self.commands.push(DrawCommand::Clear);
    }

    fn begin_path(&mut self) {
        self.commands.push(DrawCommand::BeginPath);
    }

    fn move_to(&mut self, x: f64, y: f64) {
        self.commands.push(DrawCommand::MoveTo { x, y });
    }

    fn line_to(&mut self, x: f64, y: f64) {
        self.commands.push(DrawCommand::LineTo { x, y });
    }

    fn stroke(&mut self, color: Color, width: f64) {
        self.commands.push(DrawCommand::Stroke { color, width });
    }
}
