//! Timestamped commands queued into a session.

use loopdraw_common::clock::{Millis, SessionClock};
use loopdraw_stroke_model::event::{ExportFormat, ScriptEvent, ScriptEventKind};
use loopdraw_stroke_model::tool::Tool;

/// An input or control request delivered to a [`LoopSession`](crate::LoopSession).
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    /// Pointer pressed at device coordinates.
    PointerDown { x: f64, y: f64 },
    /// Pointer moved while pressed.
    PointerMove { x: f64, y: f64 },
    PointerUp,
    SetTool(Tool),
    /// New cycle duration in milliseconds.
    SetDuration(Millis),
    ToggleOnion,
    Clear,
    Export(ExportFormat),
    CancelExport,
    Resize { width: u32, height: u32 },
}

/// A command and the session time it takes effect.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedCommand {
    pub at_ms: Millis,
    pub command: SessionCommand,
}

impl TimedCommand {
    pub fn new(at_ms: Millis, command: SessionCommand) -> Self {
        Self { at_ms, command }
    }

    /// Convert a script event, shifting its time by `offset_ms`.
    pub fn from_script_event(event: &ScriptEvent, offset_ms: Millis) -> Self {
        Self::new(
            event.at_ms.saturating_add(offset_ms),
            SessionCommand::from(&event.kind),
        )
    }
}

impl From<&ScriptEventKind> for SessionCommand {
    fn from(kind: &ScriptEventKind) -> Self {
        match *kind {
            ScriptEventKind::PointerDown { x, y } => SessionCommand::PointerDown { x, y },
            ScriptEventKind::PointerMove { x, y } => SessionCommand::PointerMove { x, y },
            ScriptEventKind::PointerUp => SessionCommand::PointerUp,
            ScriptEventKind::Tool { tool } => SessionCommand::SetTool(tool),
            ScriptEventKind::Duration { secs } => {
                SessionCommand::SetDuration(SessionClock::secs_to_ms(secs))
            }
            ScriptEventKind::OnionToggle => SessionCommand::ToggleOnion,
            ScriptEventKind::Clear => SessionCommand::Clear,
            ScriptEventKind::Export { format } => SessionCommand::Export(format),
            ScriptEventKind::CancelExport => SessionCommand::CancelExport,
            ScriptEventKind::Resize { width, height } => SessionCommand::Resize { width, height },
        }
    }
}
