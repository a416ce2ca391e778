//! Input script events for driving a LoopDraw session.
//!
//! Scripts are JSONL: one event object per line, `#`-prefixed lines are
//! comments. Each event carries `t`, the milliseconds since script start at
//! which it is delivered to the session.

use serde::{Deserialize, Serialize};

use crate::tool::Tool;

/// Milliseconds since script start.
pub type ScriptMs = u64;

/// Artifact formats a session can export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Static cumulative snapshot.
    Png,
    /// One full cycle streamed as WebM.
    Video,
    /// One full cycle sampled into an animated GIF.
    Gif,
}

/// A single scripted event with its delivery time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptEvent {
    #[serde(rename = "t")]
    pub at_ms: ScriptMs,

    #[serde(flatten)]
    pub kind: ScriptEventKind,
}

/// Discriminated union of scripted inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScriptEventKind {
    PointerDown { x: f64, y: f64 },
    PointerMove { x: f64, y: f64 },
    PointerUp,
    Tool { tool: Tool },
    /// Cycle duration change, in seconds.
    Duration { secs: f64 },
    OnionToggle,
    Clear,
    Export { format: ExportFormat },
    CancelExport,
    Resize { width: u32, height: u32 },
}

impl ScriptEvent {
    pub fn new(at_ms: ScriptMs, kind: ScriptEventKind) -> Self {
        Self { at_ms, kind }
    }
}

/// Error raised while parsing a script.
#[derive(Debug, thiserror::Error)]
#[error("line {line}: {source}")]
pub struct ScriptParseError {
    /// 1-based line number in the script.
    pub line: usize,
    #[source]
    pub source: serde_json::Error,
}

/// Parse script events from JSONL content.
///
/// Events are returned sorted by delivery time; events sharing a time keep
/// their file order.
pub fn parse_script(jsonl: &str) -> Result<Vec<ScriptEvent>, ScriptParseError> {
    let mut events = jsonl
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(line, content)| {
            serde_json::from_str::<ScriptEvent>(content)
                .map_err(|source| ScriptParseError { line, source })
        })
        .collect::<Result<Vec<_>, _>>()?;
    events.sort_by_key(|e| e.at_ms);
    Ok(events)
}

/// Serialize events to JSONL content.
pub fn serialize_script(events: &[ScriptEvent]) -> Result<String, serde_json::Error> {
    let mut out = String::new();
    for event in events {
        out.push_str(&serde_json::to_string(event)?);
        out.push('\n');
    }
    Ok(out)
}
