pub mod check;
pub mod config;
pub mod play;
pub mod snapshot;

use std::path::Path;

use anyhow::Context;
use loopdraw_loop_engine::TimedCommand;
use loopdraw_stroke_model::event::{parse_script, ScriptEvent};

/// Read and parse a JSONL input script.
pub fn load_script(path: &Path) -> anyhow::Result<Vec<ScriptEvent>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read script {}", path.display()))?;
    parse_script(&content).map_err(|e| anyhow::anyhow!("Failed to parse {}: {e}", path.display()))
}

/// Script events as session commands starting at `offset_ms`.
pub fn to_commands(events: &[ScriptEvent], offset_ms: u64) -> Vec<TimedCommand> {
    events
        .iter()
        .map(|e| TimedCommand::from_script_event(e, offset_ms))
        .collect()
}
