//! Recorded sensor sessions.
//!
//! A session is a JSON-lines file; each line is one timestamped input:
//!
//! ```text
//! {"at_ms": 0, "type": "show_scene", "scene": "intro"}
//! {"at_ms": 40, "type": "marker", "corners": [{"x":1,"y":1},{"x":3,"y":1},{"x":3,"y":3},{"x":1,"y":3}]}
//! {"at_ms": 90, "type": "object_captured", "object": "cup"}
//! ```
//!
//! Marker lines are recorded at camera rate: the selection detector only
//! advances when a marker message arrives.

use anyhow::{bail, Context, Result};
use lumen_core::{Bounds, MailboxWriter, MarkerMessage, MarkerRect, Point, Runtime, SceneModel};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionInput {
    Marker { corners: [Point; 4] },
    NoMarker,
    ObjectCaptured { object: String },
    ObjectLost { object: String },
    ObjectMoved { object: String, bounds: Bounds },
    Checkbox { name: String, checked: bool },
    ShowScene { scene: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEntry {
    /// Offset from the start of the session.
    pub at_ms: u64,
    #[serde(flatten)]
    pub input: SessionInput,
}

pub fn parse_session(content: &str) -> Result<Vec<SessionEntry>> {
    let mut entries = Vec::new();
    for (i, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let entry: SessionEntry =
            serde_json::from_str(line).with_context(|| format!("Invalid session entry on line {}", i + 1))?;
        if let Some(prev) = entries.last().map(|e: &SessionEntry| e.at_ms) {
            if entry.at_ms < prev {
                bail!("Session entry on line {} goes back in time ({} < {})", i + 1, entry.at_ms, prev);
            }
        }
        entries.push(entry);
    }
    Ok(entries)
}

pub fn load_session(path: &Path) -> Result<Vec<SessionEntry>> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read session {:?}", path))?;
    parse_session(&content)
}

/// Feed every entry into the runtime at its recorded offset.
pub fn replay(runtime: &Runtime, markers: &MailboxWriter<MarkerMessage>, entries: &[SessionEntry]) {
    let start = Instant::now();
    info!(entries = entries.len(), "Replaying session");
    for entry in entries {
        let due = start + Duration::from_millis(entry.at_ms);
        if let Some(wait) = due.checked_duration_since(Instant::now()) {
            thread::sleep(wait);
        }
        debug!(at_ms = entry.at_ms, input = ?entry.input, "Session input");
        apply(runtime, markers, &entry.input);
    }
    info!(elapsed_ms = start.elapsed().as_millis() as u64, "Session finished");
}

fn apply(runtime: &Runtime, markers: &MailboxWriter<MarkerMessage>, input: &SessionInput) {
    match input {
        SessionInput::Marker { corners } => markers.publish(MarkerMessage::Detected(MarkerRect::new(*corners))),
        SessionInput::NoMarker => markers.publish(MarkerMessage::NoMarker),
        SessionInput::ObjectCaptured { object } => runtime.presence().on_tracking_captured(object),
        SessionInput::ObjectLost { object } => runtime.presence().on_tracking_lost(object),
        SessionInput::ObjectMoved { object, bounds } => runtime.presence().on_tracking_updated(object, *bounds),
        SessionInput::Checkbox { name, checked } => {
            let Some(scene) = runtime.model().current_scene() else {
                warn!(checkbox = %name, "Checkbox input with no current scene");
                return;
            };
            if let Err(e) = runtime.set_checkbox(&scene, name, *checked) {
                warn!(checkbox = %name, error = %e, "Checkbox input failed");
            }
        }
        SessionInput::ShowScene { scene } => {
            if let Err(e) = runtime.show_scene(scene) {
                warn!(scene = %scene, error = %e, "Scene switch failed");
            }
        }
    }
}
