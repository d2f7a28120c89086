//! Shared helpers for tests across the workspace (feature `testing`).

use crate::event::{UiEvent, UiEventKind};
use crate::timeline::Timeline;
use serde_json::Value;

/// Serialize a timeline and strip the non-deterministic fields (`id`,
/// `createdAt`) recursively. Parity between the live path and the replay
/// path is asserted on this value.
pub fn normalize(timeline: &Timeline) -> Value {
    let mut value = serde_json::to_value(timeline).expect("timeline serializes");
    strip(&mut value);
    value
}

fn strip(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.remove("id");
            map.remove("createdAt");
            for entry in map.values_mut() {
                strip(entry);
            }
        }
        Value::Array(items) => {
            for item in items {
                strip(item);
            }
        }
        _ => {}
    }
}

/// Session-scoped event shorthand.
pub fn ev(session: &str, kind: UiEventKind) -> UiEvent {
    UiEvent::for_session(session, kind)
}

/// Unscoped event shorthand.
pub fn ev_any(kind: UiEventKind) -> UiEvent {
    UiEvent::new(kind)
}

/// `showToolAction` payload with only the fields most tests care about.
pub fn tool_action(status: crate::timeline::ActionStatus, text: &str) -> UiEventKind {
    UiEventKind::ShowToolAction {
        status,
        icon: None,
        text: text.to_string(),
        detail: None,
        file_path: None,
        checkpoint_id: None,
        start_line: None,
    }
}
