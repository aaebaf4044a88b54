//! Community event model and merge rules.

#[cfg(test)]
#[path = "events_test.rs"]
mod events_test;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind tag for a scheduled community event.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    #[default]
    Discussion,
    Ama,
    Challenge,
}

/// One scheduled event in the active community.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommunityEvent {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub kind: EventKind,
    /// Scheduled start, milliseconds since the Unix epoch.
    #[serde(default)]
    pub starts_at: Option<i64>,
    /// Participant counter, floor-clamped at zero by join/leave handling.
    #[serde(default)]
    pub participants: u32,
}

/// Merge descriptive fields only; the participant counter is driven
/// exclusively by join/leave messages.
pub fn merge_event_details(event: &mut CommunityEvent, data: &Value) {
    if let Some(title) = data.get("title").and_then(Value::as_str) {
        event.title = title.to_owned();
    }
    if let Some(description) = data.get("description").and_then(Value::as_str) {
        event.description = description.to_owned();
    }
    if let Some(kind) = data.get("kind") {
        if let Ok(kind) = serde_json::from_value::<EventKind>(kind.clone()) {
            event.kind = kind;
        }
    }
    if let Some(starts_at) = data.get("starts_at").and_then(Value::as_i64) {
        event.starts_at = Some(starts_at);
    }
}

/// Find an event by id.
#[must_use]
pub fn find_event(events: &[CommunityEvent], id: u64) -> Option<&CommunityEvent> {
    events.iter().find(|event| event.id == id)
}

/// Find an event by id, mutably.
pub fn find_event_mut(events: &mut [CommunityEvent], id: u64) -> Option<&mut CommunityEvent> {
    events.iter_mut().find(|event| event.id == id)
}
