//! Append-only domain event record.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Store-assigned event identifier.
pub type EventId = i64;

/// Structured event payload.
pub type EventPayload = Map<String, Value>;

/// One entry of the event log.
///
/// Only the counted-action coordinator writes events; there is no update or
/// delete path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Option<EventId>,
    /// Domain category of the action, e.g. `toy`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Action identifier, e.g. `recommend_toy`.
    pub name: String,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(kind: impl Into<String>, name: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: None,
            kind: kind.into(),
            name: name.into(),
            payload,
        }
    }

    /// Reads one integer payload field, if present.
    pub fn payload_i64(&self, key: &str) -> Option<i64> {
        self.payload.get(key).and_then(Value::as_i64)
    }
}
