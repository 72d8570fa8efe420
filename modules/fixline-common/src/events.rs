//! Status events: facts about what the triage core decided.
//!
//! One event per ingest outcome or authority action, consumed by
//! dashboards and notification fan-out. Events serialize to
//! `serde_json::Value` for transport; no wire format is mandated here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusEventKind {
    /// A report founded a new complaint.
    Created,
    /// A report merged into an existing complaint.
    Merged,
    /// An authority action changed the complaint and its priority.
    Rescored,
}

impl StatusEventKind {
    /// The snake_case event type string for this variant.
    pub fn event_type(&self) -> &'static str {
        match self {
            StatusEventKind::Created => "created",
            StatusEventKind::Merged => "merged",
            StatusEventKind::Rescored => "rescored",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusEvent {
    pub complaint_id: Uuid,
    pub kind: StatusEventKind,
    pub timestamp: DateTime<Utc>,
    pub new_score: f64,
}

impl StatusEvent {
    pub fn new(complaint_id: Uuid, kind: StatusEventKind, new_score: f64) -> Self {
        Self {
            complaint_id,
            kind,
            timestamp: Utc::now(),
            new_score,
        }
    }

    /// Serialize this event to a JSON Value for transport.
    pub fn to_payload(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("StatusEvent serialization should never fail")
    }

    pub fn from_payload(payload: &serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(payload.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_strings_are_snake_case() {
        assert_eq!(StatusEventKind::Created.event_type(), "created");
        assert_eq!(StatusEventKind::Merged.event_type(), "merged");
        assert_eq!(StatusEventKind::Rescored.event_type(), "rescored");
    }

    #[test]
    fn event_payload_roundtrip() {
        let event = StatusEvent::new(Uuid::new_v4(), StatusEventKind::Merged, 7.25);
        let payload = event.to_payload();
        assert_eq!(payload["kind"].as_str().unwrap(), "merged");

        let back = StatusEvent::from_payload(&payload).unwrap();
        assert_eq!(back.complaint_id, event.complaint_id);
        assert_eq!(back.kind, StatusEventKind::Merged);
        assert!((back.new_score - 7.25).abs() < f64::EPSILON);
    }
}
