//! Decoded server-pushed events.
//!
//! The wire format is a JSON object with a string `type` tag; every other
//! field is event-specific payload:
//!
//! ```text
//! {"type":"incident.created","incidentId":"42","title":"DB down"}
//! ```

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::DecodeError;

/// Tag sent by the server as a keepalive. Delivered like any other event.
pub const HEARTBEAT_TYPE: &str = "heartbeat";

/// A decoded server-pushed message.
///
/// Events are transient: the bus hands a reference to each subscriber and
/// drops it once dispatch completes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(flatten)]
    payload: Map<String, Value>,
}

impl Event {
    /// Build an event directly, for local producers and tests.
    pub fn new(event_type: impl Into<String>, payload: Map<String, Value>) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
        }
    }

    /// Decode a frame body.
    ///
    /// Only a JSON object with a string `type` field becomes an event; the
    /// `type` field is moved out of the payload.
    pub fn decode(data: &str) -> Result<Self, DecodeError> {
        let value: Value = serde_json::from_str(data)?;
        let Value::Object(mut payload) = value else {
            return Err(DecodeError::NotAnObject);
        };

        let event_type = match payload.remove("type") {
            Some(Value::String(t)) => t,
            _ => return Err(DecodeError::MissingType),
        };

        Ok(Self {
            event_type,
            payload,
        })
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// All fields except `type`.
    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    /// A payload field, if it is a string.
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }

    /// The `incidentId` field rendered as a string.
    ///
    /// Services emit the id as either a JSON string or a number.
    pub fn incident_id(&self) -> Option<String> {
        match self.payload.get("incidentId")? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn is_incident_event(&self) -> bool {
        self.event_type.starts_with("incident.")
    }

    pub fn is_heartbeat(&self) -> bool {
        self.event_type == HEARTBEAT_TYPE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_moves_type_out_of_payload() {
        let event = Event::decode(r#"{"type":"incident.created","incidentId":"42"}"#).unwrap();

        assert_eq!(event.event_type(), "incident.created");
        assert_eq!(event.payload().len(), 1);
        assert_eq!(event.str_field("incidentId"), Some("42"));
        assert!(event.field("type").is_none());
    }

    #[test]
    fn test_decode_keeps_nested_payload() {
        let event = Event::decode(
            r#"{"type":"incident.updated","incidentId":7,"changes":{"severity":"HIGH"},"tags":["db"]}"#,
        )
        .unwrap();

        assert_eq!(event.field("changes"), Some(&json!({"severity": "HIGH"})));
        assert_eq!(event.field("tags"), Some(&json!(["db"])));
        assert_eq!(event.incident_id(), Some("7".to_string()));
    }

    #[test]
    fn test_decode_rejects_malformed_frames() {
        assert!(matches!(
            Event::decode("not json"),
            Err(DecodeError::InvalidJson(_))
        ));
        assert_eq!(Event::decode("[1,2]"), Err(DecodeError::NotAnObject));
        assert_eq!(Event::decode(r#""text""#), Err(DecodeError::NotAnObject));
        assert_eq!(
            Event::decode(r#"{"incidentId":"42"}"#),
            Err(DecodeError::MissingType)
        );
        assert_eq!(
            Event::decode(r#"{"type":5}"#),
            Err(DecodeError::MissingType)
        );
    }

    #[test]
    fn test_incident_helpers() {
        let created = Event::decode(r#"{"type":"incident.created"}"#).unwrap();
        let evidence = Event::decode(r#"{"type":"evidence.uploaded"}"#).unwrap();
        let heartbeat = Event::decode(r#"{"type":"heartbeat","eventId":"hb-1"}"#).unwrap();

        assert!(created.is_incident_event());
        assert!(!evidence.is_incident_event());
        assert!(heartbeat.is_heartbeat());
        assert_eq!(created.incident_id(), None);
    }

    #[test]
    fn test_serialize_restores_wire_shape() {
        let event = Event::decode(r#"{"type":"incident.created","incidentId":"42"}"#).unwrap();
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value, json!({"type": "incident.created", "incidentId": "42"}));
    }
}
