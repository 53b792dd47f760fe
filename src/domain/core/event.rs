use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Event Envelope - metadata around an applied domain event
// ============================================================================

pub trait DomainEvent: Serialize + for<'de> Deserialize<'de> + Clone + Send + Sync {
    fn event_type(&self) -> &'static str;
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope<E> {
    pub event_id: Uuid,
    pub sequence_number: i64,
    pub event_type: String,
    pub event_data: E,

    /// Groups every event produced by one request
    pub correlation_id: Uuid,
    /// User who triggered the change; `None` for guests and the gateway
    pub actor_id: Option<Uuid>,

    pub timestamp: DateTime<Utc>,
}

impl<E: DomainEvent> EventEnvelope<E> {
    pub fn new(sequence_number: i64, event_data: E, correlation_id: Uuid) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            sequence_number,
            event_type: event_data.event_type().to_string(),
            event_data,
            correlation_id,
            actor_id: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_actor(mut self, actor_id: Option<Uuid>) -> Self {
        self.actor_id = actor_id;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
    struct Pinged {
        note: String,
    }

    impl DomainEvent for Pinged {
        fn event_type(&self) -> &'static str {
            "Pinged"
        }
    }

    #[test]
    fn envelope_takes_type_from_event() {
        let correlation_id = Uuid::new_v4();
        let actor = Uuid::new_v4();

        let envelope = EventEnvelope::new(3, Pinged { note: "hi".into() }, correlation_id)
            .with_actor(Some(actor));

        assert_eq!(envelope.event_type, "Pinged");
        assert_eq!(envelope.sequence_number, 3);
        assert_eq!(envelope.correlation_id, correlation_id);
        assert_eq!(envelope.actor_id, Some(actor));
    }

    #[test]
    fn envelope_serializes_camel_case() {
        let envelope = EventEnvelope::new(1, Pinged { note: "x".into() }, Uuid::new_v4());
        let json = serde_json::to_value(&envelope).unwrap();

        assert!(json.get("eventType").is_some());
        assert!(json.get("correlationId").is_some());
        assert_eq!(json["eventData"]["note"], "x");
    }
}
