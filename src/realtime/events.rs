use chrono::{DateTime, Utc};
use serde::Serialize;

/// Typed events pushed over the realtime channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    // Lifecycle
    OrderPlaced,
    NewOrderPending,
    OrderStatusChanged,
    OrderCancelled,
    // Dispatch
    AvailableOrder,
    AvailableOrderWithdrawn,
    OrderClaimed,
    // Payments
    PaymentReceived,
    PaymentFailed,
    // Connection
    ConnectionEstablished,
}

/// Wire envelope: `{"type": ..., "data": ..., "timestamp": ...}`
///
/// Delivery is at-most-once with no durable queue; clients that reconnect
/// refresh their state over REST.
#[derive(Debug, Clone, Serialize)]
pub struct EventEnvelope {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl EventEnvelope {
    pub fn new(event_type: EventType, data: serde_json::Value) -> Self {
        Self {
            event_type,
            data,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_wire_names() {
        assert_eq!(
            serde_json::to_string(&EventType::OrderPlaced).unwrap(),
            "\"ORDER_PLACED\""
        );
        assert_eq!(
            serde_json::to_string(&EventType::AvailableOrderWithdrawn).unwrap(),
            "\"AVAILABLE_ORDER_WITHDRAWN\""
        );
        assert_eq!(
            serde_json::to_string(&EventType::ConnectionEstablished).unwrap(),
            "\"CONNECTION_ESTABLISHED\""
        );
    }

    #[test]
    fn test_envelope_shape() {
        let envelope = EventEnvelope::new(
            EventType::OrderClaimed,
            serde_json::json!({"orderId": 12}),
        );
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["type"], "ORDER_CLAIMED");
        assert_eq!(json["data"]["orderId"], 12);
        assert!(json["timestamp"].is_string());
    }
}
