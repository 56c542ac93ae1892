// Room registry
//
// The only mutable shared state in the process: a map from room name to a
// broadcast channel. Writes happen per-connection (subscribe) and reads
// per-event (emit), so a tokio RwLock around a HashMap is enough.

use std::collections::HashMap;
use tokio::sync::{broadcast, RwLock};

use crate::realtime::events::{EventEnvelope, EventType};

/// Buffered events per room; slow consumers lag and drop (at-most-once)
const ROOM_CAPACITY: usize = 256;

/// In-process fan-out bus addressed by rooms
#[derive(Default)]
pub struct RealtimeBus {
    rooms: RwLock<HashMap<String, broadcast::Sender<EventEnvelope>>>,
}

/// Room joined by a restaurant's owners and branch staff
pub fn restaurant_room(restaurant_id: i32) -> String {
    format!("restaurant_{}", restaurant_id)
}

/// Room joined by a single user's sessions (also used for driver fan-out)
pub fn user_room(user_id: i32) -> String {
    format!("user_{}", user_id)
}

impl RealtimeBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join a room, creating its channel on first subscription
    pub async fn subscribe(&self, room: &str) -> broadcast::Receiver<EventEnvelope> {
        let mut rooms = self.rooms.write().await;
        rooms
            .entry(room.to_string())
            .or_insert_with(|| broadcast::channel(ROOM_CAPACITY).0)
            .subscribe()
    }

    /// Emit an event into a room. Rooms with no subscribers drop the event;
    /// there is no durable queue behind the channel.
    pub async fn emit(&self, room: &str, event_type: EventType, data: serde_json::Value) {
        let envelope = EventEnvelope::new(event_type, data);

        let stale = {
            let rooms = self.rooms.read().await;
            match rooms.get(room) {
                Some(sender) => sender.send(envelope).is_err() && sender.receiver_count() == 0,
                None => false,
            }
        };

        // Last subscriber left; drop the channel so the map does not grow
        // without bound across restaurants and users
        if stale {
            let mut rooms = self.rooms.write().await;
            if let Some(sender) = rooms.get(room) {
                if sender.receiver_count() == 0 {
                    rooms.remove(room);
                }
            }
        }
    }

    pub async fn emit_to_restaurant(
        &self,
        restaurant_id: i32,
        event_type: EventType,
        data: serde_json::Value,
    ) {
        self.emit(&restaurant_room(restaurant_id), event_type, data)
            .await;
    }

    pub async fn emit_to_user(&self, user_id: i32, event_type: EventType, data: serde_json::Value) {
        self.emit(&user_room(user_id), event_type, data).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_names() {
        assert_eq!(restaurant_room(7), "restaurant_7");
        assert_eq!(user_room(42), "user_42");
    }

    #[tokio::test]
    async fn test_subscriber_receives_emitted_event() {
        let bus = RealtimeBus::new();
        let mut rx = bus.subscribe("restaurant_1").await;

        bus.emit_to_restaurant(1, EventType::OrderPlaced, serde_json::json!({"orderId": 5}))
            .await;

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, EventType::OrderPlaced);
        assert_eq!(event.data["orderId"], 5);
    }

    #[tokio::test]
    async fn test_emit_without_subscribers_is_a_noop() {
        let bus = RealtimeBus::new();
        bus.emit_to_user(9, EventType::PaymentFailed, serde_json::json!({}))
            .await;
    }

    #[tokio::test]
    async fn test_rooms_are_isolated() {
        let bus = RealtimeBus::new();
        let mut restaurant_rx = bus.subscribe("restaurant_1").await;
        let mut user_rx = bus.subscribe("user_2").await;

        bus.emit_to_user(2, EventType::AvailableOrder, serde_json::json!({"orderId": 8}))
            .await;

        let event = user_rx.recv().await.unwrap();
        assert_eq!(event.event_type, EventType::AvailableOrder);
        assert!(restaurant_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_events_arrive_in_emit_order() {
        let bus = RealtimeBus::new();
        let mut rx = bus.subscribe("user_1").await;

        for i in 0..5 {
            bus.emit_to_user(1, EventType::OrderStatusChanged, serde_json::json!({"seq": i}))
                .await;
        }

        for i in 0..5 {
            let event = rx.recv().await.unwrap();
            assert_eq!(event.data["seq"], i);
        }
    }

    #[tokio::test]
    async fn test_multiple_subscribers_fan_out() {
        let bus = RealtimeBus::new();
        let mut a = bus.subscribe("restaurant_3").await;
        let mut b = bus.subscribe("restaurant_3").await;

        bus.emit_to_restaurant(3, EventType::OrderClaimed, serde_json::json!({"orderId": 1}))
            .await;

        assert_eq!(a.recv().await.unwrap().event_type, EventType::OrderClaimed);
        assert_eq!(b.recv().await.unwrap().event_type, EventType::OrderClaimed);
    }
}
