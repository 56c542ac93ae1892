// WebSocket endpoint
//
// The bearer token is validated during the handshake, before the upgrade;
// the server decides which rooms the connection joins from the principal's
// role bindings and confirms them with CONNECTION_ESTABLISHED.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::{header::AUTHORIZATION, HeaderMap},
    response::{IntoResponse, Response},
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Mutex};

use crate::auth::{parse_bearer, resolve_principal, AuthError, AuthenticatedUser, Role};
use crate::realtime::events::{EventEnvelope, EventType};
use crate::realtime::rooms::{restaurant_room, user_room};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}

/// Rooms a principal joins: always their own user room, plus one
/// restaurant room per staff binding
pub(crate) fn rooms_for(principal: &AuthenticatedUser) -> Vec<String> {
    let mut rooms = vec![user_room(principal.user_id)];

    for binding in &principal.bindings {
        let staff = matches!(
            binding.role,
            Role::Owner | Role::BranchManager | Role::OrderManager | Role::KitchenStaff
        );
        if let (true, Some(restaurant_id)) = (staff, binding.restaurant_id) {
            let room = restaurant_room(restaurant_id);
            if !rooms.contains(&room) {
                rooms.push(room);
            }
        }
    }

    rooms
}

/// Handler for GET /ws
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Response {
    // Token from the query string (browser clients) or the header
    let token = match query.token {
        Some(token) => token,
        None => {
            let header = headers
                .get(AUTHORIZATION)
                .and_then(|value| value.to_str().ok());
            match header.map(parse_bearer) {
                Some(Ok(token)) => token.to_string(),
                Some(Err(e)) => return e.into_response(),
                None => return AuthError::MissingToken.into_response(),
            }
        }
    };

    let principal = match resolve_principal(&state, &token).await {
        Ok(principal) => principal,
        Err(e) => return e.into_response(),
    };

    let rooms = rooms_for(&principal);
    tracing::info!(
        "WebSocket connection for user {} joining {:?}",
        principal.user_id,
        rooms
    );

    ws.on_upgrade(move |socket| handle_socket(socket, state, principal.user_id, rooms))
}

async fn handle_socket(socket: WebSocket, state: AppState, user_id: i32, rooms: Vec<String>) {
    let (sender, mut receiver) = socket.split();
    let sender = Arc::new(Mutex::new(sender));

    let hello = EventEnvelope::new(
        EventType::ConnectionEstablished,
        serde_json::json!({ "rooms": rooms }),
    );
    {
        let mut sender = sender.lock().await;
        let text = serde_json::to_string(&hello).unwrap_or_default();
        if sender.send(Message::Text(text)).await.is_err() {
            return;
        }
    }

    // One forwarding task per room, funneled into a single per-socket queue
    // so frames stay FIFO on the wire
    let (tx, mut rx) = mpsc::channel::<EventEnvelope>(256);
    let mut forwarders = Vec::with_capacity(rooms.len());
    for room in &rooms {
        let mut room_rx = state.realtime.subscribe(room).await;
        let tx = tx.clone();
        let room = room.clone();
        forwarders.push(tokio::spawn(async move {
            loop {
                match room_rx.recv().await {
                    Ok(event) => {
                        if tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        // At-most-once delivery: a slow consumer just loses
                        // the backlog and refreshes over REST
                        tracing::warn!("Socket for user {} lagged {} events in {}", user_id, skipped, room);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }));
    }
    drop(tx);

    let sender_for_send = Arc::clone(&sender);
    let send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let text = serde_json::to_string(&event).unwrap_or_default();
            let mut sender = sender_for_send.lock().await;
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let sender_for_receive = Arc::clone(&sender);
    let receive_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Ping(data)) => {
                    let mut sender = sender_for_receive.lock().await;
                    if sender.send(Message::Pong(data)).await.is_err() {
                        break;
                    }
                }
                Ok(Message::Close(_)) => {
                    tracing::debug!("WebSocket closed by user {}", user_id);
                    break;
                }
                Ok(_) => {
                    // The channel is push-only; client frames are ignored
                }
                Err(e) => {
                    tracing::debug!("WebSocket error for user {}: {}", user_id, e);
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = send_task => {}
        _ = receive_task => {}
    }

    for task in forwarders {
        task.abort();
    }

    tracing::info!("WebSocket connection closed for user {}", user_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::RoleBinding;

    fn principal(bindings: Vec<RoleBinding>) -> AuthenticatedUser {
        AuthenticatedUser {
            user_id: 11,
            email: "ws@example.com".to_string(),
            bindings,
        }
    }

    #[test]
    fn test_everyone_joins_their_user_room() {
        let rooms = rooms_for(&principal(vec![]));
        assert_eq!(rooms, vec!["user_11".to_string()]);
    }

    #[test]
    fn test_owner_joins_restaurant_room() {
        let rooms = rooms_for(&principal(vec![RoleBinding {
            role: Role::Owner,
            restaurant_id: Some(4),
            branch_id: None,
        }]));
        assert!(rooms.contains(&"user_11".to_string()));
        assert!(rooms.contains(&"restaurant_4".to_string()));
    }

    #[test]
    fn test_driver_joins_only_user_room() {
        let rooms = rooms_for(&principal(vec![RoleBinding {
            role: Role::DriverPlatform,
            restaurant_id: None,
            branch_id: None,
        }]));
        assert_eq!(rooms, vec!["user_11".to_string()]);
    }

    #[test]
    fn test_duplicate_restaurant_bindings_join_once() {
        let rooms = rooms_for(&principal(vec![
            RoleBinding {
                role: Role::Owner,
                restaurant_id: Some(4),
                branch_id: None,
            },
            RoleBinding {
                role: Role::KitchenStaff,
                restaurant_id: Some(4),
                branch_id: Some(1),
            },
        ]));
        assert_eq!(
            rooms,
            vec!["user_11".to_string(), "restaurant_4".to_string()]
        );
    }
}
