use std::time::Duration;

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tether_core::error::CoreError;
use tether_core::types::DbId;
use tether_events::RoomKey;
use tokio::sync::mpsc;

use crate::error::AppError;
use crate::state::AppState;
use crate::ws::protocol::{ClientMessage, ServerReply};

/// Interval between server pings (in seconds).
const PING_INTERVAL_SECS: u64 = 30;

/// `?token=` for owners, `?apiKey=` for devices.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WsAuthQuery {
    pub token: Option<String>,
    pub api_key: Option<String>,
}

/// HTTP handler that authenticates and upgrades the connection to WebSocket.
///
/// Credentials are checked before the upgrade so a rejected client receives
/// a plain 401 response instead of a socket that closes immediately.
pub async fn ws_handler(
    State(state): State<AppState>,
    Query(query): Query<WsAuthQuery>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let user_id = match authenticate(&state, &query) {
        Ok(id) => id,
        Err(e) => return AppError::from(e).into_response(),
    };

    match upgrade {
        Ok(ws) => ws.on_upgrade(move |socket| handle_socket(socket, state, user_id)),
        Err(rejection) => rejection.into_response(),
    }
}

fn authenticate(state: &AppState, query: &WsAuthQuery) -> Result<DbId, CoreError> {
    match (&query.token, &query.api_key) {
        (Some(token), _) => state.authenticator.verify_bearer(token),
        (None, Some(key)) => state.authenticator.verify_api_key(key),
        (None, None) => Err(CoreError::Unauthorized(
            "Missing token or apiKey query parameter".into(),
        )),
    }
}

/// Manage a single WebSocket connection after upgrade.
///
/// Splits the socket into a sink (outbound) and stream (inbound), then:
///   1. Registers the connection with the event bus.
///   2. Spawns a sender task that forwards pushes, replies and pings.
///   3. Processes inbound room-management frames on the current task.
///   4. Cleans up on disconnect.
async fn handle_socket(socket: WebSocket, state: AppState, user_id: DbId) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conn_id = %conn_id, user_id, "WebSocket connected");

    let mut push_rx = state.event_bus.connect(conn_id.clone(), Some(user_id)).await;
    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<ServerReply>();

    let (mut sink, mut stream) = socket.split();

    let sender_conn_id = conn_id.clone();
    let send_task = tokio::spawn(async move {
        let mut ping = tokio::time::interval(Duration::from_secs(PING_INTERVAL_SECS));
        // The first tick completes immediately.
        ping.tick().await;

        loop {
            let frame = tokio::select! {
                event = push_rx.recv() => match event {
                    Some(event) => text_frame(&event),
                    None => {
                        // Bus dropped the connection (shutdown).
                        let _ = sink.send(Message::Close(None)).await;
                        break;
                    }
                },
                Some(reply) = reply_rx.recv() => text_frame(&reply),
                _ = ping.tick() => Some(Message::Ping(Default::default())),
            };

            let Some(frame) = frame else { continue };
            if sink.send(frame).await.is_err() {
                tracing::debug!(conn_id = %sender_conn_id, "WebSocket sink closed");
                break;
            }
        }
    });

    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                let reply = handle_client_message(&state, &conn_id, user_id, text.as_str()).await;
                if reply_tx.send(reply).is_err() {
                    break;
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(conn_id = %conn_id, "Pong received");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    state.event_bus.disconnect(&conn_id).await;
    send_task.abort();
    tracing::info!(conn_id = %conn_id, user_id, "WebSocket disconnected");
}

/// Apply one inbound frame and produce the reply to send back.
async fn handle_client_message(
    state: &AppState,
    conn_id: &str,
    user_id: DbId,
    text: &str,
) -> ServerReply {
    let message: ClientMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => return ServerReply::error(format!("Invalid message: {e}")),
    };

    match message {
        ClientMessage::JoinDevice { device_id } => {
            if let Err(e) = state.registry.get_owned(user_id, &device_id).await {
                let (_, _, message) = e.classify();
                return ServerReply::error(message);
            }
            join(state, conn_id, RoomKey::device(device_id)).await
        }
        ClientMessage::JoinUserRoom { user_id: target } => {
            if target != user_id {
                return ServerReply::error("Cannot join another user's room");
            }
            join(state, conn_id, RoomKey::owner(target)).await
        }
        ClientMessage::LeaveDevice { device_id } => {
            leave(state, conn_id, RoomKey::device(device_id)).await
        }
        ClientMessage::LeaveUserRoom { user_id: target } => {
            leave(state, conn_id, RoomKey::owner(target)).await
        }
    }
}

async fn join(state: &AppState, conn_id: &str, room: RoomKey) -> ServerReply {
    if !state.event_bus.subscribe(conn_id, room.clone()).await {
        return ServerReply::error("Connection is no longer registered");
    }
    tracing::debug!(conn_id, room = %room, "Joined room");
    ServerReply::RoomJoined { room }
}

async fn leave(state: &AppState, conn_id: &str, room: RoomKey) -> ServerReply {
    state.event_bus.unsubscribe(conn_id, &room).await;
    tracing::debug!(conn_id, room = %room, "Left room");
    ServerReply::RoomLeft { room }
}

fn text_frame<T: Serialize>(value: &T) -> Option<Message> {
    match serde_json::to_string(value) {
        Ok(json) => Some(Message::Text(json.into())),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to serialize push frame");
            None
        }
    }
}
