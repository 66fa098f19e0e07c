//! In-process room-based event bus.
//!
//! [`EventBus`] tracks live connections and the rooms they joined. A publish
//! looks up the room's members and pushes the event onto each member's
//! unbounded channel. Nothing is buffered for rooms without members, so the
//! bus is best-effort by construction. Designed to be shared via
//! `Arc<EventBus>` across the application.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use serde::Serialize;
use tether_core::types::{DbId, Timestamp};
use tokio::sync::{mpsc, RwLock};

use crate::room::RoomKey;

/// Opaque identifier of one live transport connection.
pub type ConnectionId = String;

/// Receiver half handed to the transport that owns a connection.
pub type PushReceiver = mpsc::UnboundedReceiver<PushEvent>;

// ---------------------------------------------------------------------------
// PushEvent
// ---------------------------------------------------------------------------

/// An event delivered to every member of a room.
#[derive(Debug, Clone, Serialize)]
pub struct PushEvent {
    /// Event name, e.g. `"remote-command"`.
    pub event: String,
    /// Room the event was published to.
    pub room: RoomKey,
    /// Event-specific JSON body.
    pub data: serde_json::Value,
    /// When the event was published (UTC).
    pub timestamp: Timestamp,
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

struct Connection {
    /// User the transport authenticated as, if any.
    user_id: Option<DbId>,
    sender: mpsc::UnboundedSender<PushEvent>,
    rooms: HashSet<RoomKey>,
    connected_at: Timestamp,
}

#[derive(Default)]
struct Registry {
    connections: HashMap<ConnectionId, Connection>,
    rooms: HashMap<RoomKey, HashSet<ConnectionId>>,
}

impl Registry {
    /// Drop a connection and every membership it holds.
    fn remove_connection(&mut self, conn_id: &str) -> Option<Connection> {
        let conn = self.connections.remove(conn_id)?;
        for room in &conn.rooms {
            self.leave(room, conn_id);
        }
        Some(conn)
    }

    fn leave(&mut self, room: &RoomKey, conn_id: &str) {
        if let Some(members) = self.rooms.get_mut(room) {
            members.remove(conn_id);
            if members.is_empty() {
                self.rooms.remove(room);
            }
        }
    }
}

/// Process-local publish/subscribe hub keyed by [`RoomKey`].
///
/// Thread-safe via interior `RwLock`. Publishing takes only the read lock
/// and never awaits a consumer, so a slow or dead connection cannot stall
/// the write path that triggered the event.
pub struct EventBus {
    registry: RwLock<Registry>,
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self {
            registry: RwLock::new(Registry::default()),
        }
    }

    /// Register a connection and return the receiver for its pushes.
    ///
    /// Re-registering an existing id replaces the old connection and drops
    /// its memberships.
    pub async fn connect(
        &self,
        conn_id: impl Into<ConnectionId>,
        user_id: Option<DbId>,
    ) -> PushReceiver {
        let conn_id = conn_id.into();
        let (tx, rx) = mpsc::unbounded_channel();
        let mut registry = self.registry.write().await;
        registry.remove_connection(&conn_id);
        registry.connections.insert(
            conn_id,
            Connection {
                user_id,
                sender: tx,
                rooms: HashSet::new(),
                connected_at: Utc::now(),
            },
        );
        rx
    }

    /// Remove a connection and all of its room memberships.
    pub async fn disconnect(&self, conn_id: &str) {
        let removed = self.registry.write().await.remove_connection(conn_id);
        if let Some(conn) = removed {
            let connected_secs = (Utc::now() - conn.connected_at).num_seconds();
            tracing::debug!(
                conn_id,
                rooms = conn.rooms.len(),
                connected_secs,
                "Connection left the event bus"
            );
        }
    }

    /// Join `room`. Returns `false` if the connection is unknown.
    pub async fn subscribe(&self, conn_id: &str, room: RoomKey) -> bool {
        let mut registry = self.registry.write().await;
        let Some(conn) = registry.connections.get_mut(conn_id) else {
            return false;
        };
        conn.rooms.insert(room.clone());
        tracing::debug!(conn_id, room = %room, "Joined room");
        registry
            .rooms
            .entry(room)
            .or_default()
            .insert(conn_id.to_string());
        true
    }

    /// Leave `room`. Returns `false` if the connection was not a member.
    pub async fn unsubscribe(&self, conn_id: &str, room: &RoomKey) -> bool {
        let mut registry = self.registry.write().await;
        let was_member = registry
            .connections
            .get_mut(conn_id)
            .is_some_and(|conn| conn.rooms.remove(room));
        if was_member {
            registry.leave(room, conn_id);
            tracing::debug!(conn_id, room = %room, "Left room");
        }
        was_member
    }

    /// Publish an event to every current member of `room`.
    ///
    /// Returns the number of connections the event was handed to. If the
    /// room has no members the event is dropped. Connections whose
    /// receivers are gone are pruned after the fan-out.
    pub async fn publish(&self, room: &RoomKey, event: &str, data: serde_json::Value) -> usize {
        let push = PushEvent {
            event: event.to_string(),
            room: room.clone(),
            data,
            timestamp: Utc::now(),
        };

        let mut delivered = 0;
        let mut stale = Vec::new();
        {
            let registry = self.registry.read().await;
            if let Some(members) = registry.rooms.get(room) {
                for conn_id in members {
                    let Some(conn) = registry.connections.get(conn_id) else {
                        continue;
                    };
                    if conn.sender.send(push.clone()).is_ok() {
                        delivered += 1;
                    } else {
                        stale.push(conn_id.clone());
                    }
                }
            }
        }

        if !stale.is_empty() {
            let mut registry = self.registry.write().await;
            for conn_id in &stale {
                registry.remove_connection(conn_id);
            }
            tracing::debug!(count = stale.len(), "Pruned closed connections");
        }

        if delivered == 0 {
            tracing::trace!(room = %room, event, "No subscribers, push dropped");
        } else {
            tracing::debug!(room = %room, event, delivered, "Push event published");
        }
        delivered
    }

    /// The user a connection authenticated as.
    ///
    /// `None` if the connection is unknown; `Some(None)` if anonymous.
    pub async fn connection_user(&self, conn_id: &str) -> Option<Option<DbId>> {
        self.registry
            .read()
            .await
            .connections
            .get(conn_id)
            .map(|conn| conn.user_id)
    }

    /// Rooms a connection currently belongs to.
    pub async fn rooms_of(&self, conn_id: &str) -> Vec<RoomKey> {
        self.registry
            .read()
            .await
            .connections
            .get(conn_id)
            .map(|conn| conn.rooms.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of connections currently in `room`.
    pub async fn room_size(&self, room: &RoomKey) -> usize {
        self.registry
            .read()
            .await
            .rooms
            .get(room)
            .map_or(0, HashSet::len)
    }

    /// Return the current number of live connections.
    pub async fn connection_count(&self) -> usize {
        self.registry.read().await.connections.len()
    }

    /// Drop every connection. Their receivers observe end-of-stream.
    ///
    /// Used during graceful shutdown.
    pub async fn shutdown_all(&self) {
        let mut registry = self.registry.write().await;
        let count = registry.connections.len();
        registry.connections.clear();
        registry.rooms.clear();
        tracing::info!(count, "Closed all push connections");
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
