//! Inbound and outbound control frames on the push channel.
//!
//! Pushed events themselves are serialized [`PushEvent`](tether_events::PushEvent)s;
//! the types here only cover room management.

use serde::{Deserialize, Serialize};
use tether_core::types::DbId;
use tether_events::RoomKey;

/// A frame sent by the client.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ClientMessage {
    JoinDevice { device_id: String },
    JoinUserRoom { user_id: DbId },
    LeaveDevice { device_id: String },
    LeaveUserRoom { user_id: DbId },
}

/// Reply to a [`ClientMessage`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerReply {
    RoomJoined { room: RoomKey },
    RoomLeft { room: RoomKey },
    Error { message: String },
}

impl ServerReply {
    pub fn error(message: impl Into<String>) -> Self {
        ServerReply::Error {
            message: message.into(),
        }
    }
}
