//! Typed room identity.
//!
//! Rooms are addressed by `{kind, id}` instead of hand-built strings. The
//! textual form (`device:pixel-7`, `owner:42`) is only produced for the wire.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};
use tether_core::types::DbId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoomKind {
    /// Commands addressed to a single device.
    Device,
    /// Dashboard updates for everything a user owns.
    Owner,
}

impl RoomKind {
    pub fn prefix(self) -> &'static str {
        match self {
            RoomKind::Device => "device",
            RoomKind::Owner => "owner",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomKey {
    pub kind: RoomKind,
    pub id: String,
}

impl RoomKey {
    pub fn device(device_id: impl Into<String>) -> Self {
        Self {
            kind: RoomKind::Device,
            id: device_id.into(),
        }
    }

    pub fn owner(user_id: DbId) -> Self {
        Self {
            kind: RoomKind::Owner,
            id: user_id.to_string(),
        }
    }
}

impl fmt::Display for RoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.prefix(), self.id)
    }
}

impl Serialize for RoomKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RoomParseError {
    #[error("Room name must have the form '<kind>:<id>'")]
    MissingSeparator,

    #[error("Unknown room kind: '{0}'")]
    UnknownKind(String),

    #[error("Room id must not be empty")]
    EmptyId,

    #[error("Owner room id must be numeric, got '{0}'")]
    InvalidOwnerId(String),
}

impl FromStr for RoomKey {
    type Err = RoomParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, id) = s.split_once(':').ok_or(RoomParseError::MissingSeparator)?;
        if id.is_empty() {
            return Err(RoomParseError::EmptyId);
        }
        match kind {
            "device" => Ok(RoomKey::device(id)),
            "owner" => id
                .parse::<DbId>()
                .map(RoomKey::owner)
                .map_err(|_| RoomParseError::InvalidOwnerId(id.to_string())),
            other => Err(RoomParseError::UnknownKind(other.to_string())),
        }
    }
}
