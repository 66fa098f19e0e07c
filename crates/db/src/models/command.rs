//! Command rows and the typed command record.
//!
//! The `commands` table keeps the payload as JSON beside a `command_type`
//! column. [`Command`] is the decoded form; decoding happens once, when a row
//! leaves the store.

use serde::Serialize;
use sqlx::FromRow;
use tether_core::command::{CommandPayload, CommandStatus, CommandType};
use tether_core::types::{DbId, Timestamp};

use crate::error::StoreError;

/// A remote command issued against a device.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Command {
    pub id: DbId,
    pub device_id: String,
    /// The issuing user.
    pub user_id: DbId,
    /// Serialized as `"type"` + `"payload"`.
    #[serde(flatten)]
    pub payload: CommandPayload,
    pub status: CommandStatus,
    pub sent_at: Timestamp,
    pub executed_at: Option<Timestamp>,
    pub response: Option<serde_json::Value>,
}

impl Command {
    pub fn command_type(&self) -> CommandType {
        self.payload.command_type()
    }

    /// The untyped payload body, as pushed to devices under `data`.
    pub fn data(&self) -> serde_json::Value {
        self.payload.to_parts().1
    }
}

/// A row from the `commands` table.
#[derive(Debug, Clone, FromRow)]
pub struct CommandRow {
    pub id: DbId,
    pub device_id: String,
    pub user_id: DbId,
    pub command_type: String,
    pub payload: serde_json::Value,
    pub status: String,
    pub response: Option<serde_json::Value>,
    pub sent_at: Timestamp,
    pub executed_at: Option<Timestamp>,
}

impl TryFrom<CommandRow> for Command {
    type Error = StoreError;

    fn try_from(row: CommandRow) -> Result<Self, Self::Error> {
        let command_type: CommandType = row.command_type.parse().map_err(|_| {
            StoreError::corrupt(format!(
                "command {} has unknown type '{}'",
                row.id, row.command_type
            ))
        })?;
        let payload = CommandPayload::from_parts(command_type, row.payload).map_err(|e| {
            StoreError::corrupt(format!("command {} payload: {e}", row.id))
        })?;
        let status = row.status.parse().map_err(|_| {
            StoreError::corrupt(format!("command {} has unknown status '{}'", row.id, row.status))
        })?;
        Ok(Command {
            id: row.id,
            device_id: row.device_id,
            user_id: row.user_id,
            payload,
            status,
            sent_at: row.sent_at,
            executed_at: row.executed_at,
            response: row.response,
        })
    }
}

/// Insert input for a new pending command.
#[derive(Debug, Clone)]
pub struct NewCommand {
    pub device_id: String,
    pub user_id: DbId,
    pub payload: CommandPayload,
    pub sent_at: Timestamp,
}

/// A device-reported outcome for a command.
#[derive(Debug, Clone)]
pub struct CommandResolution {
    pub status: CommandStatus,
    pub response: Option<serde_json::Value>,
    pub executed_at: Timestamp,
}
