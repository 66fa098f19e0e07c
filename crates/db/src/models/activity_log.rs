//! Per-device audit trail.

use serde::Serialize;
use sqlx::FromRow;
use tether_core::types::{DbId, Timestamp};

/// Known `action` values.
pub mod actions {
    pub const DEVICE_REGISTERED: &str = "device_registered";
    pub const COMMAND_SENT: &str = "command_sent";
    pub const COMMAND_RESOLVED: &str = "command_resolved";
}

/// A row from the `device_logs` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLog {
    pub id: DbId,
    pub device_id: String,
    pub user_id: DbId,
    pub action: String,
    pub details: serde_json::Value,
    pub created_at: Timestamp,
}

/// Insert input for a log entry.
#[derive(Debug, Clone)]
pub struct NewActivityLog {
    pub device_id: String,
    pub user_id: DbId,
    pub action: &'static str,
    pub details: serde_json::Value,
}
