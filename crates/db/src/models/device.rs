//! Device rows, registration input, and the owner-facing view.

use serde::Serialize;
use sqlx::FromRow;
use tether_core::device::DeviceStatus;
use tether_core::presence;
use tether_core::types::{DbId, Timestamp};

use crate::error::StoreError;

/// A registered device with its cached control flags.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub device_id: String,
    pub user_id: DbId,
    pub name: String,
    pub model: Option<String>,
    pub platform_version: Option<String>,
    pub network_type: Option<String>,
    pub is_locked: bool,
    pub alarm_active: bool,
    /// Percentage, `None` while unknown.
    pub battery_level: Option<i16>,
    pub status: DeviceStatus,
    pub last_seen: Timestamp,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Device {
    pub fn is_owned_by(&self, user_id: DbId) -> bool {
        self.user_id == user_id
    }
}

/// A row from the `devices` table.
#[derive(Debug, Clone, FromRow)]
pub struct DeviceRow {
    pub device_id: String,
    pub user_id: DbId,
    pub name: String,
    pub model: Option<String>,
    pub platform_version: Option<String>,
    pub network_type: Option<String>,
    pub is_locked: bool,
    pub alarm_active: bool,
    pub battery_level: Option<i16>,
    pub status: String,
    pub last_seen: Timestamp,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TryFrom<DeviceRow> for Device {
    type Error = StoreError;

    fn try_from(row: DeviceRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse()
            .map_err(|_| StoreError::corrupt(format!("device status '{}'", row.status)))?;
        Ok(Device {
            device_id: row.device_id,
            user_id: row.user_id,
            name: row.name,
            model: row.model,
            platform_version: row.platform_version,
            network_type: row.network_type,
            is_locked: row.is_locked,
            alarm_active: row.alarm_active,
            battery_level: row.battery_level,
            status,
            last_seen: row.last_seen,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Registration input. Upserted by `device_id`.
#[derive(Debug, Clone)]
pub struct UpsertDevice {
    pub device_id: String,
    pub user_id: DbId,
    pub name: String,
    pub model: Option<String>,
    pub platform_version: Option<String>,
    pub seen_at: Timestamp,
}

/// A device as surfaced to its owner, with presence derived at response time.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceView {
    #[serde(flatten)]
    pub device: Device,
    pub is_online: bool,
}

impl DeviceView {
    /// Attach presence computed against `now`.
    pub fn at(device: Device, now: Timestamp) -> Self {
        let is_online = presence::is_online(device.last_seen, now);
        Self { device, is_online }
    }
}
