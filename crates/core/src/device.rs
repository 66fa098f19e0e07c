//! Device registration fields and their validation rules.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Maximum length of a client-supplied device identifier.
pub const MAX_DEVICE_ID_LEN: usize = 128;

/// Maximum length of a device display name.
pub const MAX_DEVICE_NAME_LEN: usize = 255;

/// Battery levels are percentages.
pub const MAX_BATTERY_LEVEL: i16 = 100;

/// Administrative device status reported by the device itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Active,
    Inactive,
}

impl DeviceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceStatus::Active => "active",
            DeviceStatus::Inactive => "inactive",
        }
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(DeviceStatus::Active),
            "inactive" => Ok(DeviceStatus::Inactive),
            other => Err(CoreError::Validation(format!(
                "Unknown device status: '{other}'"
            ))),
        }
    }
}

/// Validate a client-supplied device identifier.
///
/// Identifiers are opaque but must be non-blank, bounded, and free of
/// whitespace and `:` (the room-key separator).
pub fn validate_device_id(device_id: &str) -> Result<(), CoreError> {
    if device_id.is_empty() {
        return Err(CoreError::Validation("deviceId is required".to_string()));
    }
    if device_id.len() > MAX_DEVICE_ID_LEN {
        return Err(CoreError::Validation(format!(
            "deviceId must be at most {MAX_DEVICE_ID_LEN} characters"
        )));
    }
    if device_id.chars().any(|c| c.is_whitespace() || c == ':') {
        return Err(CoreError::Validation(
            "deviceId must not contain whitespace or ':'".to_string(),
        ));
    }
    Ok(())
}

/// Validate a device display name.
pub fn validate_device_name(name: &str) -> Result<(), CoreError> {
    if name.trim().is_empty() {
        return Err(CoreError::Validation("deviceName is required".to_string()));
    }
    if name.chars().count() > MAX_DEVICE_NAME_LEN {
        return Err(CoreError::Validation(format!(
            "deviceName must be at most {MAX_DEVICE_NAME_LEN} characters"
        )));
    }
    Ok(())
}

/// Validate a reported battery percentage.
pub fn validate_battery_level(level: i16) -> Result<(), CoreError> {
    if !(0..=MAX_BATTERY_LEVEL).contains(&level) {
        return Err(CoreError::Validation(format!(
            "batteryLevel must be between 0 and {MAX_BATTERY_LEVEL}, got {level}"
        )));
    }
    Ok(())
}
