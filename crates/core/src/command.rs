//! Remote command model: types, payloads, statuses and the wipe guard.
//!
//! A command payload is a tagged union keyed by [`CommandType`]. On the wire
//! and at rest it travels as `(type, payload-json)`; [`CommandPayload::from_parts`]
//! and [`CommandPayload::to_parts`] convert between the two shapes so that
//! everything past the boundary works with the typed enum.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Sentinel a FACTORY_RESET payload must carry in `confirmWipe`.
pub const WIPE_CONFIRMATION: &str = "CONFIRM_FACTORY_RESET";

/// Default alarm duration in seconds.
pub const DEFAULT_ALARM_DURATION_SECS: u32 = 30;

/// Longest alarm a single command may request.
pub const MAX_ALARM_DURATION_SECS: u32 = 600;

/// Default alarm volume (percent).
pub const DEFAULT_ALARM_VOLUME: u8 = 100;

/// Maximum alarm volume (percent).
pub const MAX_ALARM_VOLUME: u8 = 100;

/// Maximum length of an on-screen message carried by lock/alarm commands.
pub const MAX_MESSAGE_LEN: usize = 500;

// ---------------------------------------------------------------------------
// CommandType
// ---------------------------------------------------------------------------

/// Closed set of remote-control directives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandType {
    LockDevice,
    UnlockDevice,
    RequestLocation,
    StartAlarm,
    StopAlarm,
    FactoryReset,
}

impl CommandType {
    pub const ALL: [CommandType; 6] = [
        CommandType::LockDevice,
        CommandType::UnlockDevice,
        CommandType::RequestLocation,
        CommandType::StartAlarm,
        CommandType::StopAlarm,
        CommandType::FactoryReset,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CommandType::LockDevice => "LOCK_DEVICE",
            CommandType::UnlockDevice => "UNLOCK_DEVICE",
            CommandType::RequestLocation => "REQUEST_LOCATION",
            CommandType::StartAlarm => "START_ALARM",
            CommandType::StopAlarm => "STOP_ALARM",
            CommandType::FactoryReset => "FACTORY_RESET",
        }
    }

    /// The cached device flag this command changes when it takes effect.
    ///
    /// The dispatcher applies it optimistically at send time; a successful
    /// device response re-applies it and a failed one applies its inverse,
    /// unless a newer command on the same flag has been issued since.
    pub fn flag_effect(self) -> Option<FlagUpdate> {
        match self {
            CommandType::LockDevice => Some(FlagUpdate::Locked(true)),
            CommandType::UnlockDevice => Some(FlagUpdate::Locked(false)),
            CommandType::StartAlarm => Some(FlagUpdate::Alarm(true)),
            CommandType::StopAlarm => Some(FlagUpdate::Alarm(false)),
            CommandType::RequestLocation | CommandType::FactoryReset => None,
        }
    }

    /// Command types that write the same cached flag as `self`.
    pub fn flag_peers(self) -> &'static [CommandType] {
        match self {
            CommandType::LockDevice | CommandType::UnlockDevice => {
                &[CommandType::LockDevice, CommandType::UnlockDevice]
            }
            CommandType::StartAlarm | CommandType::StopAlarm => {
                &[CommandType::StartAlarm, CommandType::StopAlarm]
            }
            CommandType::RequestLocation | CommandType::FactoryReset => &[],
        }
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommandType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CommandType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| CoreError::Validation(format!("Unknown command type: '{s}'")))
    }
}

/// A change to one of the device's cached control flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagUpdate {
    Locked(bool),
    Alarm(bool),
}

impl FlagUpdate {
    pub fn inverse(self) -> Self {
        match self {
            FlagUpdate::Locked(v) => FlagUpdate::Locked(!v),
            FlagUpdate::Alarm(v) => FlagUpdate::Alarm(!v),
        }
    }
}

// ---------------------------------------------------------------------------
// CommandStatus
// ---------------------------------------------------------------------------

/// Command lifecycle: `pending -> completed | failed`, never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandStatus {
    Pending,
    Completed,
    Failed,
}

impl CommandStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CommandStatus::Pending => "pending",
            CommandStatus::Completed => "completed",
            CommandStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, CommandStatus::Pending)
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommandStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(CommandStatus::Pending),
            "completed" => Ok(CommandStatus::Completed),
            "failed" => Ok(CommandStatus::Failed),
            other => Err(CoreError::Validation(format!(
                "Unknown command status: '{other}'"
            ))),
        }
    }
}

/// Parse a status reported by a device, rejecting `pending`.
pub fn parse_terminal_status(s: &str) -> Result<CommandStatus, CoreError> {
    let status: CommandStatus = s.parse()?;
    if !status.is_terminal() {
        return Err(CoreError::Validation(
            "status must be 'completed' or 'failed'".to_string(),
        ));
    }
    Ok(status)
}

// ---------------------------------------------------------------------------
// CommandPayload
// ---------------------------------------------------------------------------

fn default_alarm_duration() -> u32 {
    DEFAULT_ALARM_DURATION_SECS
}

fn default_alarm_volume() -> u8 {
    DEFAULT_ALARM_VOLUME
}

/// Typed command payload, one variant per [`CommandType`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum CommandPayload {
    LockDevice {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    UnlockDevice {},
    RequestLocation {
        #[serde(default)]
        high_accuracy: bool,
    },
    StartAlarm {
        #[serde(default = "default_alarm_duration")]
        duration: u32,
        #[serde(default = "default_alarm_volume")]
        volume: u8,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    StopAlarm {},
    FactoryReset {
        #[serde(default)]
        confirm_wipe: String,
    },
}

impl CommandPayload {
    pub fn command_type(&self) -> CommandType {
        match self {
            CommandPayload::LockDevice { .. } => CommandType::LockDevice,
            CommandPayload::UnlockDevice {} => CommandType::UnlockDevice,
            CommandPayload::RequestLocation { .. } => CommandType::RequestLocation,
            CommandPayload::StartAlarm { .. } => CommandType::StartAlarm,
            CommandPayload::StopAlarm {} => CommandType::StopAlarm,
            CommandPayload::FactoryReset { .. } => CommandType::FactoryReset,
        }
    }

    /// Decode a payload from its type tag and untyped JSON body.
    ///
    /// A `null` body is treated as `{}` so variants whose fields all have
    /// defaults can be sent without a payload.
    pub fn from_parts(
        command_type: CommandType,
        data: serde_json::Value,
    ) -> Result<Self, CoreError> {
        let data = if data.is_null() {
            serde_json::Value::Object(Default::default())
        } else {
            data
        };
        if !data.is_object() {
            return Err(CoreError::Validation(
                "command payload must be a JSON object".to_string(),
            ));
        }
        serde_json::from_value(serde_json::json!({
            "type": command_type.as_str(),
            "payload": data,
        }))
        .map_err(|e| CoreError::Validation(format!("Invalid {command_type} payload: {e}")))
    }

    /// Split into the type tag and the JSON body used on the wire and at rest.
    pub fn to_parts(&self) -> (CommandType, serde_json::Value) {
        let data = match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(mut map)) => map
                .remove("payload")
                .unwrap_or_else(|| serde_json::Value::Object(Default::default())),
            _ => serde_json::Value::Object(Default::default()),
        };
        (self.command_type(), data)
    }

    /// Check field bounds and the destructive-command guard.
    pub fn validate(&self) -> Result<(), CoreError> {
        match self {
            CommandPayload::LockDevice { message } => validate_message(message.as_deref()),
            CommandPayload::StartAlarm {
                duration,
                volume,
                message,
            } => {
                if *duration == 0 || *duration > MAX_ALARM_DURATION_SECS {
                    return Err(CoreError::Validation(format!(
                        "alarm duration must be between 1 and {MAX_ALARM_DURATION_SECS} seconds, got {duration}"
                    )));
                }
                if *volume > MAX_ALARM_VOLUME {
                    return Err(CoreError::Validation(format!(
                        "alarm volume must be between 0 and {MAX_ALARM_VOLUME}, got {volume}"
                    )));
                }
                validate_message(message.as_deref())
            }
            CommandPayload::FactoryReset { confirm_wipe } => validate_wipe_confirmation(confirm_wipe),
            CommandPayload::UnlockDevice {}
            | CommandPayload::RequestLocation { .. }
            | CommandPayload::StopAlarm {} => Ok(()),
        }
    }
}

fn validate_message(message: Option<&str>) -> Result<(), CoreError> {
    match message {
        Some(m) if m.chars().count() > MAX_MESSAGE_LEN => Err(CoreError::Validation(format!(
            "message must be at most {MAX_MESSAGE_LEN} characters"
        ))),
        _ => Ok(()),
    }
}

/// Reject a factory reset unless the caller echoed the exact sentinel.
pub fn validate_wipe_confirmation(token: &str) -> Result<(), CoreError> {
    if token != WIPE_CONFIRMATION {
        return Err(CoreError::Validation(format!(
            "Factory reset requires confirmWipe = \"{WIPE_CONFIRMATION}\""
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
