//! Command dispatcher: the remote-command state machine.
//!
//! A command is written `pending`, the device's cached flag is updated
//! optimistically, and the command is pushed to the `device:{id}` room.
//! Devices that miss the push poll [`CommandDispatcher::list_pending`].
//! The device's response moves the command to `completed` or `failed` and
//! reconciles the cached flag when no newer command on that flag exists.
//! Flag writes happen after the command row is stored and never fail the
//! request.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tether_core::command::{parse_terminal_status, CommandPayload, CommandStatus, FlagUpdate};
use tether_core::error::CoreError;
use tether_core::types::DbId;
use tether_db::models::activity_log::actions;
use tether_db::models::command::{Command, CommandResolution, NewCommand};
use tether_db::Store;
use tether_events::{names, EventBus, RoomKey};

use crate::engine::registry::DeviceRegistry;
use crate::error::{AppError, AppResult};

/// Most devices a single batch request may address.
pub const MAX_BATCH_DEVICES: usize = 100;

/// Outcome of one device within a batch request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub device_id: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_id: Option<DbId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct CommandDispatcher {
    store: Arc<dyn Store>,
    event_bus: Arc<EventBus>,
    registry: Arc<DeviceRegistry>,
}

impl CommandDispatcher {
    pub fn new(
        store: Arc<dyn Store>,
        event_bus: Arc<EventBus>,
        registry: Arc<DeviceRegistry>,
    ) -> Self {
        Self {
            store,
            event_bus,
            registry,
        }
    }

    /// Issue a command against an owned device.
    ///
    /// The payload is validated before anything is written, so a rejected
    /// factory reset leaves no trace.
    pub async fn create(
        &self,
        user_id: DbId,
        device_id: &str,
        payload: CommandPayload,
    ) -> AppResult<Command> {
        payload.validate()?;
        self.create_validated(user_id, device_id, payload).await
    }

    async fn create_validated(
        &self,
        user_id: DbId,
        device_id: &str,
        payload: CommandPayload,
    ) -> AppResult<Command> {
        self.registry.get_owned(user_id, device_id).await?;

        let command = self
            .store
            .insert_command(&NewCommand {
                device_id: device_id.to_string(),
                user_id,
                payload,
                sent_at: Utc::now(),
            })
            .await?;
        let command_type = command.command_type();

        if let Some(effect) = command_type.flag_effect() {
            self.write_flag(command.id, device_id, effect).await;
        }

        tracing::info!(
            command_id = command.id,
            device_id,
            user_id,
            command_type = %command_type,
            "Command created",
        );

        self.registry
            .record_activity(
                device_id,
                user_id,
                actions::COMMAND_SENT,
                json!({ "commandId": command.id, "type": command_type }),
            )
            .await;

        let delivered = self
            .event_bus
            .publish(
                &RoomKey::device(device_id),
                names::REMOTE_COMMAND,
                json!({
                    "commandId": command.id,
                    "type": command_type,
                    "data": command.data(),
                    "timestamp": command.sent_at,
                }),
            )
            .await;
        if delivered == 0 {
            tracing::debug!(command_id = command.id, device_id, "Device not connected, left for polling");
        }

        Ok(command)
    }

    /// Apply a device-reported outcome to one of its commands.
    ///
    /// Repeated calls overwrite the previous outcome. The cached flag is set
    /// from the outcome (`completed` re-applies the command's effect and
    /// `failed` applies its inverse), but only while this command is the
    /// newest one touching that flag.
    pub async fn resolve(
        &self,
        user_id: DbId,
        device_id: &str,
        command_id: DbId,
        status: &str,
        response: Option<serde_json::Value>,
    ) -> AppResult<Command> {
        let status = parse_terminal_status(status)?;
        self.registry.get_owned(user_id, device_id).await?;

        let command_not_found = || CoreError::NotFound {
            entity: "Command",
            id: command_id.to_string(),
        };
        match self.store.find_command(command_id).await? {
            Some(command) if command.device_id == device_id => {}
            _ => return Err(command_not_found().into()),
        }

        let command = self
            .store
            .resolve_command(
                command_id,
                &CommandResolution {
                    status,
                    response,
                    executed_at: Utc::now(),
                },
            )
            .await?
            .ok_or_else(command_not_found)?;
        let command_type = command.command_type();

        if let Some(effect) = command_type.flag_effect() {
            let update = match status {
                CommandStatus::Failed => effect.inverse(),
                _ => effect,
            };
            self.reconcile_flag(&command, update).await;
        }

        tracing::info!(
            command_id,
            device_id,
            status = %status,
            command_type = %command_type,
            "Command resolved",
        );

        self.registry
            .record_activity(
                device_id,
                user_id,
                actions::COMMAND_RESOLVED,
                json!({ "commandId": command_id, "type": command_type, "status": status }),
            )
            .await;

        self.event_bus
            .publish(
                &RoomKey::owner(command.user_id),
                names::COMMAND_EXECUTED,
                json!({
                    "deviceId": device_id,
                    "commandId": command_id,
                    "type": command_type,
                    "status": status,
                    "response": command.response,
                }),
            )
            .await;

        Ok(command)
    }

    async fn reconcile_flag(&self, command: &Command, update: FlagUpdate) {
        let peers = command.command_type().flag_peers();
        match self.store.latest_command_id(&command.device_id, peers).await {
            Ok(Some(latest)) if latest == command.id => {
                self.write_flag(command.id, &command.device_id, update).await;
            }
            Ok(latest) => {
                tracing::debug!(
                    command_id = command.id,
                    device_id = %command.device_id,
                    superseded_by = ?latest,
                    "Newer command owns the flag, skipping reconcile",
                );
            }
            Err(e) => {
                tracing::warn!(
                    command_id = command.id,
                    device_id = %command.device_id,
                    error = %e,
                    "Failed to look up latest command for flag reconcile",
                );
            }
        }
    }

    /// The command row is already stored; a failed flag write is logged only.
    async fn write_flag(&self, command_id: DbId, device_id: &str, update: FlagUpdate) {
        if let Err(e) = self.registry.apply_flag(device_id, update).await {
            tracing::warn!(
                command_id,
                device_id,
                ?update,
                error = %e,
                "Failed to update cached device flag",
            );
        }
    }

    /// Pending commands for an owned device, oldest first.
    ///
    /// Polling does not mark anything delivered; a command stays pending
    /// until the device resolves it.
    pub async fn list_pending(&self, user_id: DbId, device_id: &str) -> AppResult<Vec<Command>> {
        self.registry.get_owned(user_id, device_id).await?;
        Ok(self.store.list_pending_commands(device_id).await?)
    }

    /// Command history for an owned device, newest first.
    pub async fn history(
        &self,
        user_id: DbId,
        device_id: &str,
        limit: i64,
    ) -> AppResult<Vec<Command>> {
        self.registry.get_owned(user_id, device_id).await?;
        Ok(self.store.list_commands(device_id, limit).await?)
    }

    /// Issue the same command to several devices.
    ///
    /// The payload is validated once; each device then succeeds or fails on
    /// its own and failures do not stop the remaining devices.
    pub async fn batch_create(
        &self,
        user_id: DbId,
        device_ids: &[String],
        payload: CommandPayload,
    ) -> AppResult<Vec<BatchResult>> {
        if device_ids.is_empty() || device_ids.len() > MAX_BATCH_DEVICES {
            return Err(AppError::BadRequest(format!(
                "deviceIds must contain between 1 and {MAX_BATCH_DEVICES} entries"
            )));
        }
        payload.validate()?;

        let mut results = Vec::with_capacity(device_ids.len());
        for device_id in device_ids {
            let result = match self
                .create_validated(user_id, device_id, payload.clone())
                .await
            {
                Ok(command) => BatchResult {
                    device_id: device_id.clone(),
                    success: true,
                    command_id: Some(command.id),
                    error: None,
                },
                Err(err) => {
                    let (_, _, message) = err.classify();
                    BatchResult {
                        device_id: device_id.clone(),
                        success: false,
                        command_id: None,
                        error: Some(message),
                    }
                }
            };
            results.push(result);
        }

        let succeeded = results.iter().filter(|r| r.success).count();
        tracing::info!(
            user_id,
            requested = device_ids.len(),
            succeeded,
            "Batch command processed",
        );
        Ok(results)
    }
}
