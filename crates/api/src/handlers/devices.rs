//! Handlers for device registration, liveness and owner device management.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tether_core::command::CommandStatus;
use tether_core::device::DeviceStatus;
use tether_core::error::CoreError;
use tether_core::types::DbId;
use tether_db::models::activity_log::ActivityLog;
use tether_db::models::command::Command;
use tether_db::models::device::DeviceView;

use crate::engine::registry::{Heartbeat, Registration};
use crate::error::AppResult;
use crate::middleware::auth::{AuthUser, DeviceAuth};
use crate::query::{clamp_limit, LimitQuery};
use crate::state::AppState;

/// Default number of activity log entries returned.
const DEFAULT_LOG_LIMIT: i64 = 50;
/// Maximum number of activity log entries returned.
const MAX_LOG_LIMIT: i64 = 500;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub device_id: Option<String>,
    pub device_name: Option<String>,
    pub model: Option<String>,
    pub platform_version: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub device_id: String,
    pub status: &'static str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatRequest {
    pub status: Option<String>,
    pub battery_level: Option<i16>,
    pub network_type: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingCommandsResponse {
    pub pending_commands: Vec<Command>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResponseRequest {
    pub command_id: DbId,
    pub status: String,
    pub response: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResponseAck {
    pub command_id: DbId,
    pub status: CommandStatus,
}

#[derive(Debug, Serialize)]
pub struct DeviceListResponse {
    pub devices: Vec<DeviceView>,
}

#[derive(Debug, Serialize)]
pub struct DeviceResponse {
    pub device: DeviceView,
}

#[derive(Debug, Serialize)]
pub struct LogsResponse {
    pub logs: Vec<ActivityLog>,
}

// ---------------------------------------------------------------------------
// Device-originated handlers
// ---------------------------------------------------------------------------

/// POST /devices/register
pub async fn register(
    State(state): State<AppState>,
    auth: DeviceAuth,
    Json(input): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<RegisterResponse>)> {
    let (Some(device_id), Some(name)) = (input.device_id, input.device_name) else {
        return Err(CoreError::Validation("deviceId and deviceName are required".into()).into());
    };

    let device = state
        .registry
        .register(
            auth.user_id,
            Registration {
                device_id,
                name,
                model: input.model,
                platform_version: input.platform_version,
            },
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            device_id: device.device_id,
            status: "registered",
        }),
    ))
}

/// POST /devices/{id}/heartbeat
///
/// Returns the device's pending commands so a device without a push channel
/// picks up work on every beat.
pub async fn heartbeat(
    State(state): State<AppState>,
    auth: DeviceAuth,
    Path(device_id): Path<String>,
    body: Option<Json<HeartbeatRequest>>,
) -> AppResult<Json<PendingCommandsResponse>> {
    let input = body.map(|Json(b)| b).unwrap_or_default();
    let status = input.status.as_deref().map(str::parse::<DeviceStatus>).transpose()?;

    state
        .registry
        .heartbeat(
            auth.user_id,
            &device_id,
            Heartbeat {
                status,
                battery_level: input.battery_level,
                network_type: input.network_type,
            },
        )
        .await?;

    let pending_commands = state
        .dispatcher
        .list_pending(auth.user_id, &device_id)
        .await?;
    Ok(Json(PendingCommandsResponse { pending_commands }))
}

/// POST /devices/{id}/command-response
pub async fn command_response(
    State(state): State<AppState>,
    auth: DeviceAuth,
    Path(device_id): Path<String>,
    Json(input): Json<CommandResponseRequest>,
) -> AppResult<Json<CommandResponseAck>> {
    let command = state
        .dispatcher
        .resolve(
            auth.user_id,
            &device_id,
            input.command_id,
            &input.status,
            input.response,
        )
        .await?;

    Ok(Json(CommandResponseAck {
        command_id: command.id,
        status: command.status,
    }))
}

// ---------------------------------------------------------------------------
// Owner handlers
// ---------------------------------------------------------------------------

/// GET /devices
pub async fn list_devices(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<DeviceListResponse>> {
    let now = Utc::now();
    let devices = state
        .registry
        .list_by_owner(user.user_id)
        .await?
        .into_iter()
        .map(|d| DeviceView::at(d, now))
        .collect();
    Ok(Json(DeviceListResponse { devices }))
}

/// GET /devices/{id}
pub async fn get_device(
    State(state): State<AppState>,
    user: AuthUser,
    Path(device_id): Path<String>,
) -> AppResult<Json<DeviceResponse>> {
    let device = state.registry.get_owned(user.user_id, &device_id).await?;
    Ok(Json(DeviceResponse {
        device: DeviceView::at(device, Utc::now()),
    }))
}

/// DELETE /devices/{id}
pub async fn delete_device(
    State(state): State<AppState>,
    user: AuthUser,
    Path(device_id): Path<String>,
) -> AppResult<StatusCode> {
    state.registry.delete(user.user_id, &device_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /devices/{id}/logs
pub async fn device_logs(
    State(state): State<AppState>,
    user: AuthUser,
    Path(device_id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> AppResult<Json<LogsResponse>> {
    let limit = clamp_limit(query.limit, DEFAULT_LOG_LIMIT, MAX_LOG_LIMIT);
    let logs = state.registry.logs(user.user_id, &device_id, limit).await?;
    Ok(Json(LogsResponse { logs }))
}
