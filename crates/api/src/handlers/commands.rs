//! Handlers for issuing remote commands and reading command state.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tether_core::command::{CommandPayload, CommandStatus, CommandType};
use tether_core::types::DbId;
use tether_db::models::command::Command;

use crate::engine::dispatcher::BatchResult;
use crate::error::AppResult;
use crate::handlers::devices::PendingCommandsResponse;
use crate::middleware::auth::{AuthUser, DeviceAuth};
use crate::query::{clamp_limit, LimitQuery};
use crate::state::AppState;

/// Default number of commands returned by the history endpoint.
const DEFAULT_HISTORY_LIMIT: i64 = 50;
/// Maximum number of commands returned by the history endpoint.
const MAX_HISTORY_LIMIT: i64 = 500;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Optional JSON body carrying the type-specific payload fields.
type PayloadBody = Option<Json<serde_json::Value>>;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandCreated {
    pub command_id: DbId,
    #[serde(rename = "type")]
    pub command_type: CommandType,
    pub status: CommandStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    #[serde(default)]
    pub device_ids: Vec<String>,
    #[serde(rename = "type")]
    pub command_type: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub results: Vec<BatchResult>,
}

#[derive(Debug, Serialize)]
pub struct CommandHistoryResponse {
    pub commands: Vec<Command>,
}

// ---------------------------------------------------------------------------
// Issue
// ---------------------------------------------------------------------------

async fn issue(
    state: AppState,
    user: AuthUser,
    device_id: String,
    command_type: CommandType,
    body: PayloadBody,
) -> AppResult<(StatusCode, Json<CommandCreated>)> {
    let data = body.map(|Json(v)| v).unwrap_or_default();
    let payload = CommandPayload::from_parts(command_type, data)?;
    let command = state
        .dispatcher
        .create(user.user_id, &device_id, payload)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CommandCreated {
            command_id: command.id,
            command_type,
            status: command.status,
        }),
    ))
}

/// POST /commands/{id}/lock
pub async fn lock(
    State(state): State<AppState>,
    user: AuthUser,
    Path(device_id): Path<String>,
    body: PayloadBody,
) -> AppResult<(StatusCode, Json<CommandCreated>)> {
    issue(state, user, device_id, CommandType::LockDevice, body).await
}

/// POST /commands/{id}/unlock
pub async fn unlock(
    State(state): State<AppState>,
    user: AuthUser,
    Path(device_id): Path<String>,
    body: PayloadBody,
) -> AppResult<(StatusCode, Json<CommandCreated>)> {
    issue(state, user, device_id, CommandType::UnlockDevice, body).await
}

/// POST /commands/{id}/locate
pub async fn locate(
    State(state): State<AppState>,
    user: AuthUser,
    Path(device_id): Path<String>,
    body: PayloadBody,
) -> AppResult<(StatusCode, Json<CommandCreated>)> {
    issue(state, user, device_id, CommandType::RequestLocation, body).await
}

/// POST /commands/{id}/alarm/start
pub async fn start_alarm(
    State(state): State<AppState>,
    user: AuthUser,
    Path(device_id): Path<String>,
    body: PayloadBody,
) -> AppResult<(StatusCode, Json<CommandCreated>)> {
    issue(state, user, device_id, CommandType::StartAlarm, body).await
}

/// POST /commands/{id}/alarm/stop
pub async fn stop_alarm(
    State(state): State<AppState>,
    user: AuthUser,
    Path(device_id): Path<String>,
    body: PayloadBody,
) -> AppResult<(StatusCode, Json<CommandCreated>)> {
    issue(state, user, device_id, CommandType::StopAlarm, body).await
}

/// POST /commands/{id}/wipe
///
/// Rejected with 400 unless the body carries the exact `confirmWipe` token.
pub async fn wipe(
    State(state): State<AppState>,
    user: AuthUser,
    Path(device_id): Path<String>,
    body: PayloadBody,
) -> AppResult<(StatusCode, Json<CommandCreated>)> {
    issue(state, user, device_id, CommandType::FactoryReset, body).await
}

/// POST /commands/batch
pub async fn batch(
    State(state): State<AppState>,
    user: AuthUser,
    Json(input): Json<BatchRequest>,
) -> AppResult<Json<BatchResponse>> {
    let command_type: CommandType = input.command_type.parse()?;
    let payload = CommandPayload::from_parts(command_type, input.payload)?;
    let results = state
        .dispatcher
        .batch_create(user.user_id, &input.device_ids, payload)
        .await?;
    Ok(Json(BatchResponse { results }))
}

// ---------------------------------------------------------------------------
// Read
// ---------------------------------------------------------------------------

/// GET /commands/{id}/pending
///
/// Polling fallback for devices that missed the push.
pub async fn pending(
    State(state): State<AppState>,
    auth: DeviceAuth,
    Path(device_id): Path<String>,
) -> AppResult<Json<PendingCommandsResponse>> {
    let pending_commands = state
        .dispatcher
        .list_pending(auth.user_id, &device_id)
        .await?;
    Ok(Json(PendingCommandsResponse { pending_commands }))
}

/// GET /commands/{id}/history
pub async fn history(
    State(state): State<AppState>,
    user: AuthUser,
    Path(device_id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> AppResult<Json<CommandHistoryResponse>> {
    let limit = clamp_limit(query.limit, DEFAULT_HISTORY_LIMIT, MAX_HISTORY_LIMIT);
    let commands = state
        .dispatcher
        .history(user.user_id, &device_id, limit)
        .await?;
    Ok(Json(CommandHistoryResponse { commands }))
}
