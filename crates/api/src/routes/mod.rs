pub mod commands;
pub mod devices;
pub mod health;
pub mod location;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /ws                                  WebSocket push channel (?token= | ?apiKey=)
///
/// /devices                             list (owner)
/// /devices/register                    upsert (device)
/// /devices/{id}                        get, delete (owner)
/// /devices/{id}/heartbeat              liveness (device)
/// /devices/{id}/command-response       resolve command (device)
/// /devices/{id}/logs                   activity log (owner)
///
/// /commands/{id}/lock|unlock|locate    issue command (owner)
/// /commands/{id}/alarm/start|stop      issue command (owner)
/// /commands/{id}/wipe                  factory reset (owner)
/// /commands/batch                      fan-out (owner)
/// /commands/{id}/pending               polling fallback (device)
/// /commands/{id}/history               history (owner)
///
/// /location/{id}/update                ingest (device)
/// /location/{id}/history               history + summary (owner)
/// /location/{id}/latest                latest sample (owner)
/// /location/map                        map data (owner)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .nest("/devices", devices::router())
        .nest("/commands", commands::router())
        .nest("/location", location::router())
}
