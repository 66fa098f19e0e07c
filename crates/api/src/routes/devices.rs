//! Route definitions for device endpoints.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::devices;
use crate::state::AppState;

/// Routes mounted at `/devices`.
///
/// Device-originated routes authenticate with `X-API-Key`, owner routes with
/// a Bearer token (enforced by handler extractors).
///
/// ```text
/// POST   /register                  -> register          (device)
/// POST   /{id}/heartbeat            -> heartbeat         (device)
/// POST   /{id}/command-response     -> command_response  (device)
/// GET    /                          -> list_devices      (owner)
/// GET    /{id}                      -> get_device        (owner)
/// DELETE /{id}                      -> delete_device     (owner)
/// GET    /{id}/logs                 -> device_logs       (owner)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(devices::list_devices))
        .route("/register", post(devices::register))
        .route(
            "/{id}",
            get(devices::get_device).delete(devices::delete_device),
        )
        .route("/{id}/heartbeat", post(devices::heartbeat))
        .route("/{id}/command-response", post(devices::command_response))
        .route("/{id}/logs", get(devices::device_logs))
}
