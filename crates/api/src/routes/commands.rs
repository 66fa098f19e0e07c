//! Route definitions for remote command endpoints.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::commands;
use crate::state::AppState;

/// Routes mounted at `/commands`.
///
/// ```text
/// POST /{id}/lock              -> lock         (owner)
/// POST /{id}/unlock            -> unlock       (owner)
/// POST /{id}/locate            -> locate       (owner)
/// POST /{id}/alarm/start       -> start_alarm  (owner)
/// POST /{id}/alarm/stop        -> stop_alarm   (owner)
/// POST /{id}/wipe              -> wipe         (owner)
/// POST /batch                  -> batch        (owner)
/// GET  /{id}/pending           -> pending      (device)
/// GET  /{id}/history           -> history      (owner)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/batch", post(commands::batch))
        .route("/{id}/lock", post(commands::lock))
        .route("/{id}/unlock", post(commands::unlock))
        .route("/{id}/locate", post(commands::locate))
        .route("/{id}/alarm/start", post(commands::start_alarm))
        .route("/{id}/alarm/stop", post(commands::stop_alarm))
        .route("/{id}/wipe", post(commands::wipe))
        .route("/{id}/pending", get(commands::pending))
        .route("/{id}/history", get(commands::history))
}
