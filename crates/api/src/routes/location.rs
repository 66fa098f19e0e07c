//! Route definitions for location endpoints.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::location;
use crate::state::AppState;

/// Routes mounted at `/location`.
///
/// ```text
/// POST /{id}/update            -> update   (device)
/// GET  /{id}/history           -> history  (owner)
/// GET  /{id}/latest            -> latest   (owner)
/// GET  /map                    -> map      (owner)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/map", get(location::map))
        .route("/{id}/update", post(location::update))
        .route("/{id}/history", get(location::history))
        .route("/{id}/latest", get(location::latest))
}
