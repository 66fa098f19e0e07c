//! Credential extractors for Axum handlers.
//!
//! Owners authenticate with `Authorization: Bearer <jwt>`, devices with
//! `X-API-Key: <key>`. Both resolve to the user the request acts for.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use tether_core::error::CoreError;
use tether_core::types::DbId;

use crate::error::AppError;
use crate::state::AppState;

/// Header carrying a device API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Authenticated owner extracted from a JWT Bearer token in the `Authorization` header.
///
/// ```ignore
/// async fn my_handler(user: AuthUser) -> AppResult<Json<()>> {
///     tracing::info!(user_id = user.user_id, "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: DbId,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::Core(CoreError::Unauthorized(
                    "Missing Authorization header".into(),
                ))
            })?;

        let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
            AppError::Core(CoreError::Unauthorized(
                "Invalid Authorization format. Expected: Bearer <token>".into(),
            ))
        })?;

        let user_id = state.authenticator.verify_bearer(token)?;
        Ok(AuthUser { user_id })
    }
}

/// Authenticated device caller extracted from the `X-API-Key` header.
///
/// `user_id` is the user the key was issued to; the device id itself comes
/// from the path and is checked against that user by the engine.
#[derive(Debug, Clone)]
pub struct DeviceAuth {
    pub user_id: DbId,
}

impl FromRequestParts<AppState> for DeviceAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let key = parts
            .headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                AppError::Core(CoreError::Unauthorized("Missing X-API-Key header".into()))
            })?;

        let user_id = state.authenticator.verify_api_key(key)?;
        Ok(DeviceAuth { user_id })
    }
}
