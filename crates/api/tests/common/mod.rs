#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use tether_api::auth::jwt::{generate_access_token, JwtConfig};
use tether_api::auth::StaticAuthenticator;
use tether_api::config::ServerConfig;
use tether_api::engine::geofence::LoggingGeofence;
use tether_api::router::build_app_router;
use tether_api::state::AppState;
use tether_db::MemoryStore;
use tether_events::EventBus;

/// API key that authenticates devices owned by user 1.
pub const DEVICE_KEY_1: &str = "device-key-user-1";
/// API key that authenticates devices owned by user 2.
pub const DEVICE_KEY_2: &str = "device-key-user-2";

/// Build a test `ServerConfig` with safe defaults and two device keys.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        database_url: None,
        db_max_connections: 1,
        jwt: JwtConfig {
            secret: "integration-test-secret".to_string(),
            access_token_expiry_mins: 15,
        },
        device_api_keys: HashMap::from([
            (DEVICE_KEY_1.to_string(), 1),
            (DEVICE_KEY_2.to_string(), 2),
        ]),
        log_json: false,
    }
}

/// Build application state over a fresh in-memory store.
pub fn test_state() -> AppState {
    let config = test_config();
    let authenticator = Arc::new(StaticAuthenticator::new(
        config.jwt.clone(),
        &config.device_api_keys,
    ));
    AppState::new(
        config,
        Arc::new(MemoryStore::new()),
        Arc::new(EventBus::new()),
        authenticator,
        Arc::new(LoggingGeofence),
    )
}

/// Build the full application router with all middleware layers.
pub fn build_test_app() -> Router {
    build_test_app_with_state().0
}

/// Like [`build_test_app`], also returning the state so tests can observe
/// the event bus.
pub fn build_test_app_with_state() -> (Router, AppState) {
    let state = test_state();
    let router = build_app_router(state.clone(), &state.config);
    (router, state)
}

/// Mint a Bearer token for `user_id`.
pub fn owner_token(user_id: i64) -> String {
    generate_access_token(user_id, &test_config().jwt).unwrap()
}

pub async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &Router, uri: &str) -> Response {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

pub async fn get_auth(app: &Router, uri: &str, user_id: i64) -> Response {
    let request = Request::builder()
        .uri(uri)
        .header(AUTHORIZATION, format!("Bearer {}", owner_token(user_id)))
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn delete_auth(app: &Router, uri: &str, user_id: i64) -> Response {
    let request = Request::builder()
        .method(Method::DELETE)
        .uri(uri)
        .header(AUTHORIZATION, format!("Bearer {}", owner_token(user_id)))
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn post_json_auth(
    app: &Router,
    uri: &str,
    user_id: i64,
    body: serde_json::Value,
) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(AUTHORIZATION, format!("Bearer {}", owner_token(user_id)))
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn get_device(app: &Router, uri: &str, api_key: &str) -> Response {
    let request = Request::builder()
        .uri(uri)
        .header("x-api-key", api_key)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

pub async fn post_json_device(
    app: &Router,
    uri: &str,
    api_key: &str,
    body: serde_json::Value,
) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("x-api-key", api_key)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

/// Register `device_id` with the given device key.
pub async fn register_device(app: &Router, api_key: &str, device_id: &str) -> Response {
    post_json_device(
        app,
        "/api/v1/devices/register",
        api_key,
        serde_json::json!({
            "deviceId": device_id,
            "deviceName": format!("{device_id} phone"),
            "model": "Pixel 7",
            "platformVersion": "14",
        }),
    )
    .await
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
