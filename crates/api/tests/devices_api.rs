//! Integration tests for device registration, liveness and owner views.

mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use common::{
    body_json, delete_auth, get, get_auth, post_json_device, register_device, DEVICE_KEY_1,
    DEVICE_KEY_2,
};
use serde_json::json;

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

#[tokio::test]
async fn register_returns_201_and_device_is_listed_online() {
    let app = common::build_test_app();

    let response = register_device(&app, DEVICE_KEY_1, "pixel-7").await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json, json!({"deviceId": "pixel-7", "status": "registered"}));

    let json = body_json(get_auth(&app, "/api/v1/devices", 1).await).await;
    let devices = json["devices"].as_array().unwrap();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0]["deviceId"], "pixel-7");
    assert_eq!(devices[0]["isOnline"], true);
    assert_eq!(devices[0]["isLocked"], false);
}

#[tokio::test]
async fn re_registration_updates_in_place() {
    let app = common::build_test_app();
    register_device(&app, DEVICE_KEY_1, "pixel-7").await;

    let response = post_json_device(
        &app,
        "/api/v1/devices/register",
        DEVICE_KEY_1,
        json!({"deviceId": "pixel-7", "deviceName": "Work phone", "platformVersion": "15"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = body_json(get_auth(&app, "/api/v1/devices", 1).await).await;
    let devices = json["devices"].as_array().unwrap();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0]["name"], "Work phone");
    assert_eq!(devices[0]["platformVersion"], "15");
}

#[tokio::test]
async fn registering_another_users_device_is_a_conflict() {
    let app = common::build_test_app();
    register_device(&app, DEVICE_KEY_1, "pixel-7").await;

    let response = register_device(&app, DEVICE_KEY_2, "pixel-7").await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let json = body_json(get_auth(&app, "/api/v1/devices/pixel-7", 1).await).await;
    assert_eq!(json["device"]["userId"], 1);
}

#[tokio::test]
async fn register_without_name_is_rejected() {
    let app = common::build_test_app();

    let response = post_json_device(
        &app,
        "/api/v1/devices/register",
        DEVICE_KEY_1,
        json!({"deviceId": "pixel-7"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}

// ---------------------------------------------------------------------------
// Authentication
// ---------------------------------------------------------------------------

#[tokio::test]
async fn device_routes_require_a_known_api_key() {
    let app = common::build_test_app();

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/devices/register")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"deviceId":"d","deviceName":"n"}"#))
        .unwrap();
    let response = common::send(&app, request).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = register_device(&app, "not-a-key", "pixel-7").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn owner_routes_require_a_bearer_token() {
    let app = common::build_test_app();

    let response = get(&app, "/api/v1/devices").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let request = Request::builder()
        .uri("/api/v1/devices")
        .header("authorization", "Bearer garbage")
        .body(Body::empty())
        .unwrap();
    let response = common::send(&app, request).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// ---------------------------------------------------------------------------
// Ownership isolation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn foreign_device_is_indistinguishable_from_missing() {
    let app = common::build_test_app();
    register_device(&app, DEVICE_KEY_1, "pixel-7").await;

    let foreign = get_auth(&app, "/api/v1/devices/pixel-7", 2).await;
    assert_eq!(foreign.status(), StatusCode::NOT_FOUND);
    let foreign_body = body_json(foreign).await;

    let missing = get_auth(&app, "/api/v1/devices/nope", 2).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    let missing_body = body_json(missing).await;

    assert_eq!(foreign_body["code"], missing_body["code"]);
    assert_eq!(foreign_body["error"], "Device with id pixel-7 not found");

    let json = body_json(get_auth(&app, "/api/v1/devices", 2).await).await;
    assert!(json["devices"].as_array().unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Heartbeat
// ---------------------------------------------------------------------------

#[tokio::test]
async fn heartbeat_updates_battery_and_returns_pending_commands() {
    let app = common::build_test_app();
    register_device(&app, DEVICE_KEY_1, "pixel-7").await;
    common::post_json_auth(&app, "/api/v1/commands/pixel-7/locate", 1, json!({})).await;

    let response = post_json_device(
        &app,
        "/api/v1/devices/pixel-7/heartbeat",
        DEVICE_KEY_1,
        json!({"batteryLevel": 42, "status": "active", "networkType": "wifi"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let pending = json["pendingCommands"].as_array().unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0]["type"], "REQUEST_LOCATION");

    let json = body_json(get_auth(&app, "/api/v1/devices/pixel-7", 1).await).await;
    assert_eq!(json["device"]["batteryLevel"], 42);
    assert_eq!(json["device"]["networkType"], "wifi");
}

#[tokio::test]
async fn heartbeat_rejects_out_of_range_battery() {
    let app = common::build_test_app();
    register_device(&app, DEVICE_KEY_1, "pixel-7").await;

    let response = post_json_device(
        &app,
        "/api/v1/devices/pixel-7/heartbeat",
        DEVICE_KEY_1,
        json!({"batteryLevel": 140}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn heartbeat_for_foreign_device_is_not_found() {
    let app = common::build_test_app();
    register_device(&app, DEVICE_KEY_1, "pixel-7").await;

    let response = post_json_device(
        &app,
        "/api/v1/devices/pixel-7/heartbeat",
        DEVICE_KEY_2,
        json!({}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Delete and logs
// ---------------------------------------------------------------------------

#[tokio::test]
async fn logs_record_registration_and_commands() {
    let app = common::build_test_app();
    register_device(&app, DEVICE_KEY_1, "pixel-7").await;
    common::post_json_auth(&app, "/api/v1/commands/pixel-7/lock", 1, json!({})).await;

    let json = body_json(get_auth(&app, "/api/v1/devices/pixel-7/logs?limit=10", 1).await).await;
    let actions: Vec<&str> = json["logs"]
        .as_array()
        .unwrap()
        .iter()
        .map(|l| l["action"].as_str().unwrap())
        .collect();
    assert_eq!(actions, vec!["command_sent", "device_registered"]);
}

#[tokio::test]
async fn delete_removes_device_and_its_history() {
    let app = common::build_test_app();
    register_device(&app, DEVICE_KEY_1, "pixel-7").await;

    let response = delete_auth(&app, "/api/v1/devices/pixel-7", 2).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = delete_auth(&app, "/api/v1/devices/pixel-7", 1).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = get_auth(&app, "/api/v1/devices/pixel-7", 1).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let response = get_auth(&app, "/api/v1/devices/pixel-7/logs", 1).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
