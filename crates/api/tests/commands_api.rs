//! Integration tests for the remote command lifecycle over HTTP.

mod common;

use axum::http::StatusCode;
use common::{body_json, get_auth, get_device, post_json_auth, post_json_device, register_device};
use common::{DEVICE_KEY_1, DEVICE_KEY_2};
use serde_json::json;
use tether_events::RoomKey;

// ---------------------------------------------------------------------------
// Test: lock -> push -> device response -> owner notification
// ---------------------------------------------------------------------------

#[tokio::test]
async fn lock_round_trip_pushes_and_notifies_owner() {
    let (app, state) = common::build_test_app_with_state();
    register_device(&app, DEVICE_KEY_1, "pixel-7").await;

    let mut phone = state.event_bus.connect("phone", Some(1)).await;
    assert!(state.event_bus.subscribe("phone", RoomKey::device("pixel-7")).await);
    let mut dashboard = state.event_bus.connect("dashboard", Some(1)).await;
    assert!(state.event_bus.subscribe("dashboard", RoomKey::owner(1)).await);

    let response = post_json_auth(
        &app,
        "/api/v1/commands/pixel-7/lock",
        1,
        json!({"message": "Found? Call 555-0100"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    assert_eq!(created["type"], "LOCK_DEVICE");
    assert_eq!(created["status"], "pending");
    let command_id = created["commandId"].as_i64().unwrap();

    let push = phone.try_recv().expect("device room should receive the command");
    assert_eq!(push.event, "remote-command");
    assert_eq!(push.data["commandId"], command_id);
    assert_eq!(push.data["data"]["message"], "Found? Call 555-0100");

    // Optimistic flag.
    let json = body_json(get_auth(&app, "/api/v1/devices/pixel-7", 1).await).await;
    assert_eq!(json["device"]["isLocked"], true);

    let response = post_json_device(
        &app,
        "/api/v1/devices/pixel-7/command-response",
        DEVICE_KEY_1,
        json!({"commandId": command_id, "status": "completed", "response": {"lockedAt": 1}}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({"commandId": command_id, "status": "completed"})
    );

    let notice = dashboard
        .try_recv()
        .expect("owner room should receive the outcome");
    assert_eq!(notice.event, "command-executed");
    assert_eq!(notice.room, RoomKey::owner(1));
    assert_eq!(notice.data["deviceId"], "pixel-7");
    assert_eq!(notice.data["type"], "LOCK_DEVICE");
    assert_eq!(notice.data["response"]["lockedAt"], 1);

    let json = body_json(get_auth(&app, "/api/v1/commands/pixel-7/history", 1).await).await;
    let commands = json["commands"].as_array().unwrap();
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0]["status"], "completed");
    assert!(commands[0]["executedAt"].is_string());
}

#[tokio::test]
async fn failed_lock_reverts_the_cached_flag() {
    let app = common::build_test_app();
    register_device(&app, DEVICE_KEY_1, "pixel-7").await;

    let created = body_json(post_json_auth(&app, "/api/v1/commands/pixel-7/lock", 1, json!({})).await).await;

    post_json_device(
        &app,
        "/api/v1/devices/pixel-7/command-response",
        DEVICE_KEY_1,
        json!({"commandId": created["commandId"], "status": "failed"}),
    )
    .await;

    let json = body_json(get_auth(&app, "/api/v1/devices/pixel-7", 1).await).await;
    assert_eq!(json["device"]["isLocked"], false);
}

#[tokio::test]
async fn command_without_body_uses_defaults() {
    let app = common::build_test_app();
    register_device(&app, DEVICE_KEY_1, "pixel-7").await;

    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/api/v1/commands/pixel-7/alarm/start")
        .header("authorization", format!("Bearer {}", common::owner_token(1)))
        .body(axum::body::Body::empty())
        .unwrap();
    let response = common::send(&app, request).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = body_json(get_device(&app, "/api/v1/commands/pixel-7/pending", DEVICE_KEY_1).await).await;
    let pending = json["pendingCommands"].as_array().unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0]["payload"]["duration"], 30);
    assert_eq!(pending[0]["payload"]["volume"], 100);
}

// ---------------------------------------------------------------------------
// Wipe guard
// ---------------------------------------------------------------------------

#[tokio::test]
async fn wipe_requires_exact_confirmation() {
    let app = common::build_test_app();
    register_device(&app, DEVICE_KEY_1, "pixel-7").await;

    for body in [json!({}), json!({"confirmWipe": "confirm_factory_reset"})] {
        let response = post_json_auth(&app, "/api/v1/commands/pixel-7/wipe", 1, body).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
    let json = body_json(get_auth(&app, "/api/v1/commands/pixel-7/history", 1).await).await;
    assert!(json["commands"].as_array().unwrap().is_empty());

    let response = post_json_auth(
        &app,
        "/api/v1/commands/pixel-7/wipe",
        1,
        json!({"confirmWipe": "CONFIRM_FACTORY_RESET"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_json(response).await["type"], "FACTORY_RESET");
}

// ---------------------------------------------------------------------------
// Ownership and resolution errors
// ---------------------------------------------------------------------------

#[tokio::test]
async fn commands_to_foreign_devices_are_not_found() {
    let app = common::build_test_app();
    register_device(&app, DEVICE_KEY_1, "pixel-7").await;

    let response = post_json_auth(&app, "/api/v1/commands/pixel-7/lock", 2, json!({})).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = get_device(&app, "/api/v1/commands/pixel-7/pending", DEVICE_KEY_2).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn command_response_validation() {
    let app = common::build_test_app();
    register_device(&app, DEVICE_KEY_1, "pixel-7").await;
    let created = body_json(post_json_auth(&app, "/api/v1/commands/pixel-7/locate", 1, json!({})).await).await;

    let response = post_json_device(
        &app,
        "/api/v1/devices/pixel-7/command-response",
        DEVICE_KEY_1,
        json!({"commandId": created["commandId"], "status": "pending"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = post_json_device(
        &app,
        "/api/v1/devices/pixel-7/command-response",
        DEVICE_KEY_1,
        json!({"commandId": 999_999, "status": "completed"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn second_resolution_wins() {
    let app = common::build_test_app();
    register_device(&app, DEVICE_KEY_1, "pixel-7").await;
    let created = body_json(post_json_auth(&app, "/api/v1/commands/pixel-7/locate", 1, json!({})).await).await;

    for status in ["completed", "failed"] {
        let response = post_json_device(
            &app,
            "/api/v1/devices/pixel-7/command-response",
            DEVICE_KEY_1,
            json!({"commandId": created["commandId"], "status": status}),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let json = body_json(get_auth(&app, "/api/v1/commands/pixel-7/history", 1).await).await;
    assert_eq!(json["commands"][0]["status"], "failed");
}

#[tokio::test]
async fn pending_lists_in_issue_order() {
    let app = common::build_test_app();
    register_device(&app, DEVICE_KEY_1, "pixel-7").await;
    for path in ["lock", "locate", "alarm/stop"] {
        post_json_auth(&app, &format!("/api/v1/commands/pixel-7/{path}"), 1, json!({})).await;
    }

    let json = body_json(get_device(&app, "/api/v1/commands/pixel-7/pending", DEVICE_KEY_1).await).await;
    let types: Vec<&str> = json["pendingCommands"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["type"].as_str().unwrap())
        .collect();
    assert_eq!(types, vec!["LOCK_DEVICE", "REQUEST_LOCATION", "STOP_ALARM"]);
}

// ---------------------------------------------------------------------------
// Batch
// ---------------------------------------------------------------------------

#[tokio::test]
async fn batch_reports_per_device_outcomes() {
    let app = common::build_test_app();
    register_device(&app, DEVICE_KEY_1, "pixel-7").await;
    register_device(&app, DEVICE_KEY_1, "tablet").await;
    register_device(&app, DEVICE_KEY_2, "not-mine").await;

    let response = post_json_auth(
        &app,
        "/api/v1/commands/batch",
        1,
        json!({"deviceIds": ["pixel-7", "not-mine", "tablet"], "type": "LOCK_DEVICE"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let results = json["results"].as_array().unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0]["success"], true);
    assert!(results[0]["commandId"].is_i64());
    assert_eq!(results[1]["success"], false);
    assert_eq!(results[1]["error"], "Device with id not-mine not found");
    assert!(results[1].get("commandId").is_none());
    assert_eq!(results[2]["success"], true);
}

#[tokio::test]
async fn batch_rejects_bad_requests_up_front() {
    let app = common::build_test_app();

    let response = post_json_auth(
        &app,
        "/api/v1/commands/batch",
        1,
        json!({"deviceIds": [], "type": "LOCK_DEVICE"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let too_many: Vec<String> = (0..101).map(|i| format!("d{i}")).collect();
    let response = post_json_auth(
        &app,
        "/api/v1/commands/batch",
        1,
        json!({"deviceIds": too_many, "type": "LOCK_DEVICE"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = post_json_auth(
        &app,
        "/api/v1/commands/batch",
        1,
        json!({"deviceIds": ["d1"], "type": "SELF_DESTRUCT"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = post_json_auth(
        &app,
        "/api/v1/commands/batch",
        1,
        json!({"deviceIds": ["d1"], "type": "FACTORY_RESET", "payload": {}}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
