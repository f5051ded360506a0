//! Integration tests for ssb-api endpoints
//!
//! Tests cover:
//! - Savings goals CRUD, validation, add-money completion edge, stats
//! - Bill session lifecycle (upload gates, retry, reset, stale discard)
//! - Assignment ledger operations and derived shares
//! - Work-time estimator
//! - Health endpoint
//!
//! The gateway client is constructed without an API key, so extraction
//! requests fail fast inside the spawned task without touching the
//! network; tests drive the session to FAILED that way.

use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot` method

use ssb_api::extraction::gateway_client::GatewayClient;
use ssb_api::models::ExtractionState;
use ssb_api::{build_router, AppState};
use ssb_common::config::GatewayConfig;
use ssb_common::events::EventBus;

/// Test helper: Build app state over a throwaway data folder
///
/// Uses GatewayConfig::default() (not load()) so ambient environment
/// variables cannot leak an API key into the tests.
async fn setup_state() -> (AppState, TempDir) {
    let dir = TempDir::new().expect("Should create temp dir");
    let data_folder = dir.path().to_path_buf();
    ssb_common::config::ensure_data_folder(&data_folder).expect("Should prepare data folder");

    let db = ssb_api::db::init_database_pool(&data_folder.join("ssb.db"))
        .await
        .expect("Should init database");
    let event_bus = EventBus::new(100);
    let gateway = GatewayClient::new(&GatewayConfig::default());

    (AppState::new(db, event_bus, gateway, data_folder), dir)
}

/// Test helper: Create app with test state
async fn setup_app() -> (axum::Router, TempDir) {
    let (state, dir) = setup_state().await;
    (build_router(state), dir)
}

/// Test helper: Create request with empty body
fn test_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Test helper: Create request with a JSON body
fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Test helper: Extract JSON body from response
async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

/// Test helper: Poll GET /api/bill until the predicate holds
async fn poll_bill_until(app: &axum::Router, pred: impl Fn(&Value) -> bool) -> Value {
    for _ in 0..100 {
        let response = app
            .clone()
            .oneshot(test_request("GET", "/api/bill"))
            .await
            .unwrap();
        let body = extract_json(response.into_body()).await;
        if pred(&body) {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("bill session did not reach the expected state");
}

/// Test helper: Upload body passing the gates (content is arbitrary bytes)
fn upload_body(payload: &[u8]) -> Value {
    json!({
        "file_name": "receipt.png",
        "content_type": "image/png",
        "data_base64": BASE64.encode(payload),
    })
}

// =============================================================================
// Health Endpoint Tests
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _dir) = setup_app().await;

    let response = app
        .oneshot(test_request("GET", "/api/health"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "ssb-api");
    assert!(body["version"].is_string());
    assert!(body["uptime_seconds"].is_number());
}

// =============================================================================
// Savings Goal Tests
// =============================================================================

#[tokio::test]
async fn test_create_goal_returns_full_view() {
    let (app, _dir) = setup_app().await;

    let request = json_request(
        "POST",
        "/api/goals",
        json!({"title": "new laptop", "target_amount": 1000.0, "emoji": "💻"}),
    );
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert!(body["id"].is_string());
    assert_eq!(body["title"], "new laptop");
    assert_eq!(body["target_amount"], 1000.0);
    assert_eq!(body["current_amount"], 0.0);
    assert_eq!(body["emoji"], "💻");
    assert_eq!(body["progress_percent"], 0.0);
    assert_eq!(body["message"], "every rupee counts! you got this bestie");
}

#[tokio::test]
async fn test_create_goal_defaults_emoji() {
    let (app, _dir) = setup_app().await;

    let request = json_request(
        "POST",
        "/api/goals",
        json!({"title": "trip", "target_amount": 500.0}),
    );
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["emoji"], "🎯");
}

#[tokio::test]
async fn test_create_goal_validation() {
    let (app, _dir) = setup_app().await;

    // Blank title
    let request = json_request(
        "POST",
        "/api/goals",
        json!({"title": "   ", "target_amount": 100.0}),
    );
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
    assert!(body["error"]["message"].as_str().unwrap().contains("title"));

    // Zero and negative targets
    for target in [0.0, -50.0] {
        let request = json_request(
            "POST",
            "/api/goals",
            json!({"title": "trip", "target_amount": target}),
        );
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn test_list_goals_newest_first() {
    let (app, _dir) = setup_app().await;

    let request = json_request(
        "POST",
        "/api/goals",
        json!({"title": "first", "target_amount": 100.0}),
    );
    app.clone().oneshot(request).await.unwrap();

    tokio::time::sleep(Duration::from_millis(10)).await;

    let request = json_request(
        "POST",
        "/api/goals",
        json!({"title": "second", "target_amount": 200.0}),
    );
    app.clone().oneshot(request).await.unwrap();

    let response = app.oneshot(test_request("GET", "/api/goals")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    let goals = body.as_array().unwrap();
    assert_eq!(goals.len(), 2);
    assert_eq!(goals[0]["title"], "second");
    assert_eq!(goals[1]["title"], "first");
}

#[tokio::test]
async fn test_update_goal_edits_fields() {
    let (app, _dir) = setup_app().await;

    let request = json_request(
        "POST",
        "/api/goals",
        json!({"title": "trip", "target_amount": 500.0}),
    );
    let response = app.clone().oneshot(request).await.unwrap();
    let created = extract_json(response.into_body()).await;
    let id = created["id"].as_str().unwrap();

    let request = json_request(
        "PATCH",
        &format!("/api/goals/{}", id),
        json!({"title": "goa trip", "target_amount": 2500.0, "deadline": "2026-12-31"}),
    );
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["title"], "goa trip");
    assert_eq!(body["target_amount"], 2500.0);
    assert_eq!(body["deadline"], "2026-12-31");
}

#[tokio::test]
async fn test_update_unknown_goal_is_404() {
    let (app, _dir) = setup_app().await;

    let request = json_request(
        "PATCH",
        "/api/goals/00000000-0000-0000-0000-000000000000",
        json!({"title": "ghost"}),
    );
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_add_money_completion_edge() {
    let (app, _dir) = setup_app().await;

    let request = json_request(
        "POST",
        "/api/goals",
        json!({"title": "new phone", "target_amount": 1000.0}),
    );
    let response = app.clone().oneshot(request).await.unwrap();
    let created = extract_json(response.into_body()).await;
    let id = created["id"].as_str().unwrap().to_string();
    let add_uri = format!("/api/goals/{}/add", id);

    // Below target: no signal
    let response = app
        .clone()
        .oneshot(json_request("POST", &add_uri, json!({"amount": 900.0})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["completed"], false);
    assert_eq!(body["goal"]["current_amount"], 900.0);

    // Crossing the target: clamped to target, signal fires once
    let response = app
        .clone()
        .oneshot(json_request("POST", &add_uri, json!({"amount": 150.0})))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["completed"], true);
    assert_eq!(body["goal"]["current_amount"], 1000.0);
    assert_eq!(body["goal"]["progress_percent"], 100.0);
    assert_eq!(body["goal"]["message"], "goal crushed! you're a savings legend");

    // Already complete: stays at target, no re-signal
    let response = app
        .clone()
        .oneshot(json_request("POST", &add_uri, json!({"amount": 50.0})))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["completed"], false);
    assert_eq!(body["goal"]["current_amount"], 1000.0);
}

#[tokio::test]
async fn test_add_money_validation() {
    let (app, _dir) = setup_app().await;

    let request = json_request(
        "POST",
        "/api/goals",
        json!({"title": "trip", "target_amount": 500.0}),
    );
    let response = app.clone().oneshot(request).await.unwrap();
    let created = extract_json(response.into_body()).await;
    let add_uri = format!("/api/goals/{}/add", created["id"].as_str().unwrap());

    for amount in [0.0, -10.0] {
        let response = app
            .clone()
            .oneshot(json_request("POST", &add_uri, json!({"amount": amount})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    // Unknown goal
    let response = app
        .oneshot(json_request(
            "POST",
            "/api/goals/00000000-0000-0000-0000-000000000000/add",
            json!({"amount": 10.0}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_goal() {
    let (app, _dir) = setup_app().await;

    let request = json_request(
        "POST",
        "/api/goals",
        json!({"title": "trip", "target_amount": 500.0}),
    );
    let response = app.clone().oneshot(request).await.unwrap();
    let created = extract_json(response.into_body()).await;
    let uri = format!("/api/goals/{}", created["id"].as_str().unwrap());

    let response = app.clone().oneshot(test_request("DELETE", &uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // Goal gone from the list
    let response = app.clone().oneshot(test_request("GET", "/api/goals")).await.unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body.as_array().unwrap().len(), 0);

    // Second delete is a 404
    let response = app.oneshot(test_request("DELETE", &uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_goal_stats() {
    let (app, _dir) = setup_app().await;

    // Empty stats
    let response = app
        .clone()
        .oneshot(test_request("GET", "/api/goals/stats"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["saved_this_month"], 0.0);
    assert_eq!(body["completed_goals"], 0);
    assert_eq!(body["total_goals"], 0);
    assert_eq!(body["streak_days"], 0);

    // One goal, partially funded this month
    let request = json_request(
        "POST",
        "/api/goals",
        json!({"title": "concert", "target_amount": 1000.0}),
    );
    let response = app.clone().oneshot(request).await.unwrap();
    let created = extract_json(response.into_body()).await;
    let add_uri = format!("/api/goals/{}/add", created["id"].as_str().unwrap());
    app.clone()
        .oneshot(json_request("POST", &add_uri, json!({"amount": 300.0})))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(test_request("GET", "/api/goals/stats"))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["saved_this_month"], 300.0);
    assert_eq!(body["completed_goals"], 0);
    assert_eq!(body["total_goals"], 1);
    assert_eq!(body["streak_days"], 1);

    // Fund to completion
    app.clone()
        .oneshot(json_request("POST", &add_uri, json!({"amount": 700.0})))
        .await
        .unwrap();
    let response = app
        .oneshot(test_request("GET", "/api/goals/stats"))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["completed_goals"], 1);
    assert_eq!(body["saved_this_month"], 1000.0);
}

#[tokio::test]
async fn test_emoji_options() {
    let (app, _dir) = setup_app().await;

    let response = app
        .oneshot(test_request("GET", "/api/goals/emoji-options"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    let options = body.as_array().unwrap();
    assert_eq!(options.len(), 10);
    assert_eq!(options[0], "🎯");
    assert!(options.contains(&json!("💻")));
}

// =============================================================================
// Work-Time Estimator Tests
// =============================================================================

#[tokio::test]
async fn test_estimate_moderate_tier() {
    let (app, _dir) = setup_app().await;

    let request = json_request(
        "POST",
        "/api/estimate",
        json!({"price": 80.0, "hourly_wage": 15.0}),
    );
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["hours"], 6);
    assert_eq!(body["days"], 1);
    assert_eq!(body["tier"], "moderate");
    assert_eq!(body["message"], "a few hours of work - worth it? 🤔");
}

#[tokio::test]
async fn test_estimate_quick_tier() {
    let (app, _dir) = setup_app().await;

    let request = json_request(
        "POST",
        "/api/estimate",
        json!({"price": 30.0, "hourly_wage": 15.0}),
    );
    let response = app.oneshot(request).await.unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["hours"], 2);
    assert_eq!(body["tier"], "quick");
    assert_eq!(body["message"], "that's quick money! go for it bestie 💅");
}

#[tokio::test]
async fn test_estimate_rejects_non_positive_inputs() {
    let (app, _dir) = setup_app().await;

    for payload in [
        json!({"price": 0.0, "hourly_wage": 15.0}),
        json!({"price": 80.0, "hourly_wage": 0.0}),
        json!({"price": -5.0, "hourly_wage": 15.0}),
        json!({"price": 80.0, "hourly_wage": -1.0}),
    ] {
        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/estimate", payload))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

// =============================================================================
// Bill Session: Snapshot & Ledger Tests
// =============================================================================

#[tokio::test]
async fn test_bill_starts_idle_and_empty() {
    let (app, _dir) = setup_app().await;

    let response = app.oneshot(test_request("GET", "/api/bill")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["state"], "IDLE");
    assert!(body["image"].is_null());
    assert_eq!(body["items"].as_array().unwrap().len(), 0);
    assert_eq!(body["participants"].as_array().unwrap().len(), 0);
    assert_eq!(body["grand_total"], 0.0);
    assert!(body.get("failure").is_none());
}

#[tokio::test]
async fn test_manual_split_end_to_end() {
    let (app, _dir) = setup_app().await;

    // Three items of 100 each
    let mut item_ids = Vec::new();
    for name in ["Starter", "Main", "Dessert"] {
        let request = json_request(
            "POST",
            "/api/bill/items",
            json!({"name": name, "price": 100.0, "quantity": 1}),
        );
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = extract_json(response.into_body()).await;
        item_ids.push(body["id"].as_u64().unwrap());
    }

    // Two participants
    let mut participant_ids = Vec::new();
    for name in ["A", "B"] {
        let request = json_request("POST", "/api/bill/participants", json!({"name": name}));
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = extract_json(response.into_body()).await;
        participant_ids.push(body["id"].as_str().unwrap().to_string());
    }

    // item1 → A, item2 → A+B, item3 unassigned
    for (item, participant) in [
        (item_ids[0], &participant_ids[0]),
        (item_ids[1], &participant_ids[0]),
        (item_ids[1], &participant_ids[1]),
    ] {
        let uri = format!("/api/bill/items/{}/toggle/{}", item, participant);
        let response = app.clone().oneshot(test_request("POST", &uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    let response = app.oneshot(test_request("GET", "/api/bill")).await.unwrap();
    let body = extract_json(response.into_body()).await;

    assert_eq!(body["grand_total"], 300.0);
    let participants = body["participants"].as_array().unwrap();
    let share_of = |id: &str| {
        participants
            .iter()
            .find(|p| p["id"] == *id)
            .unwrap()["share"]
            .as_f64()
            .unwrap()
    };
    assert!((share_of(&participant_ids[0]) - 150.0).abs() < 1e-6);
    assert!((share_of(&participant_ids[1]) - 50.0).abs() < 1e-6);
}

#[tokio::test]
async fn test_add_item_validation() {
    let (app, _dir) = setup_app().await;

    for payload in [
        json!({"name": "  ", "price": 10.0, "quantity": 1}),
        json!({"name": "Pizza", "price": -1.0, "quantity": 1}),
        json!({"name": "Pizza", "price": 10.0, "quantity": 0}),
    ] {
        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/bill/items", payload))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn test_blank_participant_name_rejected() {
    let (app, _dir) = setup_app().await;

    let request = json_request("POST", "/api/bill/participants", json!({"name": "   "}));
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_remove_participant_cascades_assignments() {
    let (app, _dir) = setup_app().await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/bill/items",
            json!({"name": "Thali", "price": 150.0, "quantity": 1}),
        ))
        .await
        .unwrap();
    let item = extract_json(response.into_body()).await;
    let item_id = item["id"].as_u64().unwrap();

    let mut ids = Vec::new();
    for name in ["aanya", "dev"] {
        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/bill/participants", json!({"name": name})))
            .await
            .unwrap();
        let body = extract_json(response.into_body()).await;
        ids.push(body["id"].as_str().unwrap().to_string());
    }

    for id in &ids {
        let uri = format!("/api/bill/items/{}/toggle/{}", item_id, id);
        app.clone().oneshot(test_request("POST", &uri)).await.unwrap();
    }

    // Remove the first participant
    let uri = format!("/api/bill/participants/{}", ids[0]);
    let response = app.clone().oneshot(test_request("DELETE", &uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app.clone().oneshot(test_request("GET", "/api/bill")).await.unwrap();
    let body = extract_json(response.into_body()).await;

    let participants = body["participants"].as_array().unwrap();
    assert_eq!(participants.len(), 1);
    assert_eq!(participants[0]["id"], ids[1].as_str());
    // Remaining participant now owns the item alone
    assert!((participants[0]["share"].as_f64().unwrap() - 150.0).abs() < 1e-6);
    let assignees = body["items"][0]["assignees"].as_array().unwrap();
    assert_eq!(assignees.len(), 1);

    // Removing an unknown participant is a silent no-op
    let response = app
        .oneshot(test_request(
            "DELETE",
            "/api/bill/participants/00000000-0000-0000-0000-000000000000",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_assignment_ops_with_unknown_ids_are_silent() {
    let (app, _dir) = setup_app().await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/bill/items",
            json!({"name": "Coffee", "price": 30.0, "quantity": 1}),
        ))
        .await
        .unwrap();
    let item = extract_json(response.into_body()).await;
    let item_id = item["id"].as_u64().unwrap();

    let ghost = "00000000-0000-0000-0000-000000000000";
    for (method, uri) in [
        ("POST", format!("/api/bill/items/{}/toggle/{}", item_id, ghost)),
        ("POST", format!("/api/bill/items/999/toggle/{}", ghost)),
        ("POST", format!("/api/bill/items/{}/assign/{}", item_id, ghost)),
        ("DELETE", format!("/api/bill/items/{}/assignees/{}", item_id, ghost)),
    ] {
        let response = app.clone().oneshot(test_request(method, &uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    let response = app.oneshot(test_request("GET", "/api/bill")).await.unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["items"][0]["assignees"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_reset_discards_session() {
    let (app, _dir) = setup_app().await;

    app.clone()
        .oneshot(json_request(
            "POST",
            "/api/bill/items",
            json!({"name": "Pizza", "price": 100.0, "quantity": 1}),
        ))
        .await
        .unwrap();
    app.clone()
        .oneshot(json_request("POST", "/api/bill/participants", json!({"name": "dev"})))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(test_request("POST", "/api/bill/reset"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["state"], "IDLE");
    assert_eq!(body["items"].as_array().unwrap().len(), 0);
    assert_eq!(body["participants"].as_array().unwrap().len(), 0);
    assert_eq!(body["grand_total"], 0.0);
}

// =============================================================================
// Bill Session: Upload & Extraction Tests
// =============================================================================

#[tokio::test]
async fn test_upload_rejects_non_image_content_type() {
    let (app, _dir) = setup_app().await;

    let request = json_request(
        "POST",
        "/api/bill/image",
        json!({
            "content_type": "application/pdf",
            "data_base64": BASE64.encode(b"not an image"),
        }),
    );
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["message"], "please upload an image file");
}

#[tokio::test]
async fn test_upload_rejects_oversize_image() {
    let (app, _dir) = setup_app().await;

    let oversize = vec![0u8; 5 * 1024 * 1024 + 1];
    let request = json_request("POST", "/api/bill/image", upload_body(&oversize));
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["error"]["message"], "please upload an image under 5mb");
}

#[tokio::test]
async fn test_upload_rejects_invalid_base64() {
    let (app, _dir) = setup_app().await;

    let request = json_request(
        "POST",
        "/api/bill/image",
        json!({"content_type": "image/png", "data_base64": "!!!not-base64!!!"}),
    );
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upload_without_api_key_reaches_failed_with_image_retained() {
    let (app, _dir) = setup_app().await;

    let request = json_request("POST", "/api/bill/image", upload_body(b"fake receipt"));
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["state"], "EXTRACTING");
    assert_eq!(body["request_id"], 1);

    // The spawned gateway call fails fast (no API key configured)
    let body = poll_bill_until(&app, |b| b["state"] == "FAILED").await;
    assert_eq!(body["failure"]["kind"], "generic");
    assert!(body["failure"]["message"].as_str().unwrap().len() > 0);
    // Image retained for retry without re-upload
    assert!(body["image"].is_object());
    assert_eq!(body["items"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_retry_after_failure_without_reupload() {
    let (app, _dir) = setup_app().await;

    let request = json_request("POST", "/api/bill/image", upload_body(b"fake receipt"));
    app.clone().oneshot(request).await.unwrap();
    poll_bill_until(&app, |b| b["state"] == "FAILED").await;

    let response = app
        .clone()
        .oneshot(test_request("POST", "/api/bill/extract"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let body = extract_json(response.into_body()).await;
    assert_eq!(body["request_id"], 2);

    poll_bill_until(&app, |b| b["state"] == "FAILED").await;
}

#[tokio::test]
async fn test_extract_without_stored_image_is_rejected() {
    let (app, _dir) = setup_app().await;

    let response = app
        .oneshot(test_request("POST", "/api/bill/extract"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_requests_while_extracting_conflict() {
    let (state, _dir) = setup_state().await;
    // Pin the session in the busy state; no task will complete it
    state
        .bill
        .write()
        .await
        .transition_to(ExtractionState::Extracting);
    let app = build_router(state);

    let request = json_request("POST", "/api/bill/image", upload_body(b"fake receipt"));
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .oneshot(test_request("POST", "/api/bill/extract"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_reset_during_extraction_discards_stale_outcome() {
    let (app, _dir) = setup_app().await;

    let request = json_request("POST", "/api/bill/image", upload_body(b"fake receipt"));
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    // Reset immediately; the in-flight outcome becomes stale
    let response = app
        .clone()
        .oneshot(test_request("POST", "/api/bill/reset"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Give the spawned task time to finish and (correctly) drop its result
    tokio::time::sleep(Duration::from_millis(200)).await;

    let response = app.oneshot(test_request("GET", "/api/bill")).await.unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["state"], "IDLE");
    assert!(body.get("failure").is_none());
    assert!(body["image"].is_null());
}
