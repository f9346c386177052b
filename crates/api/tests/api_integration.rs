//! API integration tests.
//!
//! These tests drive the router end to end against the in-memory store.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::redundant_clone)]

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
    response::Response,
};
use chrono::{TimeZone, Utc};
use flare_api::{ACTOR_HEADER, middleware::AppState, router as api_router};
use flare_common::AlertPolicyConfig;
use flare_core::{
    ChildSummary, InMemoryChildRegistry, InMemoryReportStore, ManualClock, ReportService,
};
use serde_json::{Value, json};
use tower::ServiceExt;

const ADMIN: &str = "admin-1";

/// Create test app state with a registered child.
async fn create_test_state() -> AppState {
    let registry = Arc::new(InMemoryChildRegistry::new());
    registry
        .register_child(ChildSummary {
            child_id: "child-1".to_string(),
            guardian_id: "guardian-1".to_string(),
            first_name: "Mia".to_string(),
            age: Some(7),
            blurred_photo_url: None,
        })
        .await;

    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
    ));
    let service = ReportService::new(
        Arc::new(InMemoryReportStore::new()),
        registry.clone(),
        clock,
        AlertPolicyConfig::default(),
    );
    AppState::new(service, registry)
}

/// Create the test router.
async fn create_test_router() -> Router {
    api_router().with_state(create_test_state().await)
}

fn post(uri: &str, actor: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .uri(uri)
        .method("POST")
        .header("Content-Type", "application/json");
    if let Some(actor) = actor {
        builder = builder.header(ACTOR_HEADER, actor);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn call(app: &Router, uri: &str, actor: Option<&str>, body: Value) -> (StatusCode, Value) {
    let response = app.clone().oneshot(post(uri, actor, &body)).await.unwrap();
    let status = response.status();
    (status, json_body(response).await)
}

fn report_body() -> Value {
    json!({
        "childId": "child-1",
        "guardianId": "guardian-1",
        "lastSeenLocation": {
            "address": "12 Harbour Street, Portside",
            "lat": 51.5,
            "lng": -0.12,
        },
        "outfit": "Red raincoat",
        "context": "Left school alone",
    })
}

async fn create_report(app: &Router) -> String {
    let (status, body) = call(app, "/reports/create", Some("guardian-1"), report_body()).await;
    assert_eq!(status, StatusCode::OK);
    body["data"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_healthz() {
    let app = create_test_router().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/healthz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "ok");
}

#[tokio::test]
async fn test_create_report_requires_actor() {
    let app = create_test_router().await;

    let (status, body) = call(&app, "/reports/create", None, report_body()).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_create_report_starts_pending() {
    let app = create_test_router().await;

    let (status, body) = call(&app, "/reports/create", Some("guardian-1"), report_body()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "pending");
    assert_eq!(body["data"]["timeline"][0]["title"], "Report Submitted");
}

#[tokio::test]
async fn test_create_report_for_unknown_child_is_not_found() {
    let app = create_test_router().await;
    let mut input = report_body();
    input["childId"] = json!("child-404");

    let (status, body) = call(&app, "/reports/create", Some("guardian-1"), input).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_create_report_rejects_out_of_range_coordinates() {
    let app = create_test_router().await;
    let mut input = report_body();
    input["lastSeenLocation"]["lat"] = json!(123.0);

    let (status, body) = call(&app, "/reports/create", Some("guardian-1"), input).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_verify_then_resolve() {
    let app = create_test_router().await;
    let id = create_report(&app).await;

    let (status, body) = call(&app, "/reports/verify", Some(ADMIN), json!({ "reportId": id })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "active");

    let (status, body) = call(
        &app,
        "/reports/resolve",
        Some(ADMIN),
        json!({ "reportId": id, "resolutionType": "found_safe" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "found");
    assert!(body["data"]["closedAt"].is_string());
}

#[tokio::test]
async fn test_verify_twice_is_invalid_transition() {
    let app = create_test_router().await;
    let id = create_report(&app).await;

    call(&app, "/reports/verify", Some(ADMIN), json!({ "reportId": id })).await;
    let (status, body) = call(&app, "/reports/verify", Some(ADMIN), json!({ "reportId": id })).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "INVALID_TRANSITION");
}

#[tokio::test]
async fn test_reject_requires_reason() {
    let app = create_test_router().await;
    let id = create_report(&app).await;

    let (status, _) = call(
        &app,
        "/reports/reject",
        Some(ADMIN),
        json!({ "reportId": id, "reason": "  " }),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_expand_by_widens_radius() {
    let app = create_test_router().await;
    let id = create_report(&app).await;
    call(&app, "/reports/verify", Some(ADMIN), json!({ "reportId": id })).await;

    let (_, before) = call(&app, "/reports/show", Some(ADMIN), json!({ "reportId": id })).await;
    let before = before["data"]["report"]["currentRadiusKm"].as_f64().unwrap();

    let (status, body) = call(
        &app,
        "/reports/expand-by",
        Some(ADMIN),
        json!({ "reportId": id, "stepKm": 2.0 }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let after = body["data"]["radiusKm"].as_f64().unwrap();
    assert!(after > before);
}

#[tokio::test]
async fn test_public_tip_flow() {
    let app = create_test_router().await;
    let id = create_report(&app).await;
    call(&app, "/reports/verify", Some(ADMIN), json!({ "reportId": id })).await;

    let (status, tip) = call(
        &app,
        "/reports/tips/create",
        None,
        json!({
            "reportId": id,
            "description": "Saw a child in a red raincoat by the ferry",
            "location": "Ferry terminal",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tip["data"]["status"], "pending");
    let tip_id = tip["data"]["id"].as_str().unwrap().to_string();

    let (status, updated) = call(
        &app,
        "/reports/tips/update-status",
        Some(ADMIN),
        json!({ "tipId": tip_id, "status": "credible" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["data"]["status"], "credible");

    let (_, detail) = call(&app, "/reports/show", Some(ADMIN), json!({ "reportId": id })).await;
    assert_eq!(detail["data"]["report"]["tipsReceived"], 1);
    assert_eq!(detail["data"]["report"]["priority"], "high");
    assert_eq!(detail["data"]["tips"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_dismiss_tip_without_reason_is_rejected() {
    let app = create_test_router().await;
    let id = create_report(&app).await;
    let (_, tip) = call(
        &app,
        "/reports/tips/create",
        None,
        json!({ "reportId": id, "description": "Near the park", "location": "Park" }),
    )
    .await;
    let tip_id = tip["data"]["id"].as_str().unwrap().to_string();

    let (status, _) = call(
        &app,
        "/reports/tips/update-status",
        Some(ADMIN),
        json!({ "tipId": tip_id, "status": "dismissed" }),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_alert_feed_hides_sensitive_fields() {
    let app = create_test_router().await;
    let id = create_report(&app).await;
    call(&app, "/reports/verify", Some(ADMIN), json!({ "reportId": id })).await;

    let (status, body) = call(&app, "/alerts/list", None, json!({})).await;

    assert_eq!(status, StatusCode::OK);
    let alerts = body["data"].as_array().unwrap();
    assert_eq!(alerts.len(), 1);
    let alert = &alerts[0];
    assert_eq!(alert["firstName"], "Mia");
    assert_eq!(alert["status"], "active");
    assert!(alert.get("guardianId").is_none());
    assert!(alert.get("timeline").is_none());
    assert_ne!(alert["location"], "12 Harbour Street, Portside");
}

#[tokio::test]
async fn test_alert_feed_rejects_half_coordinates() {
    let app = create_test_router().await;

    let (status, _) = call(&app, "/alerts/list", None, json!({ "lat": 51.5 })).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_register_child_then_report() {
    let app = create_test_router().await;

    let (status, _) = call(
        &app,
        "/registry/children/register",
        Some(ADMIN),
        json!({ "childId": "child-2", "guardianId": "guardian-2", "firstName": "Leo" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let mut input = report_body();
    input["childId"] = json!("child-2");
    input["guardianId"] = json!("guardian-2");
    let (status, body) = call(&app, "/reports/create", Some("guardian-2"), input).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["subject"]["firstName"], "Leo");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = create_test_router().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics/prometheus")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}
