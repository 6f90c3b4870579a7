//! Admin API routes driven through the router without a socket.

use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use remediation_gate::admin::{setup_admin_router, AdminState};
use remediation_gate::config::GateConfig;

mod common;
use common::{harness, Harness, RecordingChannel, ScriptedThreads};

const KEY: &str = "test-admin-key";

fn app() -> (Router, Harness) {
    let h = harness(GateConfig::default(), RecordingChannel::new(), ScriptedThreads::ok());
    let router = setup_admin_router(AdminState::new(h.escalator.clone(), KEY));
    (router, h)
}

fn request(method: Method, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", KEY));
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn call(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn test_requires_bearer_key() {
    let (app, _h) = app();
    let unauthenticated = Request::builder().uri("/admin/status").body(Body::empty()).unwrap();
    let response = app.clone().oneshot(unauthenticated).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let wrong = Request::builder()
        .uri("/admin/status")
        .header(header::AUTHORIZATION, "Bearer nope")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(wrong).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_status() {
    let (app, _h) = app();
    let (status, body) = call(&app, request(Method::GET, "/admin/status", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "operational");
    assert_eq!(body["failure_limit"], 10);
}

#[tokio::test]
async fn test_failure_event_creates_request_in_background() {
    let (app, _h) = app();
    let (status, _) = call(
        &app,
        request(
            Method::POST,
            "/admin/events/failure",
            Some(json!({ "subject": "checkout", "description": "HTTP 500" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let mut listed = Value::Null;
    for _ in 0..50 {
        let (_, body) = call(&app, request(Method::GET, "/admin/requests?status=pending", None)).await;
        if body.as_array().map_or(false, |a| !a.is_empty()) {
            listed = body;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let requests = listed.as_array().expect("request was created");
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0]["subject_name"], "checkout");
    assert_eq!(requests[0]["status"], "PENDING");
}

#[tokio::test]
async fn test_blank_subject_rejected() {
    let (app, _h) = app();
    let (status, body) = call(
        &app,
        request(
            Method::POST,
            "/admin/events/failure",
            Some(json!({ "subject": " ", "description": "HTTP 500" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("subject"));
}

#[tokio::test]
async fn test_unknown_status_filter_rejected() {
    let (app, _h) = app();
    let (status, _) = call(&app, request(Method::GET, "/admin/requests?status=maybe", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_respond_then_conflict() {
    let (app, h) = app();
    let outcome = h.escalator.on_failure("search", "HTTP 503").await;
    let id = match outcome {
        remediation_gate::FailureOutcome::ApprovalRequested { request_id, .. } => request_id,
        other => panic!("unexpected outcome {:?}", other),
    };
    let uri = format!("/admin/requests/{}/respond", id);

    let (status, body) = call(
        &app,
        request(Method::POST, &uri, Some(json!({ "approved": true, "comment": "go" }))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["approved"], true);

    let (status, body) = call(&app, request(Method::POST, &uri, Some(json!({ "approved": false })))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("APPROVED"));
}

#[tokio::test]
async fn test_get_expire_and_delete() {
    let (app, h) = app();
    let id = match h.escalator.on_failure("search", "HTTP 503").await {
        remediation_gate::FailureOutcome::ApprovalRequested { request_id, .. } => request_id,
        other => panic!("unexpected outcome {:?}", other),
    };
    let uri = format!("/admin/requests/{}", id);

    let (status, body) = call(&app, request(Method::GET, &uri, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], id.to_string());

    let (status, body) = call(&app, request(Method::POST, &format!("{}/expire", uri), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "EXPIRED");

    let (status, _) = call(&app, request(Method::DELETE, &uri, None)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = call(&app, request(Method::GET, &uri, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_success_event_and_stats() {
    let (app, h) = app();
    h.escalator.on_failure("search", "HTTP 503").await;
    assert_eq!(h.escalator.counter().subject_total("search"), 1);

    let (status, _) = call(
        &app,
        request(Method::POST, "/admin/events/success", Some(json!({ "subject": "search" }))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(h.escalator.counter().subject_total("search"), 0);

    let (status, body) = call(&app, request(Method::GET, "/admin/stats", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["approvals"]["pending"], 1);
    assert_eq!(body["history"]["total_events"], 1);

    let (status, body) = call(&app, request(Method::GET, "/admin/history?limit=5", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["outcome"], "approval_requested");
}
