//! HTTP 路由：认证、状态码与错误体

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use commgate::http::build_router;
use common::*;

fn router(h: &Harness) -> Router {
    build_router(h.state.clone())
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value, axum::http::HeaderMap) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body, headers)
}

fn app_request(method: &str, uri: &str, token: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token));
    with_body(builder, body)
}

fn admin_request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("X-Service-Key", SERVICE_KEY);
    with_body(builder, body)
}

fn with_body(builder: axum::http::request::Builder, body: Option<Value>) -> Request<Body> {
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

#[tokio::test]
async fn test_health() {
    let h = Harness::new();
    let request = Request::get("/health").body(Body::empty()).unwrap();
    let (status, body, _) = send(router(&h), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_app_requires_bearer_token() {
    let h = Harness::new();

    let request = Request::get("/api/app/communication/status")
        .body(Body::empty())
        .unwrap();
    let (status, body, _) = send(router(&h), request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHENTICATED");

    let request = app_request("GET", "/api/app/communication/status", "not-a-jwt", None);
    let (status, _, _) = send(router(&h), request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_app_status_for_caller() {
    let h = Harness::new();
    let request = app_request("GET", "/api/app/communication/status", &h.token(ALICE), None);
    let (status, body, _) = send(router(&h), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_id"], ALICE);
    assert_eq!(body["communication_stage"], "PRESET_ONLY");
    assert_eq!(body["ads_needed_for_custom_text"], 88);
}

#[tokio::test]
async fn test_quick_chat_send_and_rate_limit_header() {
    let h = Harness::new();
    let token = h.token(ALICE);
    let payload = json!({ "to_user_id": BOB, "quick_message_id": QUICK_HELLO });

    let request = app_request("POST", "/api/app/quick-chat/send", &token, Some(payload.clone()));
    let (status, body, _) = send(router(&h), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["to_user_id"], BOB);

    for _ in 0..29 {
        let request = app_request("POST", "/api/app/quick-chat/send", &token, Some(payload.clone()));
        let (status, _, _) = send(router(&h), request).await;
        assert_eq!(status, StatusCode::OK);
    }

    let request = app_request("POST", "/api/app/quick-chat/send", &token, Some(payload));
    let (status, body, headers) = send(router(&h), request).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["code"], "RATE_LIMITED");
    assert_eq!(headers[header::RETRY_AFTER], "60");
}

#[tokio::test]
async fn test_group_message_locked_carries_ads_needed() {
    let h = Harness::new();
    let request = app_request(
        "POST",
        &format!("/api/app/groups/{}/messages", GROUP),
        &h.token(ALICE),
        Some(json!({ "type": "text", "text": "hello" })),
    );
    let (status, body, _) = send(router(&h), request).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "COMMUNICATION_STAGE_INSUFFICIENT");
    assert_eq!(body["details"]["ads_needed"], 88);
}

#[tokio::test]
async fn test_malformed_body_is_validation_failure() {
    let h = Harness::new();
    let request = app_request(
        "POST",
        &format!("/api/app/groups/{}/messages", GROUP),
        &h.token(BOB),
        Some(json!({ "type": "shout", "text": "hello" })),
    );
    let (status, body, _) = send(router(&h), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_FAILED");
}

#[tokio::test]
async fn test_voice_join_needs_exactly_one_room_reference() {
    let h = Harness::new();
    let token = h.token(CAROL);

    let request = app_request(
        "POST",
        "/api/app/voice/rooms/join",
        &token,
        Some(json!({ "room_id": ROOM, "room_code": ROOM_CODE })),
    );
    let (status, body, _) = send(router(&h), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_FAILED");

    let request = app_request("POST", "/api/app/voice/rooms/join", &token, Some(json!({})));
    let (status, _, _) = send(router(&h), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let request = app_request(
        "POST",
        "/api/app/voice/rooms/join",
        &token,
        Some(json!({ "room_code": ROOM_CODE })),
    );
    let (status, body, _) = send(router(&h), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["channel_name"], "lobby-channel");
    assert_eq!(body["provider_name"], "fake-voice");
}

#[tokio::test]
async fn test_admin_requires_service_key() {
    let h = Harness::new();

    let request = Request::get("/api/admin/communication/policy")
        .body(Body::empty())
        .unwrap();
    let (status, body, _) = send(router(&h), request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "INVALID_SERVICE_KEY");

    let request = Request::get("/api/admin/communication/policy")
        .header("X-Service-Key", "wrong")
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(router(&h), request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_policy_roundtrip() {
    let h = Harness::new();

    let request = admin_request("GET", "/api/admin/communication/policy", None);
    let (status, body, _) = send(router(&h), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "preset_only_max_ads": 99, "custom_min_ads": 100, "voice_min_ads": 500 }));

    let request = admin_request(
        "PUT",
        "/api/admin/communication/policy",
        Some(json!({ "custom_min_ads": 50 })),
    );
    let (status, body, _) = send(router(&h), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_THRESHOLDS");

    let request = admin_request(
        "PUT",
        "/api/admin/communication/policy",
        Some(json!({ "preset_only_max_ads": 49, "custom_min_ads": 50, "voice_min_ads": 50 })),
    );
    let (status, body, _) = send(router(&h), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["voice_min_ads"], 50);

    let request = admin_request(
        "GET",
        &format!("/api/admin/communication/status/{}", BOB),
        None,
    );
    let (status, body, _) = send(router(&h), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["communication_stage"], "VOICE_ENABLED");

    assert!(h.store.audit_records().iter().any(|r| r.action == "policy.update"));
}

#[tokio::test]
async fn test_admin_override_lifecycle() {
    let h = Harness::new();
    let uri = format!("/api/admin/communication/overrides/{}", ALICE);

    let request = admin_request("PUT", &uri, Some(json!({ "forced_stage": "LOUD" })));
    let (status, body, _) = send(router(&h), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_STAGE");

    let request = admin_request(
        "PUT",
        "/api/admin/communication/overrides/77777",
        Some(json!({ "forced_stage": "VOICE_ENABLED" })),
    );
    let (status, body, _) = send(router(&h), request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "USER_NOT_FOUND");

    let request = admin_request(
        "PUT",
        &uri,
        Some(json!({ "forced_stage": "VOICE_ENABLED", "expires_at": "2026-03-02T12:00:00Z" })),
    );
    let (status, body, _) = send(router(&h), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["forced_stage"], "VOICE_ENABLED");

    let request = admin_request("GET", &uri, None);
    let (status, body, _) = send(router(&h), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_id"], ALICE);

    for _ in 0..2 {
        let request = admin_request("DELETE", &uri, None);
        let (status, body, _) = send(router(&h), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
    }

    let request = admin_request("GET", &uri, None);
    let (status, body, _) = send(router(&h), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::Null);

    let deletes = h
        .store
        .audit_records()
        .iter()
        .filter(|r| r.action == "override.delete")
        .count();
    assert_eq!(deletes, 1);
}

#[tokio::test]
async fn test_admin_chat_settings() {
    let h = Harness::new();

    let request = admin_request("GET", "/api/admin/communication/chat-settings", None);
    let (status, body, _) = send(router(&h), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["group_chat_rate_limit_per_minute"], 10);

    let request = admin_request(
        "PUT",
        "/api/admin/communication/chat-settings",
        Some(json!({ "group_chat_rate_limit_per_minute": -1 })),
    );
    let (status, body, _) = send(router(&h), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_FAILED");

    let request = admin_request(
        "PUT",
        "/api/admin/communication/chat-settings",
        Some(json!({ "group_chat_rate_limit_per_minute": 3 })),
    );
    let (status, body, _) = send(router(&h), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["group_chat_rate_limit_per_minute"], 3);
}

#[tokio::test]
async fn test_metrics_without_recorder() {
    let h = Harness::new();
    let request = Request::get("/metrics").body(Body::empty()).unwrap();
    let response = router(&h).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}
