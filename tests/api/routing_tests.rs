//! Routing and request parsing tests

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use cinema_server::domain::UserRole;
use serde_json::json;

use crate::common::{assert_error, TestApp};

const BAD_REQUEST: u64 = 10002;

#[tokio::test]
async fn test_malformed_path_id_is_bad_request() {
    let app = TestApp::new();

    let response = app.get("/api/v1/movies/not-a-number").await;

    let body = assert_error(response, StatusCode::BAD_REQUEST, BAD_REQUEST).await;
    assert_eq!(body["message"], "Invalid movie ID");
}

#[tokio::test]
async fn test_short_idempotency_key_is_rejected() {
    let app = TestApp::new();
    let token = app.token_for(7, UserRole::Customer);
    let request = Request::post("/api/v1/bookings")
        .header("Authorization", format!("Bearer {}", token))
        .header("Content-Type", "application/json")
        .header("Idempotency-Key", "abc")
        .body(Body::from(
            json!({ "showtime_id": "1", "seat_ids": ["2"] }).to_string(),
        ))
        .unwrap();

    let response = app.send(request).await;

    assert_error(response, StatusCode::BAD_REQUEST, BAD_REQUEST).await;
}

#[tokio::test]
async fn test_webhook_requires_signature() {
    let app = TestApp::new();

    let response = app
        .post_json("/api/v1/payments/webhook", &json!({ "type": "payment_intent.succeeded" }))
        .await;

    assert_error(response, StatusCode::BAD_REQUEST, BAD_REQUEST).await;
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let app = TestApp::new();

    let response = app.get("/api/v1/popcorn").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_wrong_method_is_rejected() {
    let app = TestApp::new();

    let response = app
        .send(Request::delete("/api/v1/genres").body(Body::empty()).unwrap())
        .await;

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}
