//! Authentication API Tests
//!
//! Request validation and token checks that reject before any query.

use axum::http::StatusCode;
use cinema_server::domain::UserRole;
use serde_json::json;

use crate::common::{assert_error, TestApp};

const UNAUTHORIZED: u64 = 10003;
const FORBIDDEN: u64 = 10004;
const VALIDATION: u64 = 10007;

#[tokio::test]
async fn test_register_with_invalid_email_fails() {
    let app = TestApp::new();
    let body = json!({
        "email": "not-an-email",
        "password": "ValidPassword123!",
        "full_name": "Test User"
    });

    let response = app.post_json("/api/v1/auth/register", &body).await;

    assert_error(response, StatusCode::BAD_REQUEST, VALIDATION).await;
}

#[tokio::test]
async fn test_register_with_short_password_fails() {
    let app = TestApp::new();
    let body = json!({
        "email": "test@example.com",
        "password": "short",
        "full_name": "Test User"
    });

    let response = app.post_json("/api/v1/auth/register", &body).await;

    let body = assert_error(response, StatusCode::BAD_REQUEST, VALIDATION).await;
    assert!(body["message"].as_str().unwrap().contains("password"));
}

#[tokio::test]
async fn test_protected_route_requires_token() {
    let app = TestApp::new();

    let response = app.get("/api/v1/users/me").await;

    assert_error(response, StatusCode::UNAUTHORIZED, UNAUTHORIZED).await;
}

#[tokio::test]
async fn test_garbage_token_is_rejected() {
    let app = TestApp::new();

    let response = app.get_auth("/api/v1/bookings", "not-a-jwt").await;

    assert_error(response, StatusCode::UNAUTHORIZED, UNAUTHORIZED).await;
}

#[tokio::test]
async fn test_customer_cannot_reach_admin_routes() {
    let app = TestApp::new();
    let token = app.token_for(42, UserRole::Customer);

    let response = app.get_auth("/api/v1/admin/users", &token).await;

    assert_error(response, StatusCode::FORBIDDEN, FORBIDDEN).await;
}

#[tokio::test]
async fn test_admin_routes_require_token_first() {
    let app = TestApp::new();

    let response = app.get("/api/v1/admin/dashboard").await;

    assert_error(response, StatusCode::UNAUTHORIZED, UNAUTHORIZED).await;
}
