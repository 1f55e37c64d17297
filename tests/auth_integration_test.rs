//! Account registration, login and bearer-token enforcement.

mod common;

use axum::http::{Method, StatusCode};
use common::{response_json, TestApp};
use serde_json::json;

#[tokio::test]
async fn register_then_login_returns_usable_token() {
    let app = TestApp::new().await;
    app.register("owner@example.com").await;

    let response = app
        .request(
            Method::POST,
            "/auth/login",
            Some(json!({ "email": "owner@example.com", "password": "correct horse battery" })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["user"]["email"], "owner@example.com");
    assert_eq!(body["data"]["token"]["token_type"], "Bearer");
    let token = body["data"]["token"]["access_token"].as_str().unwrap();

    let (status, me) = app.call(Method::GET, "/auth/me", None, token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["data"]["email"], "owner@example.com");
}

#[tokio::test]
async fn duplicate_email_is_a_conflict() {
    let app = TestApp::new().await;
    app.register("owner@example.com").await;

    let response = app
        .request(
            Method::POST,
            "/auth/register",
            Some(json!({
                "name": "Someone Else",
                "email": "owner@example.com",
                "password": "another password",
            })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn wrong_password_is_rejected() {
    let app = TestApp::new().await;
    app.register("owner@example.com").await;

    let response = app
        .request(
            Method::POST,
            "/auth/login",
            Some(json!({ "email": "owner@example.com", "password": "not the password" })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn short_password_fails_validation() {
    let app = TestApp::new().await;
    let response = app
        .request(
            Method::POST,
            "/auth/register",
            Some(json!({ "name": "Owner", "email": "owner@example.com", "password": "short" })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = response_json(response).await;
    assert!(body["fields"]["password"].is_array());
}

#[tokio::test]
async fn api_requires_a_valid_bearer_token() {
    let app = TestApp::new().await;

    let missing = app.request(Method::GET, "/api/v1/customers", None, None).await;
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

    let garbage = app
        .request(Method::GET, "/api/v1/customers", None, Some("not-a-jwt"))
        .await;
    assert_eq!(garbage.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_revokes_the_token() {
    let app = TestApp::new().await;
    let token = app.register("owner@example.com").await;

    let (status, _) = app.call(Method::POST, "/auth/logout", None, &token).await;
    assert_eq!(status, StatusCode::OK);

    let response = app
        .request(Method::GET, "/api/v1/dashboard", None, Some(&token))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn health_is_public() {
    let app = TestApp::new().await;
    let response = app.request(Method::GET, "/health", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let ready = app.request(Method::GET, "/health/ready", None, None).await;
    assert_eq!(ready.status(), StatusCode::OK);
}
