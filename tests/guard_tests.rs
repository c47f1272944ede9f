//! Session guard behavior on protected routes.
//!
//! The guard accepts an access credential from the session cookie or a
//! bearer header, verifies it statelessly, and resolves the subject to a
//! live account. Every rejection shape gets a test here.

mod common;

use axum::http::StatusCode;
use clipgate::token::TokenKind;
use common::*;
use tower::ServiceExt;

const CURRENT_USER: &str = "/api/v1/users/current-user";

#[tokio::test]
async fn test_current_user_with_access_cookie() {
    let (app, _db) = create_test_app().await;
    let session = register_and_login(&app, "alice", "alice@example.com", "password123").await;

    let response = app
        .clone()
        .oneshot(get_with_cookie(
            CURRENT_USER,
            &format!("accessToken={}", session.access_token),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["user"]["username"], "alice");
    assert_eq!(body["user"]["email"], "alice@example.com");
    assert_eq!(body["user"]["uuid"], session.uuid());
    assert!(body["user"].get("passwordHash").is_none());
}

#[tokio::test]
async fn test_current_user_with_bearer_token() {
    let (app, _db) = create_test_app().await;
    let session = register_and_login(&app, "alice", "alice@example.com", "password123").await;

    let response = app
        .clone()
        .oneshot(get_with_bearer(CURRENT_USER, &session.access_token))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["user"]["username"], "alice");
}

#[tokio::test]
async fn test_guard_rejects_missing_credential() {
    let (app, _db) = create_test_app().await;

    let response = app.clone().oneshot(get_plain(CURRENT_USER)).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = response_json(response).await;
    assert_eq!(body["error"], "Credential missing");
}

#[tokio::test]
async fn test_guard_rejects_malformed_credential() {
    let (app, _db) = create_test_app().await;

    let response = app
        .clone()
        .oneshot(get_with_cookie(CURRENT_USER, "accessToken=not-a-token"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = response_json(response).await;
    assert_eq!(body["error"], "Credential malformed");
}

#[tokio::test]
async fn test_guard_rejects_expired_credential() {
    let (app, _db) = create_test_app().await;
    let session = register_and_login(&app, "alice", "alice@example.com", "password123").await;

    let expired = expired_access_token(session.uuid());
    let response = app
        .clone()
        .oneshot(get_with_bearer(CURRENT_USER, &expired))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = response_json(response).await;
    assert_eq!(body["error"], "Credential expired");
}

#[tokio::test]
async fn test_guard_rejects_refresh_token() {
    let (app, _db) = create_test_app().await;
    let session = register_and_login(&app, "alice", "alice@example.com", "password123").await;

    let response = app
        .clone()
        .oneshot(get_with_bearer(CURRENT_USER, &session.refresh_token))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = response_json(response).await;
    assert_eq!(body["error"], "Wrong credential kind");
}

#[tokio::test]
async fn test_guard_rejects_unknown_subject() {
    let (app, _db) = create_test_app().await;

    // Correctly signed, but the subject does not exist.
    let token = valid_access_token(&uuid::Uuid::new_v4().to_string());
    let response = app
        .clone()
        .oneshot(get_with_bearer(CURRENT_USER, &token))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = response_json(response).await;
    assert_eq!(body["error"], "Unknown identity");
}

#[tokio::test]
async fn test_guard_rejects_foreign_signature() {
    let (app, _db) = create_test_app().await;
    let session = register_and_login(&app, "alice", "alice@example.com", "password123").await;

    let now = now_secs();
    let forged = mint_token(
        b"some-other-secret-entirely-0123456",
        session.uuid(),
        TokenKind::Access,
        now,
        now + 3600,
    );
    let response = app
        .clone()
        .oneshot(get_with_bearer(CURRENT_USER, &forged))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = response_json(response).await;
    assert_eq!(body["error"], "Credential malformed");
}

#[tokio::test]
async fn test_guard_prefers_cookie_over_bearer() {
    let (app, _db) = create_test_app().await;
    let session = register_and_login(&app, "alice", "alice@example.com", "password123").await;

    let response = app
        .clone()
        .oneshot(
            axum::http::Request::builder()
                .method("GET")
                .uri(CURRENT_USER)
                .header(
                    axum::http::header::COOKIE,
                    format!("accessToken={}", session.access_token),
                )
                .header(axum::http::header::AUTHORIZATION, "Bearer garbage")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_access_credential_outlives_logout() {
    let (app, _db) = create_test_app().await;
    let session = register_and_login(&app, "alice", "alice@example.com", "password123").await;

    let response = app
        .clone()
        .oneshot(post_with_bearer(
            "/api/v1/users/logout",
            &session.access_token,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Verification is stateless: the access credential stays valid until
    // it expires, logout or not. Only the refresh path consults the slot.
    let response = app
        .clone()
        .oneshot(get_with_bearer(CURRENT_USER, &session.access_token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
