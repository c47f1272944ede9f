#![allow(dead_code)]

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use clipgate::auth::CookieSpec;
use clipgate::db::Database;
use clipgate::token::{Claims, TokenKind};
use clipgate::{ServerConfig, create_app};
use tower::ServiceExt;

pub const ACCESS_SECRET: &[u8] = b"test-access-secret-0123456789abcdef";
pub const REFRESH_SECRET: &[u8] = b"test-refresh-secret-0123456789abcdef";

pub fn test_config(db: Database) -> ServerConfig {
    ServerConfig {
        db,
        access_secret: ACCESS_SECRET.to_vec(),
        refresh_secret: REFRESH_SECRET.to_vec(),
        cookies: CookieSpec {
            secure: false,
            domain: None,
        },
    }
}

/// Create a test app backed by an in-memory database.
pub async fn create_test_app() -> (Router, Database) {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    (create_app(&test_config(db.clone())), db)
}

pub fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("Failed to build request")
}

pub fn post_json_with_bearer(uri: &str, body: serde_json::Value, token: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::from(body.to_string()))
        .expect("Failed to build request")
}

pub fn post_with_bearer(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .expect("Failed to build request")
}

pub fn post_with_cookie(uri: &str, cookie: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .expect("Failed to build request")
}

pub fn get_plain(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("Failed to build request")
}

pub fn get_with_cookie(uri: &str, cookie: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .expect("Failed to build request")
}

pub fn get_with_bearer(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .expect("Failed to build request")
}

/// Read a response body as JSON.
pub async fn response_json(response: Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    serde_json::from_slice(&body).expect("Body is not JSON")
}

/// All Set-Cookie header values on a response.
pub fn set_cookie_headers(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().expect("Set-Cookie is not ascii").to_string())
        .collect()
}

/// The value carried by a named cookie among a response's Set-Cookie headers.
pub fn set_cookie_value(response: &Response, name: &str) -> Option<String> {
    set_cookie_headers(response).iter().find_map(|header| {
        let cookie = header.split(';').next()?;
        let (key, value) = cookie.split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}

/// Everything a logged-in test needs in one place.
pub struct LoginSession {
    pub body: serde_json::Value,
    pub access_token: String,
    pub refresh_token: String,
    pub access_cookie: String,
    pub refresh_cookie: String,
}

impl LoginSession {
    pub fn uuid(&self) -> &str {
        self.body["user"]["uuid"]
            .as_str()
            .expect("no uuid in login body")
    }
}

/// Register a user through the API.
pub async fn register_user(app: &Router, username: &str, email: &str, password: &str) {
    let response = app
        .clone()
        .oneshot(post_json(
            "/api/v1/users/register",
            serde_json::json!({
                "username": username,
                "email": email,
                "fullname": "Test User",
                "password": password,
            }),
        ))
        .await
        .expect("register request failed");
    assert_eq!(response.status(), StatusCode::CREATED);
}

/// Log in through the API and capture the minted credentials.
pub async fn login_user(app: &Router, handle: &str, password: &str) -> LoginSession {
    let response = app
        .clone()
        .oneshot(post_json(
            "/api/v1/users/login",
            serde_json::json!({ "handle": handle, "password": password }),
        ))
        .await
        .expect("login request failed");
    assert_eq!(response.status(), StatusCode::OK);

    let access_cookie = set_cookie_value(&response, "accessToken").expect("no access cookie");
    let refresh_cookie = set_cookie_value(&response, "refreshToken").expect("no refresh cookie");
    let body = response_json(response).await;
    let access_token = body["accessToken"]
        .as_str()
        .expect("no accessToken in body")
        .to_string();
    let refresh_token = body["refreshToken"]
        .as_str()
        .expect("no refreshToken in body")
        .to_string();
    LoginSession {
        body,
        access_token,
        refresh_token,
        access_cookie,
        refresh_cookie,
    }
}

pub async fn register_and_login(
    app: &Router,
    username: &str,
    email: &str,
    password: &str,
) -> LoginSession {
    register_user(app, username, email, password).await;
    login_user(app, username, password).await
}

pub fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock before epoch")
        .as_secs()
}

/// Hand-mint a token with full control over the claims.
pub fn mint_token(secret: &[u8], uuid: &str, kind: TokenKind, iat: u64, exp: u64) -> String {
    let claims = Claims {
        sub: uuid.to_string(),
        tok: kind,
        jti: uuid::Uuid::new_v4().to_string(),
        iat,
        exp,
    };
    jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(secret),
    )
    .expect("Failed to encode token")
}

/// An access token that expired an hour ago.
pub fn expired_access_token(uuid: &str) -> String {
    let now = now_secs();
    mint_token(ACCESS_SECRET, uuid, TokenKind::Access, now - 7200, now - 3600)
}

/// A well-formed access token for an arbitrary subject.
pub fn valid_access_token(uuid: &str) -> String {
    let now = now_secs();
    mint_token(ACCESS_SECRET, uuid, TokenKind::Access, now, now + 3600)
}

/// A well-formed refresh token for an arbitrary subject.
pub fn valid_refresh_token(uuid: &str) -> String {
    let now = now_secs();
    mint_token(REFRESH_SECRET, uuid, TokenKind::Refresh, now, now + 604800)
}
