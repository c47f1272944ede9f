//! Session lifecycle endpoints.
//!
//! - POST `/login` - Exchange handle + password for a credential pair
//! - POST `/logout` - Revoke the stored refresh credential, clear cookies
//! - POST `/refresh-token` - Rotate the refresh credential, mint a new pair

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, HeaderName, StatusCode, header::SET_COOKIE},
    response::{AppendHeaders, IntoResponse, Response},
    routing::post,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::{ApiError, ResultExt};
use crate::auth::{
    ACCESS_COOKIE_NAME, AuthError, CookieSpec, REFRESH_COOKIE_NAME, SessionGuard, get_cookie,
};
use crate::db::{Database, UserSummary};
use crate::impl_has_auth_state;
use crate::password;
use crate::rate_limit::RateLimitConfig;
use crate::token::{MintedToken, TokenConfig, TokenError, TokenKind};

#[derive(Clone)]
pub struct SessionsState {
    pub db: Database,
    pub tokens: TokenConfig,
    pub cookies: CookieSpec,
    pub rate_limits: Arc<RateLimitConfig>,
}

impl_has_auth_state!(SessionsState);

pub fn router(state: SessionsState) -> Router {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/refresh-token", post(refresh_token))
        .with_state(state)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest {
    handle: String,
    password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    user: UserSummary,
    access_token: String,
    refresh_token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TokenPairResponse {
    access_token: String,
    refresh_token: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest {
    refresh_token: Option<String>,
}

/// Log in with a handle (username or email) and a password.
///
/// Unknown handles and wrong passwords produce one identical rejection, and
/// both paths run a full password verification. A successful login
/// overwrites the stored refresh credential, superseding whatever session
/// was active before.
async fn login(
    State(state): State<SessionsState>,
    Json(req): Json<LoginRequest>,
) -> Result<Response, Response> {
    let handle = req.handle.trim();

    if state
        .rate_limits
        .login
        .check_key(&handle.to_lowercase())
        .is_err()
    {
        return Err(ApiError::too_many_requests(
            "Too many login attempts. Please wait before trying again.",
        )
        .into_response());
    }

    let user = state
        .db
        .users()
        .get_by_handle(handle)
        .await
        .map_err(|e| ApiError::db_error("Failed to look up user", e).into_response())?;

    let Some(user) = user else {
        password::verify_dummy(&req.password);
        return Err(AuthError::InvalidLogin.into_response());
    };

    let password_ok = password::verify(&req.password, &user.password_hash)
        .map_err(|e| ApiError::internal_error("Password verification failed", e).into_response())?;
    if !password_ok {
        return Err(AuthError::InvalidLogin.into_response());
    }

    let (access, refresh) = mint_pair(&state.tokens, &user.uuid)
        .map_err(|e| ApiError::internal_error("Failed to mint credentials", e).into_response())?;

    state
        .db
        .users()
        .set_refresh_token(user.id, &refresh.token)
        .await
        .map_err(|e| {
            ApiError::db_error("Failed to store refresh credential", e).into_response()
        })?;

    Ok((
        StatusCode::OK,
        session_cookies(&state.cookies, &access, &refresh),
        Json(LoginResponse {
            user: UserSummary::from(user),
            access_token: access.token,
            refresh_token: refresh.token,
        }),
    )
        .into_response())
}

/// Log out: clear the stored refresh credential and expire both cookies.
/// The slot may already be empty; a second logout is just another 200.
async fn logout(
    State(state): State<SessionsState>,
    SessionGuard(user): SessionGuard,
) -> Result<impl IntoResponse, ApiError> {
    state
        .db
        .users()
        .clear_refresh_token(user.id)
        .await
        .db_err("Failed to clear refresh credential")?;

    Ok((
        StatusCode::OK,
        AppendHeaders([
            (SET_COOKIE, state.cookies.clear(ACCESS_COOKIE_NAME)),
            (SET_COOKIE, state.cookies.clear(REFRESH_COOKIE_NAME)),
        ]),
        Json(serde_json::json!({ "success": true })),
    ))
}

/// Rotate the refresh credential and mint a fresh pair.
///
/// The credential comes from the refresh cookie or, for non-cookie clients,
/// the request body. The stored slot is swapped in one conditional update:
/// of two concurrent calls presenting the same credential, exactly one
/// swaps and the other is rejected as stale.
///
/// Conclusively dead credentials (failed verification, lost swap) get their
/// cookies expired along with the 401; a merely missing credential does not.
async fn refresh_token(
    State(state): State<SessionsState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, Response> {
    let presented = get_cookie(&headers, REFRESH_COOKIE_NAME)
        .map(str::to_string)
        .or_else(|| {
            serde_json::from_slice::<RefreshRequest>(&body)
                .ok()
                .and_then(|r| r.refresh_token)
        })
        .ok_or_else(|| AuthError::MissingCredential.into_response())?;

    let claims = state
        .tokens
        .verify(TokenKind::Refresh, &presented)
        .map_err(|e| AuthError::from(e).with_cookie_reset(&state.cookies))?;

    let user = state
        .db
        .users()
        .get_by_uuid(&claims.sub)
        .await
        .map_err(|e| ApiError::db_error("Failed to look up user", e).into_response())?
        .ok_or_else(|| AuthError::IdentityGone.into_response())?;

    // Mint the replacement first, then swap it in. The swap is the commit
    // point; a lost swap means the presented credential was already
    // consumed or revoked.
    let (access, refresh) = mint_pair(&state.tokens, &user.uuid)
        .map_err(|e| ApiError::internal_error("Failed to mint credentials", e).into_response())?;

    let rotated = state
        .db
        .users()
        .rotate_refresh_token(user.id, &presented, &refresh.token)
        .await
        .map_err(|e| {
            ApiError::db_error("Failed to rotate refresh credential", e).into_response()
        })?;

    if !rotated {
        return Err(AuthError::StaleOrRevoked.with_cookie_reset(&state.cookies));
    }

    Ok((
        StatusCode::OK,
        session_cookies(&state.cookies, &access, &refresh),
        Json(TokenPairResponse {
            access_token: access.token,
            refresh_token: refresh.token,
        }),
    )
        .into_response())
}

fn mint_pair(
    tokens: &TokenConfig,
    subject: &str,
) -> Result<(MintedToken, MintedToken), TokenError> {
    let access = tokens.mint(TokenKind::Access, subject)?;
    let refresh = tokens.mint(TokenKind::Refresh, subject)?;
    Ok((access, refresh))
}

fn session_cookies(
    cookies: &CookieSpec,
    access: &MintedToken,
    refresh: &MintedToken,
) -> AppendHeaders<[(HeaderName, String); 2]> {
    AppendHeaders([
        (
            SET_COOKIE,
            cookies.set(ACCESS_COOKIE_NAME, &access.token, access.ttl),
        ),
        (
            SET_COOKIE,
            cookies.set(REFRESH_COOKIE_NAME, &refresh.token, refresh.ttl),
        ),
    ])
}
