//! User account endpoints.
//!
//! - POST `/register` - Create an account (no session is started)
//! - GET `/current-user` - Identity behind the presented access credential
//! - POST `/change-password` - Verify the old password, store a new hash

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use super::error::{ApiError, ResultExt};
use crate::auth::SessionGuard;
use crate::db::{Database, UserSummary};
use crate::impl_has_auth_state;
use crate::password;
use crate::token::TokenConfig;

#[derive(Clone)]
pub struct UsersState {
    pub db: Database,
    pub tokens: TokenConfig,
}

impl_has_auth_state!(UsersState);

pub fn router(state: UsersState) -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/current-user", get(current_user))
        .route("/change-password", post(change_password))
        .with_state(state)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest {
    username: String,
    email: String,
    fullname: String,
    password: String,
}

#[derive(Serialize)]
struct UserResponse {
    user: UserSummary,
}

/// Create an account. Registration mints no credentials; the caller logs
/// in afterwards.
async fn register(
    State(state): State<UsersState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let username = req.username.trim();
    let email = req.email.trim();
    let fullname = req.fullname.trim();

    if username.is_empty() {
        return Err(ApiError::bad_request("Username cannot be empty"));
    }

    if username.len() > 32 {
        return Err(ApiError::bad_request(
            "Username cannot be longer than 32 characters",
        ));
    }

    // Only allow alphanumeric and underscores
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(ApiError::bad_request(
            "Username can only contain letters, numbers, and underscores",
        ));
    }

    if email.is_empty() || !email.contains('@') {
        return Err(ApiError::bad_request("Invalid email address"));
    }

    if fullname.is_empty() {
        return Err(ApiError::bad_request("Full name cannot be empty"));
    }

    if req.password.len() < 8 {
        return Err(ApiError::bad_request(
            "Password must be at least 8 characters",
        ));
    }

    let taken = state
        .db
        .users()
        .is_handle_taken(username, email)
        .await
        .db_err("Failed to check handle availability")?;

    if taken {
        return Err(ApiError::conflict("Username or email already exists"));
    }

    let password_hash = password::hash(&req.password)
        .map_err(|e| ApiError::internal_error("Password hashing failed", e))?;

    let uuid = uuid::Uuid::new_v4().to_string();
    let id = state
        .db
        .users()
        .create(&uuid, username, email, fullname, &password_hash)
        .await
        .db_err("Failed to create user")?;

    let user = state
        .db
        .users()
        .get_by_id(id)
        .await
        .db_err("Failed to load user")?
        .ok_or_else(|| ApiError::internal("User missing right after create"))?;

    Ok((
        StatusCode::CREATED,
        Json(UserResponse {
            user: UserSummary::from(user),
        }),
    ))
}

/// Identity behind the presented access credential.
async fn current_user(SessionGuard(user): SessionGuard) -> impl IntoResponse {
    Json(UserResponse {
        user: UserSummary::from(user),
    })
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangePasswordRequest {
    old_password: String,
    new_password: String,
}

/// Verify the old password and store a hash of the new one. The active
/// session and its credentials stay valid.
async fn change_password(
    State(state): State<UsersState>,
    SessionGuard(user): SessionGuard,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.new_password.len() < 8 {
        return Err(ApiError::bad_request(
            "Password must be at least 8 characters",
        ));
    }

    // The guard carries no secret material; load the stored hash here
    let record = state
        .db
        .users()
        .get_by_id(user.id)
        .await
        .db_err("Failed to load user")?
        .ok_or_else(|| ApiError::internal("User missing mid-session"))?;

    let old_ok = password::verify(&req.old_password, &record.password_hash)
        .map_err(|e| ApiError::internal_error("Password verification failed", e))?;
    if !old_ok {
        return Err(ApiError::bad_request("Invalid old password"));
    }

    let new_hash = password::hash(&req.new_password)
        .map_err(|e| ApiError::internal_error("Password hashing failed", e))?;

    state
        .db
        .users()
        .set_password_hash(user.id, &new_hash)
        .await
        .db_err("Failed to store password")?;

    Ok((StatusCode::OK, Json(serde_json::json!({ "success": true }))))
}
