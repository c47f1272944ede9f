//! Axum extractor guarding session-protected routes.

use axum::http::{HeaderMap, header};
use axum::{extract::FromRequestParts, http::request::Parts};

use super::cookie::{ACCESS_COOKIE_NAME, get_cookie};
use super::errors::AuthError;
use super::state::HasAuthState;
use crate::db::{User, UserSummary};

/// Identity attached to a request once its access credential checks out.
/// Carries no secret material: the password hash and the stored refresh
/// credential stay in the store.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: i64,
    pub uuid: String,
    pub username: String,
    pub email: String,
    pub fullname: String,
    pub created_at: String,
}

impl From<User> for CurrentUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            uuid: user.uuid,
            username: user.username,
            email: user.email,
            fullname: user.fullname,
            created_at: user.created_at,
        }
    }
}

impl From<CurrentUser> for UserSummary {
    fn from(user: CurrentUser) -> Self {
        Self {
            uuid: user.uuid,
            username: user.username,
            email: user.email,
            fullname: user.fullname,
            created_at: user.created_at,
        }
    }
}

/// Extractor for endpoints that require a live session.
///
/// Looks for the access credential in the session cookie first, then in the
/// Authorization header. Verifies it as an access credential and resolves
/// the subject to a user. Read-only: an expired credential is rejected here,
/// never refreshed; rotation only ever happens at the refresh endpoint.
pub struct SessionGuard(pub CurrentUser);

impl<S> FromRequestParts<S> for SessionGuard
where
    S: HasAuthState + Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = get_cookie(&parts.headers, ACCESS_COOKIE_NAME)
            .or_else(|| bearer_token(&parts.headers))
            .ok_or(AuthError::MissingCredential)?;

        let claims = state.tokens().verify(crate::token::TokenKind::Access, token)?;

        let user = state
            .db()
            .users()
            .get_by_uuid(&claims.sub)
            .await
            .map_err(|e| {
                tracing::error!("Failed to load user: {}", e);
                AuthError::Database
            })?
            .ok_or(AuthError::IdentityGone)?;

        Ok(SessionGuard(CurrentUser::from(user)))
    }
}

/// Extract a bearer token from the Authorization header.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    value.strip_prefix("Bearer ").map(str::trim)
}
