//! Credential rejection taxonomy.

use axum::{
    http::header,
    response::{IntoResponse, Response},
};

use super::cookie::{ACCESS_COOKIE_NAME, CookieSpec, REFRESH_COOKIE_NAME};
use crate::token::TokenError;

/// Why a presented credential (or login attempt) was rejected.
///
/// Every variant except `Database` renders 401. Unknown-handle and
/// wrong-password logins share `InvalidLogin` so the response never says
/// which handles exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    /// No credential in cookie or Authorization header
    MissingCredential,
    /// Not a credential this server issued
    MalformedCredential,
    /// Credential lifetime has passed
    ExpiredCredential,
    /// Valid credential of the other kind
    WrongCredentialKind,
    /// Credential subject no longer resolves to a user
    IdentityGone,
    /// Presented refresh credential no longer matches the stored slot
    StaleOrRevoked,
    /// Login handle or password did not check out
    InvalidLogin,
    /// Store failure while authenticating
    Database,
}

impl AuthError {
    fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            AuthError::Database => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    fn message(&self) -> &'static str {
        match self {
            AuthError::MissingCredential => "Credential missing",
            AuthError::MalformedCredential => "Credential malformed",
            AuthError::ExpiredCredential => "Credential expired",
            AuthError::WrongCredentialKind => "Wrong credential kind",
            AuthError::IdentityGone => "Unknown identity",
            AuthError::StaleOrRevoked => "Credential stale or revoked",
            AuthError::InvalidLogin => "Invalid login credentials",
            AuthError::Database => "Database error",
        }
    }

    /// Render this rejection and additionally expire both session cookies.
    /// Refresh-path failures use this when the presented credential is
    /// conclusively dead and keeping cookies around would only replay it.
    pub fn with_cookie_reset(self, cookies: &CookieSpec) -> Response {
        use axum::http::HeaderValue;

        let mut response = self.into_response();
        let headers = response.headers_mut();
        if let Ok(value) = HeaderValue::from_str(&cookies.clear(ACCESS_COOKIE_NAME)) {
            headers.append(header::SET_COOKIE, value);
        }
        if let Ok(value) = HeaderValue::from_str(&cookies.clear(REFRESH_COOKIE_NAME)) {
            headers.append(header::SET_COOKIE, value);
        }

        response
    }
}

impl From<TokenError> for AuthError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Expired => AuthError::ExpiredCredential,
            TokenError::WrongKind => AuthError::WrongCredentialKind,
            TokenError::Malformed => AuthError::MalformedCredential,
            // Mint-side failures, not verdicts on the presented credential
            TokenError::Encoding(_) | TokenError::Clock => AuthError::Database,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        use axum::Json;
        use serde::Serialize;

        #[derive(Serialize)]
        struct ErrorResponse {
            error: &'static str,
        }

        (
            self.status_code(),
            Json(ErrorResponse {
                error: self.message(),
            }),
        )
            .into_response()
    }
}
