mod error;
mod health;
mod sessions;
mod users;

use axum::{Router, routing::get};
use std::sync::Arc;

use crate::auth::CookieSpec;
use crate::db::Database;
use crate::rate_limit::RateLimitConfig;
use crate::token::TokenConfig;

/// Create the API router.
pub fn create_api_router(
    db: Database,
    tokens: TokenConfig,
    cookies: CookieSpec,
    rate_limits: Arc<RateLimitConfig>,
) -> Router {
    let sessions_state = sessions::SessionsState {
        db: db.clone(),
        tokens: tokens.clone(),
        cookies,
        rate_limits,
    };

    let users_state = users::UsersState { db, tokens };

    Router::new()
        .nest(
            "/users",
            users::router(users_state).merge(sessions::router(sessions_state)),
        )
        .route("/health", get(health::healthcheck))
}
