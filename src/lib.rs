pub mod api;
pub mod auth;
pub mod cli;
pub mod client;
pub mod db;
pub mod password;
pub mod rate_limit;
pub mod token;

use api::create_api_router;
use auth::CookieSpec;
use axum::Router;
use db::Database;
use rate_limit::RateLimitConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use token::TokenConfig;
use tokio::net::TcpListener;

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// Secret signing access credentials
    pub access_secret: Vec<u8>,
    /// Secret signing refresh credentials
    pub refresh_secret: Vec<u8>,
    /// Attributes for session cookies (Secure flag, Domain)
    pub cookies: CookieSpec,
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    let tokens = TokenConfig::new(&config.access_secret, &config.refresh_secret);
    let rate_limits = Arc::new(RateLimitConfig::new());

    let api_router = create_api_router(
        config.db.clone(),
        tokens,
        config.cookies.clone(),
        rate_limits,
    );

    Router::new().nest("/api/v1", api_router)
}

/// Run the server on the given listener. This function blocks until the server exits.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    axum::serve(listener, app).await
}

/// Start the server on the given port in a background task. Use port 0 to let
/// the OS choose a random port. Returns the actual address the server is
/// listening on. For production use, prefer `run_server` directly in main.
pub async fn start_server(
    config: ServerConfig,
    port: u16,
) -> (tokio::task::JoinHandle<()>, SocketAddr) {
    let addr = format!("127.0.0.1:{}", port);
    let listener = TcpListener::bind(&addr).await.expect("Failed to bind");
    let local_addr = listener.local_addr().expect("Failed to get local address");

    let handle = tokio::spawn(async move {
        run_server(config, listener).await.ok();
    });

    (handle, local_addr)
}
