use clap::Parser;
use clipgate::cli::{
    Args, build_config, init_logging, load_secret, open_database, validate_public_origin,
};
use clipgate::create_app;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_logging(&args.log_format);

    let Some(access_secret) = load_secret("ACCESS_TOKEN_SECRET", args.access_secret_file.as_deref())
    else {
        std::process::exit(1);
    };

    let Some(refresh_secret) =
        load_secret("REFRESH_TOKEN_SECRET", args.refresh_secret_file.as_deref())
    else {
        std::process::exit(1);
    };

    // One secret per credential kind; sharing one would leave the kind
    // claim as the only boundary between them
    if access_secret == refresh_secret {
        error!("ACCESS_TOKEN_SECRET and REFRESH_TOKEN_SECRET must differ");
        std::process::exit(1);
    }

    let Some(public_origin) = validate_public_origin(&args.public_origin) else {
        std::process::exit(1);
    };

    let Some(db) = open_database(&args.database).await else {
        std::process::exit(1);
    };

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            error!(address = %addr, error = %e, "Failed to bind");
            std::process::exit(1);
        });

    let config = build_config(db, access_secret, refresh_secret, &public_origin);
    let app = create_app(&config);

    info!(address = %addr, "Listening");

    if let Err(e) = axum::serve(listener, app).await {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
