use clap::Parser;
use courtyard::cli::{
    Args, build_config, handle_create_admin, init_logging, load_token_secrets, open_database,
    validate_public_origin,
};
use courtyard::run_server;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_logging(&args.log_format);

    let Some(public_origin) = validate_public_origin(&args.public_origin) else {
        std::process::exit(1);
    };

    let allow_placeholder = public_origin.scheme() != "https";
    let Some((access_secret, refresh_secret)) = load_token_secrets(allow_placeholder) else {
        std::process::exit(1);
    };

    let Some(db) = open_database(&args.database).await else {
        std::process::exit(1);
    };

    let config = build_config(
        db,
        &public_origin,
        access_secret,
        refresh_secret,
        args.refresh_token_days,
        args.no_signup,
    );

    if let Some(email) = args.create_admin.as_deref() {
        handle_create_admin(&config.db, &config.hasher, email).await;
    }

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            error!(address = %addr, error = %e, "Failed to bind");
            std::process::exit(1);
        });

    let local_addr = listener.local_addr().unwrap();
    info!(address = %local_addr, "Listening");

    if let Err(e) = run_server(config, listener).await {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
