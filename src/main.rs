use clap::Parser;
use tracing::{error, info};
use waypoint::cli::{
    Args, build_config, identity_provider_from_env, init_logging, load_secret, open_database,
    seed_allowlist, validate_public_url,
};
use waypoint::run_server;

#[tokio::main]
async fn main() {
    let args = Args::parse();

    init_logging(&args.log_format);

    let Some(secret) = load_secret(args.secret_file.as_deref()) else {
        std::process::exit(1);
    };

    let Some(public_url) = validate_public_url(&args.public_url) else {
        std::process::exit(1);
    };

    let Some(db) = open_database(&args.database).await else {
        std::process::exit(1);
    };

    if !seed_allowlist(&db, &args.allow_emails, &args.allow_domains).await {
        std::process::exit(1);
    }

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            error!(address = %addr, error = %e, "Failed to bind");
            std::process::exit(1);
        });

    let config = build_config(
        db,
        public_url,
        secret,
        args.trust_proxy,
        identity_provider_from_env(),
    );

    match listener.local_addr() {
        Ok(local_addr) => info!(address = %local_addr, "Listening"),
        Err(_) => info!(address = %addr, "Listening"),
    }

    if let Err(e) = run_server(config, listener).await {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
