//! lisan-api - Arabic/Indonesian language-learning REST service
//!
//! Startup order: configuration, logging, database, token secret, admin
//! seed, external service clients, HTTP server.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use lisan_api::services::Services;
use lisan_api::{AppState, AuthSettings, WebhookSettings};
use lisan_common::auth::load_or_create_token_secret;
use lisan_common::config::TomlConfig;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for lisan-api
#[derive(Parser, Debug)]
#[command(name = "lisan-api")]
#[command(about = "Lisan language-learning REST API")]
#[command(version)]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long, env = "LISAN_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Interface to bind (overrides config)
    #[arg(long)]
    host: Option<String>,

    /// SQLite database file (overrides config)
    #[arg(short, long)]
    database: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = TomlConfig::resolve(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(database) = args.database {
        config.database_path = Some(database);
    }

    // RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{},tower_http=info", config.logging.level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting lisan-api v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let db_path = config.database_path();
    info!("Database: {}", db_path.display());
    let db = lisan_common::db::init_database(&db_path)
        .await
        .context("Failed to initialize database")?;

    let token_secret = load_or_create_token_secret(&db, config.auth.token_secret.as_deref())
        .await
        .context("Failed to load token secret")?;

    if let Some(seed) = &config.admin {
        lisan_api::db::users::ensure_admin(&db, seed)
            .await
            .context("Failed to seed admin account")?;
    }

    let services = Services::from_config(&config).context("Failed to create service clients")?;

    let state = AppState::new(
        db,
        AuthSettings {
            token_secret,
            token_ttl_hours: config.auth.token_ttl_hours,
        },
        services,
        WebhookSettings {
            secret_key: config.webhook.secret_key.clone(),
            bucket_name: config.webhook.bucket_name.clone(),
        },
        config.audio.long_text_threshold,
    );

    let app = lisan_api::build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.host, config.port))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
