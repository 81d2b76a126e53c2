use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use taskdesk::config::Config;
use taskdesk::AppState;

#[derive(Parser, Debug)]
#[command(name = "taskdesk")]
#[command(author, version, about = "Employee directory and task board API", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "taskdesk.toml", env = "TASKDESK_CONFIG")]
    config: PathBuf,

    /// Override log level
    #[arg(short, long, env = "TASKDESK_LOG_LEVEL")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(&cli.config)?;

    // Initialize logging
    let log_level = cli
        .log_level
        .as_ref()
        .unwrap_or(&config.logging.level)
        .clone();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Taskdesk v{}", env!("CARGO_PKG_VERSION"));

    // Initialize database
    let db = taskdesk::db::init(&config.server).await?;

    // Ensure the configured admin user exists
    taskdesk::api::auth::ensure_admin_user(&db, &config.auth)
        .await
        .context("Failed to bootstrap admin user")?;

    if config.auth.api_token.is_some() {
        tracing::info!("Static API token enabled");
    }

    let state = Arc::new(AppState::new(config.clone(), db));
    let app = taskdesk::api::create_router(state);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("API server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
