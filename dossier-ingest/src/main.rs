//! dossier-ingest - profile ingestion microservice
//!
//! Ingests resumes, project documents, submitted text and remote profiles,
//! extracts them into structured profiles and merges them per user.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use dossier_common::config::ServiceConfig;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dossier_ingest::pipeline::PipelineContext;
use dossier_ingest::AppState;

/// Command-line arguments for dossier-ingest
#[derive(Parser, Debug)]
#[command(name = "dossier-ingest")]
#[command(about = "Profile ingestion and aggregation service")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "DOSSIER_PORT")]
    port: Option<u16>,

    /// Address to bind
    #[arg(long, env = "DOSSIER_HOST")]
    host: Option<String>,

    /// TOML configuration file
    #[arg(short, long, env = "DOSSIER_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite database file
    #[arg(short, long, env = "DOSSIER_DATABASE_PATH")]
    database: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dossier_ingest=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = ServiceConfig::load(args.config.as_deref())
        .context("Failed to load configuration")?;
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(database) = args.database {
        config.database.path = database;
    }

    info!("Starting dossier-ingest v{}", env!("CARGO_PKG_VERSION"));
    info!("Database: {}", config.database.path.display());
    info!(resolver = ?config.merge.resolver, auth = ?config.auth.mode, "Pipeline settings");

    let db = dossier_common::db::init_database_with(
        &config.database.path,
        config.database.max_connections,
    )
    .await
    .context("Failed to open database")?;
    info!("Database connection established");

    let identity = dossier_ingest::auth::from_config(&config.auth)
        .context("Failed to configure identity provider")?;
    let pipeline = PipelineContext::from_config(db, &config)
        .context("Failed to configure pipeline collaborators")?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(config, identity, pipeline);
    let app = dossier_ingest::build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

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
            error!("Failed to install Ctrl+C handler: {}", e);
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
                error!("Failed to install terminate handler: {}", e);
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
