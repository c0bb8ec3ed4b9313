//! emuws-server - WebSocket back end for the EMU-webApp annotation editor
//!
//! Serves and saves emuDB bundles for editor sessions authorized by the
//! session registry.

use anyhow::{Context, Result};
use emuws_common::db::init_database;
use emuws_server::api::BuildInfo;
use emuws_server::config::ServerConfig;
use emuws_server::registry::SqliteRegistry;
use emuws_server::repo::RepositoryLayout;
use emuws_server::{build_router, AppState};
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is normal in production
    let dotenv = dotenvy::dotenv();

    let config = ServerConfig::load().context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Log build identification immediately after tracing init
    let build = BuildInfo::CURRENT;
    info!(
        "Starting emuws-server v{} [{}] built {} ({})",
        build.version, build.git_hash, build.build_timestamp, build.build_profile
    );

    if let Ok(path) = dotenv {
        info!("Loaded environment from {}", path.display());
    }

    info!("Repositories: {}", config.repositories_path.display());
    info!("Media base URL: {}", config.media_file_base_url);
    if !config.repositories_path.is_dir() {
        warn!(
            "Repositories path {} is not a directory; every bundle request will fail",
            config.repositories_path.display()
        );
    }

    info!("Registry database: {}", config.database_path.display());
    let pool = init_database(&config.database_path)
        .await
        .context("Failed to open registry database")?;
    let registry = Arc::new(SqliteRegistry::new(pool));

    let layout = RepositoryLayout::new(&config.repositories_path, &config.emu_db_name);
    let state = AppState::new(
        registry,
        layout,
        &config.media_file_base_url,
        config.stage_in_git,
    );
    let app = build_router(state);

    let addr = config.socket_addr().context("Invalid bind address")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("emuws-server listening on ws://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
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
                warn!("Failed to install SIGTERM handler: {}", e);
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
