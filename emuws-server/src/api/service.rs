//! Service endpoints: liveness and build identification
//!
//! Neither endpoint needs cookies or touches the registry.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::AppState;

/// Name reported in health answers
pub const MODULE_NAME: &str = env!("CARGO_PKG_NAME");

/// Build identification captured by the build script
#[derive(Debug, Clone, Copy, Serialize)]
pub struct BuildInfo {
    pub version: &'static str,
    pub git_hash: &'static str,
    pub build_timestamp: &'static str,
    pub build_profile: &'static str,
}

impl BuildInfo {
    pub const CURRENT: BuildInfo = BuildInfo {
        version: env!("CARGO_PKG_VERSION"),
        git_hash: env!("GIT_HASH"),
        build_timestamp: env!("BUILD_TIMESTAMP"),
        build_profile: env!("BUILD_PROFILE"),
    };
}

/// `GET /health` answer
#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub module: &'static str,
    pub version: &'static str,
    /// Whether the repositories root is an existing directory
    pub repositories: bool,
}

async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    let repositories = tokio::fs::metadata(state.layout.root())
        .await
        .map(|meta| meta.is_dir())
        .unwrap_or(false);

    Json(HealthReport {
        status: "ok",
        module: MODULE_NAME,
        version: BuildInfo::CURRENT.version,
        repositories,
    })
}

async fn build_info() -> Json<BuildInfo> {
    Json(BuildInfo::CURRENT)
}

/// `/health` and `/api/buildinfo`
pub fn service_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/api/buildinfo", get(build_info))
}
