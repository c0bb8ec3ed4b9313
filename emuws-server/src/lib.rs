//! emuws-server library
//!
//! WebSocket back end for the EMU-webApp annotation editor. Serves bundles
//! (audio, annotation and signal tracks) out of per-project emuDB
//! repositories and writes edited bundles back, authorizing every message
//! against the session registry.

use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod auth;
pub mod bundle;
pub mod catalog;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod registry;
pub mod repo;

use auth::AuthorizationGate;
use bundle::{BundleAssembler, BundlePersister, GitStager};
use dispatch::Dispatcher;
use registry::{BundleListStore, SessionRegistry};
use repo::RepositoryLayout;

/// Application state shared across HTTP handlers and connections
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub gate: Arc<AuthorizationGate>,
    pub layout: RepositoryLayout,
}

impl AppState {
    /// Wire the gate, assembler and persister around one registry
    pub fn new<R>(
        registry: Arc<R>,
        layout: RepositoryLayout,
        media_base_url: &str,
        stage_in_git: bool,
    ) -> Self
    where
        R: SessionRegistry + BundleListStore + 'static,
    {
        let sessions: Arc<dyn SessionRegistry> = registry.clone();
        let lists: Arc<dyn BundleListStore> = registry;

        let gate = Arc::new(AuthorizationGate::new(sessions.clone()));
        let assembler = BundleAssembler::new(layout.clone(), sessions, media_base_url);
        let persister =
            BundlePersister::new(layout.clone(), lists.clone(), GitStager::new(stage_in_git));
        let dispatcher = Arc::new(Dispatcher::new(
            gate.clone(),
            layout.clone(),
            lists,
            assembler,
            persister,
        ));

        Self {
            dispatcher,
            gate,
            layout,
        }
    }
}

/// Build application router
///
/// `/` upgrades to the editor WebSocket; plain GETs on it get a short text
/// answer. The file route authorizes with the session cookie.
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .route("/", get(api::websocket_or_empty))
        .route(
            "/file/project/:project_id/session/:session_name/file/:file_name",
            get(api::get_bundle_file),
        )
        .merge(api::service_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
