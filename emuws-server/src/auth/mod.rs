//! Authorization Gate
//!
//! Every inbound command is authorized against the Session Registry with the
//! connection's credential pair (session token, project id). The registry is
//! queried on every call; the cache is written on success but never read to
//! grant access.

use emuws_common::db::Identity;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::registry::SessionRegistry;

mod cache;

pub use cache::{AuthCache, AuthRecord, DEFAULT_CAPACITY, DEFAULT_TTL};

/// Why a credential pair was refused
///
/// Messages are sent to the client verbatim.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("No project id provided")]
    MissingProjectId,

    #[error("No PHP session id provided")]
    MissingToken,

    #[error("User not identified")]
    UnknownSession,

    #[error("User not authorized to access the project with id {project_id}")]
    NotAMember { project_id: String },

    /// Registry lookup failed; the detail is logged, not sent
    #[error("Authorization service unavailable")]
    Registry(String),
}

/// Shorten a token for logs
pub fn redact(token: &str) -> String {
    let prefix: String = token.chars().take(8).collect();
    if prefix.len() < token.len() {
        format!("{prefix}…")
    } else {
        prefix
    }
}

/// Checks session tokens and project membership
pub struct AuthorizationGate {
    registry: Arc<dyn SessionRegistry>,
    cache: AuthCache,
}

impl AuthorizationGate {
    pub fn new(registry: Arc<dyn SessionRegistry>) -> Self {
        Self::with_cache(registry, AuthCache::default())
    }

    pub fn with_cache(registry: Arc<dyn SessionRegistry>, cache: AuthCache) -> Self {
        Self { registry, cache }
    }

    pub fn cache(&self) -> &AuthCache {
        &self.cache
    }

    /// Authorize `token` for `project_id`
    ///
    /// Project id is checked before the token. Empty strings count as
    /// absent. When the registry holds several identities for one token the
    /// first one returned is used.
    pub async fn authenticate(
        &self,
        token: Option<&str>,
        project_id: Option<&str>,
    ) -> Result<Identity, AuthError> {
        let project_id = project_id
            .filter(|p| !p.is_empty())
            .ok_or(AuthError::MissingProjectId)?;
        let token = token.filter(|t| !t.is_empty()).ok_or(AuthError::MissingToken)?;

        let mut sessions = self
            .registry
            .find_sessions_by_token(token)
            .await
            .map_err(|e| {
                warn!("Session lookup failed for project {}: {}", project_id, e);
                AuthError::Registry(e.to_string())
            })?;

        if sessions.is_empty() {
            return Err(AuthError::UnknownSession);
        }
        if sessions.len() > 1 {
            warn!(
                token = %redact(token),
                count = sessions.len(),
                "Several identities share one session token, using the first"
            );
        }
        let identity = sessions.swap_remove(0);

        let projects = self
            .registry
            .find_projects_by_membership(project_id, &identity.username)
            .await
            .map_err(|e| {
                warn!("Membership lookup failed for project {}: {}", project_id, e);
                AuthError::Registry(e.to_string())
            })?;

        if projects.is_empty() {
            return Err(AuthError::NotAMember {
                project_id: project_id.to_string(),
            });
        }

        debug!("Authenticated user {} ({})", identity.eppn, identity.username);
        self.cache.record(token, project_id, &identity);

        Ok(identity)
    }

    /// Identity last authorized with this credential pair, if not expired
    ///
    /// Informational only; never use this to grant access.
    pub fn cached_identity(&self, token: &str, project_id: &str) -> Option<Identity> {
        self.cache.lookup(token, project_id).map(|record| record.identity)
    }
}
