//! Session Registry interface
//!
//! The identity store is external. The server only ever asks it two
//! questions (who owns this token, is this user in this project) and
//! reads/writes one bundle list per (project, user).

use async_trait::async_trait;
use emuws_common::db::{Identity, ProjectRecord};
use emuws_common::protocol::BundleListEntry;

use crate::error::Result;

mod sqlite;

pub use sqlite::SqliteRegistry;

/// Identity and membership lookups
#[async_trait]
pub trait SessionRegistry: Send + Sync {
    /// All identity records carrying `token`, in registry order
    async fn find_sessions_by_token(&self, token: &str) -> Result<Vec<Identity>>;

    /// Projects with id `project_id` that list `username` as a member
    async fn find_projects_by_membership(
        &self,
        project_id: &str,
        username: &str,
    ) -> Result<Vec<ProjectRecord>>;
}

/// A user's bundle list with its optimistic-concurrency version
#[derive(Debug, Clone, PartialEq)]
pub struct BundleList {
    pub project_id: String,
    pub owner: String,
    pub bundles: Vec<BundleListEntry>,
    pub version: i64,
}

/// Outcome of a versioned bundle-list write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    /// Stored version no longer matches the one read
    Conflict,
}

/// Per-(project, user) bundle list storage
#[async_trait]
pub trait BundleListStore: Send + Sync {
    async fn find_bundle_list(&self, project_id: &str, owner: &str) -> Result<Option<BundleList>>;

    /// Write `list.bundles` if the stored version still equals `list.version`
    async fn save_bundle_list(&self, list: &BundleList) -> Result<SaveOutcome>;
}
