//! SQLite-backed registry

use async_trait::async_trait;
use emuws_common::db::{Identity, ProjectRecord};
use emuws_common::protocol::BundleListEntry;
use sqlx::SqlitePool;

use super::{BundleList, BundleListStore, SaveOutcome, SessionRegistry};
use crate::error::Result;

/// Registry over the tables created by `emuws_common::db::init`
#[derive(Clone)]
pub struct SqliteRegistry {
    pool: SqlitePool,
}

impl SqliteRegistry {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert or replace a user, binding it to `session_token`
    pub async fn upsert_user(&self, identity: &Identity, session_token: Option<&str>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, username, eppn, email, first_name, last_name, session_token)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                username = excluded.username,
                eppn = excluded.eppn,
                email = excluded.email,
                first_name = excluded.first_name,
                last_name = excluded.last_name,
                session_token = excluded.session_token
            "#,
        )
        .bind(&identity.id)
        .bind(&identity.username)
        .bind(&identity.eppn)
        .bind(&identity.email)
        .bind(&identity.first_name)
        .bind(&identity.last_name)
        .bind(session_token)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn create_project(&self, project_id: &str, name: &str) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO projects (id, name) VALUES (?, ?)")
            .bind(project_id)
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn add_member(&self, project_id: &str, username: &str) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO project_members (project_id, username) VALUES (?, ?)")
            .bind(project_id)
            .bind(username)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn remove_member(&self, project_id: &str, username: &str) -> Result<()> {
        sqlx::query("DELETE FROM project_members WHERE project_id = ? AND username = ?")
            .bind(project_id)
            .bind(username)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Create a bundle list at version 0, replacing any existing one
    pub async fn create_bundle_list(
        &self,
        project_id: &str,
        owner: &str,
        bundles: &[BundleListEntry],
    ) -> Result<()> {
        let json = serde_json::to_string(bundles).map_err(emuws_common::Error::from)?;
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO bundle_lists (project_id, owner, bundles, version)
            VALUES (?, ?, ?, 0)
            "#,
        )
        .bind(project_id)
        .bind(owner)
        .bind(json)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl SessionRegistry for SqliteRegistry {
    async fn find_sessions_by_token(&self, token: &str) -> Result<Vec<Identity>> {
        let rows: Vec<(String, String, String, String, String, String)> = sqlx::query_as(
            r#"
            SELECT id, username, eppn, email, first_name, last_name
            FROM users
            WHERE session_token = ?
            ORDER BY rowid
            "#,
        )
        .bind(token)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, username, eppn, email, first_name, last_name)| Identity {
                id,
                username,
                eppn,
                email,
                first_name,
                last_name,
            })
            .collect())
    }

    async fn find_projects_by_membership(
        &self,
        project_id: &str,
        username: &str,
    ) -> Result<Vec<ProjectRecord>> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT p.id, p.name
            FROM projects p
            JOIN project_members m ON m.project_id = p.id
            WHERE p.id = ? AND m.username = ?
            "#,
        )
        .bind(project_id)
        .bind(username)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, name)| ProjectRecord { id, name })
            .collect())
    }
}

#[async_trait]
impl BundleListStore for SqliteRegistry {
    async fn find_bundle_list(&self, project_id: &str, owner: &str) -> Result<Option<BundleList>> {
        let row: Option<(String, i64)> = sqlx::query_as(
            "SELECT bundles, version FROM bundle_lists WHERE project_id = ? AND owner = ?",
        )
        .bind(project_id)
        .bind(owner)
        .fetch_optional(&self.pool)
        .await?;

        let Some((bundles, version)) = row else {
            return Ok(None);
        };

        let bundles: Vec<BundleListEntry> =
            serde_json::from_str(&bundles).map_err(emuws_common::Error::from)?;

        Ok(Some(BundleList {
            project_id: project_id.to_string(),
            owner: owner.to_string(),
            bundles,
            version,
        }))
    }

    async fn save_bundle_list(&self, list: &BundleList) -> Result<SaveOutcome> {
        let json = serde_json::to_string(&list.bundles).map_err(emuws_common::Error::from)?;
        let result = sqlx::query(
            r#"
            UPDATE bundle_lists
            SET bundles = ?, version = version + 1, updated_at = CURRENT_TIMESTAMP
            WHERE project_id = ? AND owner = ? AND version = ?
            "#,
        )
        .bind(json)
        .bind(&list.project_id)
        .bind(&list.owner)
        .bind(list.version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            Ok(SaveOutcome::Conflict)
        } else {
            Ok(SaveOutcome::Saved)
        }
    }
}
