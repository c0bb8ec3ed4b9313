//! Shared fixtures for emuws-server integration tests
//!
//! A fixture is a temporary repositories root holding one project with one
//! emuDB, plus an in-memory registry where `alice` is logged in and a
//! member of that project.

#![allow(dead_code)]

use async_trait::async_trait;
use emuws_common::db::{init_memory_database, Identity, ProjectRecord};
use emuws_common::protocol::BundleListEntry;
use emuws_server::dispatch::ConnectionCredentials;
use emuws_server::error::Result;
use emuws_server::registry::{
    BundleList, BundleListStore, SaveOutcome, SessionRegistry, SqliteRegistry,
};
use emuws_server::repo::RepositoryLayout;
use emuws_server::AppState;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub const TOKEN: &str = "f3a9c1d2e4b5a6978877";
pub const PROJECT: &str = "p1";
pub const USER: &str = "alice";
pub const MEDIA_BASE_URL: &str = "https://visp.example.org/";
pub const SAMPLE_RATE: u32 = 16000;

/// Track file content used by `write_bundle`
pub const TRACK_BYTES: &[u8] = &[0x53, 0x53, 0x46, 0x46, 0x00, 0x01, 0xfe, 0xff];

pub struct Fixture {
    pub dir: TempDir,
    pub registry: Arc<SqliteRegistry>,
    pub layout: RepositoryLayout,
    pub state: AppState,
}

pub fn identity(username: &str) -> Identity {
    Identity {
        id: format!("id-{username}"),
        username: username.to_string(),
        eppn: format!("{username}@example.org"),
        email: format!("{username}@example.org"),
        first_name: "Alice".to_string(),
        last_name: "Example".to_string(),
    }
}

/// Project with a config declaring one `formants` track (`.fms`)
pub async fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let pool = init_memory_database().await.unwrap();
    let registry = Arc::new(SqliteRegistry::new(pool));

    registry.upsert_user(&identity(USER), Some(TOKEN)).await.unwrap();
    registry.create_project(PROJECT, "Demo project").await.unwrap();
    registry.add_member(PROJECT, USER).await.unwrap();

    let layout = RepositoryLayout::new(dir.path(), "VISP");
    let emu_db_dir = layout.emu_db_dir(PROJECT).unwrap();
    std::fs::create_dir_all(&emu_db_dir).unwrap();
    std::fs::write(
        layout.config_path(PROJECT).unwrap(),
        serde_json::to_vec_pretty(&project_config()).unwrap(),
    )
    .unwrap();

    let state = AppState::new(registry.clone(), layout.clone(), MEDIA_BASE_URL, false);

    Fixture {
        dir,
        registry,
        layout,
        state,
    }
}

pub fn project_config() -> Value {
    json!({
        "name": "VISP",
        "UUID": "0fc618dc-8980-414d-8c7a-144a649ce199",
        "ssffTrackDefinitions": [
            {"name": "formants", "columnName": "fm", "fileExtension": "fms"}
        ],
        "levelDefinitions": []
    })
}

pub fn annotation(bundle: &str) -> Value {
    json!({
        "name": bundle,
        "annotates": format!("{bundle}.wav"),
        "sampleRate": SAMPLE_RATE,
        "levels": [{"name": "Word", "type": "SEGMENT", "items": []}],
        "links": []
    })
}

pub fn credentials() -> ConnectionCredentials {
    ConnectionCredentials::new(Some(TOKEN.to_string()), Some(PROJECT.to_string()))
}

pub fn write_wav(path: &Path, sample_rate: u32, samples: usize) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for i in 0..samples {
        writer.write_sample(((i % 64) as i16 - 32) * 100).unwrap();
    }
    writer.finalize().unwrap();
}

impl Fixture {
    pub fn bundle_dir(&self, session: &str, bundle: &str) -> PathBuf {
        self.layout.bundle(PROJECT, session, bundle).unwrap().dir
    }

    /// Write audio, annotation and the `.fms` track of one bundle
    pub fn write_bundle(&self, session: &str, bundle: &str) -> PathBuf {
        let dir = self.bundle_dir(session, bundle);
        std::fs::create_dir_all(&dir).unwrap();

        write_wav(&dir.join(format!("{bundle}.wav")), SAMPLE_RATE, SAMPLE_RATE as usize / 4);
        std::fs::write(
            dir.join(format!("{bundle}_annot.json")),
            serde_json::to_vec(&annotation(bundle)).unwrap(),
        )
        .unwrap();
        std::fs::write(dir.join(format!("{bundle}.fms")), TRACK_BYTES).unwrap();

        dir
    }

    pub async fn create_list(&self, entries: &[BundleListEntry]) {
        self.registry
            .create_bundle_list(PROJECT, USER, entries)
            .await
            .unwrap();
    }

    /// Send one message with the member's credentials
    pub async fn send(&self, message: Value) -> Option<Value> {
        self.send_as(&credentials(), &message.to_string()).await
    }

    pub async fn send_as(&self, credentials: &ConnectionCredentials, text: &str) -> Option<Value> {
        self.state
            .dispatcher
            .handle_message(credentials, text)
            .await
            .map(|response| serde_json::to_value(response).unwrap())
    }
}

/// How `ScriptedRegistry` misbehaves on bundle-list reads
#[derive(Debug, Clone, Copy)]
pub enum ListScript {
    Delay(Duration),
    Panic,
}

/// The fixture's registry with scripted bundle-list reads
///
/// Identity and membership lookups, and list writes, go straight to the
/// wrapped registry.
pub struct ScriptedRegistry {
    inner: SqliteRegistry,
    script: ListScript,
}

#[async_trait]
impl SessionRegistry for ScriptedRegistry {
    async fn find_sessions_by_token(&self, token: &str) -> Result<Vec<Identity>> {
        self.inner.find_sessions_by_token(token).await
    }

    async fn find_projects_by_membership(
        &self,
        project_id: &str,
        username: &str,
    ) -> Result<Vec<ProjectRecord>> {
        self.inner.find_projects_by_membership(project_id, username).await
    }
}

#[async_trait]
impl BundleListStore for ScriptedRegistry {
    async fn find_bundle_list(&self, project_id: &str, owner: &str) -> Result<Option<BundleList>> {
        match self.script {
            ListScript::Delay(delay) => tokio::time::sleep(delay).await,
            ListScript::Panic => panic!("bundle list store failure"),
        }
        self.inner.find_bundle_list(project_id, owner).await
    }

    async fn save_bundle_list(&self, list: &BundleList) -> Result<SaveOutcome> {
        self.inner.save_bundle_list(list).await
    }
}

impl Fixture {
    /// State over the same repositories and registry, with scripted list reads
    pub fn scripted_state(&self, script: ListScript) -> AppState {
        let registry = Arc::new(ScriptedRegistry {
            inner: (*self.registry).clone(),
            script,
        });
        AppState::new(registry, self.layout.clone(), MEDIA_BASE_URL, false)
    }
}
