//! Integration tests for bundle assembly and persistence
//!
//! Drives `BundleAssembler` and `BundlePersister` directly to observe what
//! the protocol does not report: bundle-list outcomes, files left alone,
//! and git staging.

mod common;

use common::*;
use emuws_common::protocol::{BundleListEntry, BundlePayload, FileEncoding, SsffFile};
use emuws_server::bundle::{BundleAssembler, BundlePersister, GitStager, ListUpdate, Progress};
use emuws_server::catalog;
use emuws_server::error::Error;
use emuws_server::registry::BundleListStore;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;

fn persister(fx: &Fixture, stage: bool) -> BundlePersister {
    let lists: Arc<dyn BundleListStore> = fx.registry.clone();
    BundlePersister::new(fx.layout.clone(), lists, GitStager::new(stage))
}

fn progress(finished: bool, comment: &str) -> Progress {
    Progress {
        finished_editing: finished,
        comment: comment.to_string(),
    }
}

fn payload_with_track(bundle: &str, extension: &str, data: &[u8]) -> BundlePayload {
    use base64::{engine::general_purpose, Engine as _};
    BundlePayload {
        annotation: annotation(bundle),
        media_file: None,
        ssff_files: vec![SsffFile {
            data: general_purpose::STANDARD.encode(data),
            encoding: FileEncoding::Base64,
            file_extension: extension.to_string(),
        }],
    }
}

#[tokio::test]
async fn test_list_outcomes() {
    let fx = fixture().await;
    fx.write_bundle("session1", "item01");
    let persister = persister(&fx, false);
    let payload = payload_with_track("item01", "fms", b"x");
    let owner = identity(USER);

    let report = persister
        .persist(&owner, PROJECT, "session1", &payload, &progress(true, "a"))
        .await
        .unwrap();
    assert_eq!(report.list_update, ListUpdate::ListMissing);
    assert_eq!(report.tracks_written, 1);

    fx.create_list(&[BundleListEntry::new("item09", "session1")]).await;
    let report = persister
        .persist(&owner, PROJECT, "session1", &payload, &progress(true, "b"))
        .await
        .unwrap();
    assert_eq!(report.list_update, ListUpdate::EntryAdded);

    let report = persister
        .persist(&owner, PROJECT, "session1", &payload, &progress(false, "c"))
        .await
        .unwrap();
    assert_eq!(report.list_update, ListUpdate::Updated);

    let list = fx
        .registry
        .find_bundle_list(PROJECT, USER)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(list.bundles.len(), 2);
    assert!(list.bundles[0].matches("item09", "session1"));
    assert!(list.bundles[1].matches("item01", "session1"));
    assert!(!list.bundles[1].finished_editing);
    assert_eq!(list.bundles[1].comment, "c");
    assert_eq!(list.version, 2);
}

#[tokio::test]
async fn test_tracks_missing_from_payload_left_on_disk() {
    let fx = fixture().await;
    let dir = fx.write_bundle("session1", "item01");
    std::fs::write(dir.join("item01.f0"), b"pitch").unwrap();

    persister(&fx, false)
        .persist(
            &identity(USER),
            PROJECT,
            "session1",
            &payload_with_track("item01", "fms", b"formants"),
            &progress(false, ""),
        )
        .await
        .unwrap();

    assert_eq!(std::fs::read(dir.join("item01.fms")).unwrap(), b"formants");
    assert_eq!(std::fs::read(dir.join("item01.f0")).unwrap(), b"pitch");
    assert!(dir.join("item01.wav").exists());
}

#[tokio::test]
async fn test_saved_files_staged_in_project_repository() {
    let fx = fixture().await;
    let project_dir = fx.layout.project_dir(PROJECT).unwrap();
    git2::Repository::init(&project_dir).unwrap();
    fx.write_bundle("session1", "item01");

    persister(&fx, true)
        .persist(
            &identity(USER),
            PROJECT,
            "session1",
            &payload_with_track("item01", "fms", b"formants"),
            &progress(false, ""),
        )
        .await
        .unwrap();

    let index = git2::Repository::open(&project_dir).unwrap().index().unwrap();
    let bundle = "Data/VISP_emuDB/session1_ses/item01_bndl";
    assert!(index
        .get_path(Path::new(&format!("{bundle}/item01.fms")), 0)
        .is_some());
    assert!(index
        .get_path(Path::new(&format!("{bundle}/item01_annot.json")), 0)
        .is_some());
    // Audio was not written, so it is not staged
    assert!(index
        .get_path(Path::new(&format!("{bundle}/item01.wav")), 0)
        .is_none());

    let config = git2::Repository::open(&project_dir)
        .unwrap()
        .config()
        .unwrap()
        .open_level(git2::ConfigLevel::Local)
        .unwrap();
    assert_eq!(config.get_string("user.name").unwrap(), "Alice Example");
    assert_eq!(config.get_string("user.email").unwrap(), "alice@example.org");
}

#[tokio::test]
async fn test_concurrent_saves_in_one_project_all_staged() {
    let fx = fixture().await;
    let project_dir = fx.layout.project_dir(PROJECT).unwrap();
    git2::Repository::init(&project_dir).unwrap();

    let bundles: Vec<String> = (1..=6).map(|i| format!("item{i:02}")).collect();
    for bundle in &bundles {
        fx.write_bundle("session1", bundle);
    }

    let persister = persister(&fx, true);
    let owner = identity(USER);
    let untouched = progress(false, "");
    let payloads: Vec<BundlePayload> = bundles
        .iter()
        .map(|bundle| payload_with_track(bundle, "fms", bundle.as_bytes()))
        .collect();

    let saves = payloads
        .iter()
        .map(|payload| persister.persist(&owner, PROJECT, "session1", payload, &untouched));
    for report in futures::future::join_all(saves).await {
        report.unwrap();
    }

    let index = git2::Repository::open(&project_dir).unwrap().index().unwrap();
    for bundle in &bundles {
        let dir = format!("Data/VISP_emuDB/session1_ses/{bundle}_bndl");
        assert!(
            index.get_path(Path::new(&format!("{dir}/{bundle}.fms")), 0).is_some(),
            "{bundle}.fms not staged"
        );
        assert!(
            index
                .get_path(Path::new(&format!("{dir}/{bundle}_annot.json")), 0)
                .is_some(),
            "{bundle}_annot.json not staged"
        );
    }
}

#[tokio::test]
async fn test_save_without_bundle_name() {
    let fx = fixture().await;
    let payload = BundlePayload {
        annotation: json!({"levels": []}),
        media_file: None,
        ssff_files: Vec::new(),
    };

    let err = persister(&fx, false)
        .persist(&identity(USER), PROJECT, "session1", &payload, &progress(false, ""))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidRequest(_)));
}

#[tokio::test]
async fn test_assembler_rechecks_membership() {
    let fx = fixture().await;
    fx.write_bundle("session1", "item01");
    let tracks = catalog::resolve_tracks(&fx.layout, PROJECT).await.unwrap();
    let assembler = BundleAssembler::new(fx.layout.clone(), fx.registry.clone(), MEDIA_BASE_URL);

    let payload = assembler
        .assemble(&identity(USER), PROJECT, "session1", "item01", &tracks)
        .await
        .unwrap();
    assert_eq!(payload.ssff_files.len(), 1);

    fx.registry.remove_member(PROJECT, USER).await.unwrap();
    let err = assembler
        .assemble(&identity(USER), PROJECT, "session1", "item01", &tracks)
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "User not authorized to access the project with id p1"
    );
}

#[tokio::test]
async fn test_catalog_order_fixes_track_order() {
    let fx = fixture().await;
    let dir = fx.write_bundle("session1", "item01");
    std::fs::write(dir.join("item01.f0"), b"pitch").unwrap();

    let config = json!({
        "ssffTrackDefinitions": [
            {"name": "pitch", "columnName": "F0", "fileExtension": "f0"},
            {"name": "formants", "columnName": "fm", "fileExtension": "fms"}
        ]
    });
    std::fs::write(fx.layout.config_path(PROJECT).unwrap(), config.to_string()).unwrap();

    let tracks = catalog::resolve_tracks(&fx.layout, PROJECT).await.unwrap();
    let assembler = BundleAssembler::new(fx.layout.clone(), fx.registry.clone(), MEDIA_BASE_URL);
    let payload = assembler
        .assemble(&identity(USER), PROJECT, "session1", "item01", &tracks)
        .await
        .unwrap();

    let extensions: Vec<_> = payload
        .ssff_files
        .iter()
        .map(|f| f.file_extension.as_str())
        .collect();
    assert_eq!(extensions, vec!["f0", "fms"]);
}
