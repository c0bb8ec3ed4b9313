//! Bundle Persister
//!
//! Inverse of the assembler: writes the track files and annotation document
//! of a `SAVEBUNDLE` payload back into the bundle directory, then records
//! the editing progress in the owner's bundle list.
//!
//! Files are only ever created or overwritten. Tracks missing from the
//! payload stay on disk untouched.

use base64::{engine::general_purpose, Engine as _};
use emuws_common::db::Identity;
use emuws_common::protocol::{BundleListEntry, BundlePayload, FileEncoding};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info};

use super::locks::KeyedLocks;
use super::staging::GitStager;
use crate::error::{Error, Result};
use crate::registry::{BundleListStore, SaveOutcome};
use crate::repo::{BundleLocation, RepositoryLayout};

/// Attempts at the versioned bundle-list write before giving up
const LIST_WRITE_ATTEMPTS: usize = 3;

/// What happened to the owner's bundle list during a save
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListUpdate {
    Updated,
    /// List had no row for this bundle; one was appended
    EntryAdded,
    /// No list for (project, owner); progress fields were dropped
    ListMissing,
}

/// Result of a successful save
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReport {
    pub tracks_written: usize,
    pub list_update: ListUpdate,
}

/// Editing progress to store in the bundle list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    pub finished_editing: bool,
    pub comment: String,
}

/// Writes bundles back to their repository
pub struct BundlePersister {
    layout: RepositoryLayout,
    lists: Arc<dyn BundleListStore>,
    stager: GitStager,
    bundle_locks: KeyedLocks<PathBuf>,
    list_locks: KeyedLocks<(String, String)>,
}

impl BundlePersister {
    pub fn new(layout: RepositoryLayout, lists: Arc<dyn BundleListStore>, stager: GitStager) -> Self {
        Self {
            layout,
            lists,
            stager,
            bundle_locks: KeyedLocks::new(),
            list_locks: KeyedLocks::new(),
        }
    }

    /// Persist a bundle for `owner`
    ///
    /// `session` is the display name as listed in the bundle list; the
    /// bundle name is taken from `payload.annotation.name`. Every track is
    /// decoded before the first byte is written.
    pub async fn persist(
        &self,
        owner: &Identity,
        project_id: &str,
        session: &str,
        payload: &BundlePayload,
        progress: &Progress,
    ) -> Result<SaveReport> {
        let bundle = payload
            .annotation_name()
            .ok_or_else(|| Error::InvalidRequest("Annotation has no bundle name".to_string()))?;
        let location = self.layout.bundle(project_id, session, bundle)?;

        match tokio::fs::metadata(&location.dir).await {
            Ok(meta) if meta.is_dir() => {}
            _ => {
                return Err(Error::BundleNotFound {
                    session: session.to_string(),
                    bundle: bundle.to_string(),
                })
            }
        }

        let tracks = decode_tracks(&location, payload)?;
        let annotation = serde_json::to_vec_pretty(&payload.annotation)
            .map_err(|e| Error::InvalidRequest(format!("Annotation not serializable: {}", e)))?;

        let written = {
            let _guard = self.bundle_locks.lock(location.dir.clone()).await;
            let mut written = Vec::with_capacity(tracks.len() + 1);

            for (path, bytes) in &tracks {
                tokio::fs::write(path, bytes).await?;
                written.push(path.clone());
            }

            let annotation_path = location.annotation_path();
            tokio::fs::write(&annotation_path, &annotation).await?;
            written.push(annotation_path);

            written
        };

        info!(
            "User {} saved bundle {} in session {} ({} track file(s))",
            owner.username,
            location.bundle,
            session,
            tracks.len()
        );

        let project_dir = self.layout.project_dir(project_id)?;
        self.stager.stage(owner, project_dir, written).await;

        let list_update = self
            .update_bundle_list(owner, project_id, session, bundle, progress)
            .await?;

        Ok(SaveReport {
            tracks_written: tracks.len(),
            list_update,
        })
    }

    async fn update_bundle_list(
        &self,
        owner: &Identity,
        project_id: &str,
        session: &str,
        bundle: &str,
        progress: &Progress,
    ) -> Result<ListUpdate> {
        let _guard = self
            .list_locks
            .lock((project_id.to_string(), owner.username.clone()))
            .await;

        for attempt in 1..=LIST_WRITE_ATTEMPTS {
            let Some(mut list) = self.lists.find_bundle_list(project_id, &owner.username).await?
            else {
                error!(
                    "BundleListMissing: no bundle list for {} in project {} when saving bundle {}",
                    owner.username, project_id, bundle
                );
                return Ok(ListUpdate::ListMissing);
            };

            let update = apply_progress(&mut list.bundles, bundle, session, progress);
            if update == ListUpdate::EntryAdded {
                info!(
                    "Adding bundle {} (session {}) to the bundle list of {}",
                    bundle, session, owner.username
                );
            }

            match self.lists.save_bundle_list(&list).await? {
                SaveOutcome::Saved => return Ok(update),
                SaveOutcome::Conflict => {
                    debug!(
                        "Bundle list of {} changed during save (attempt {}/{})",
                        owner.username, attempt, LIST_WRITE_ATTEMPTS
                    );
                }
            }
        }

        Err(Error::BundleListConflict {
            owner: owner.username.clone(),
        })
    }
}

/// Set progress on every row matching (bundle, session), appending one if none does
fn apply_progress(
    bundles: &mut Vec<BundleListEntry>,
    bundle: &str,
    session: &str,
    progress: &Progress,
) -> ListUpdate {
    let mut matched = false;
    for entry in bundles.iter_mut().filter(|e| e.matches(bundle, session)) {
        entry.finished_editing = progress.finished_editing;
        entry.comment = progress.comment.clone();
        matched = true;
    }
    if matched {
        return ListUpdate::Updated;
    }

    let mut entry = BundleListEntry::new(bundle, session);
    entry.finished_editing = progress.finished_editing;
    entry.comment = progress.comment.clone();
    bundles.push(entry);
    ListUpdate::EntryAdded
}

/// Decode every track of the payload to (target path, bytes)
fn decode_tracks(location: &BundleLocation, payload: &BundlePayload) -> Result<Vec<(PathBuf, Vec<u8>)>> {
    let mut seen = HashSet::new();
    let mut tracks = Vec::with_capacity(payload.ssff_files.len());

    for file in &payload.ssff_files {
        let path = location.track_path(&file.file_extension)?;
        if !seen.insert(file.file_extension.as_str()) {
            return Err(Error::InvalidRequest(format!(
                "Track extension {} appears more than once",
                file.file_extension
            )));
        }

        let file_name = location.track_file_name(&file.file_extension)?;
        let bytes = match file.encoding {
            FileEncoding::Base64 => general_purpose::STANDARD
                .decode(file.data.as_bytes())
                .map_err(|e| Error::UnsupportedEncoding {
                    file: file_name,
                    reason: e.to_string(),
                })?,
            FileEncoding::GetUrl | FileEncoding::Unsupported => {
                return Err(Error::UnsupportedEncoding {
                    file: file_name,
                    reason: "only BASE64 track data can be saved".to_string(),
                })
            }
        };

        tracks.push((path, bytes));
    }

    Ok(tracks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use emuws_common::protocol::SsffFile;
    use serde_json::json;

    fn payload(files: Vec<SsffFile>) -> BundlePayload {
        BundlePayload {
            annotation: json!({"name": "item01"}),
            media_file: None,
            ssff_files: files,
        }
    }

    fn location() -> BundleLocation {
        RepositoryLayout::new("/repos", "VISP")
            .bundle("p1", "session1", "item01")
            .unwrap()
    }

    #[test]
    fn test_progress_updates_matching_rows() {
        let mut bundles = vec![
            BundleListEntry::new("item01", "session1"),
            BundleListEntry::new("item01", "session2"),
        ];
        let progress = Progress {
            finished_editing: true,
            comment: "ok".to_string(),
        };

        let update = apply_progress(&mut bundles, "item01", "session1", &progress);
        assert_eq!(update, ListUpdate::Updated);
        assert_eq!(bundles.len(), 2);
        assert!(bundles[0].finished_editing);
        assert_eq!(bundles[0].comment, "ok");
        assert!(!bundles[1].finished_editing);
    }

    #[test]
    fn test_progress_appends_missing_row() {
        let mut bundles = vec![BundleListEntry::new("item02", "session1")];
        let progress = Progress {
            finished_editing: true,
            comment: "x".to_string(),
        };

        let update = apply_progress(&mut bundles, "item01", "session1", &progress);
        assert_eq!(update, ListUpdate::EntryAdded);
        assert_eq!(bundles.len(), 2);
        assert!(bundles[1].matches("item01", "session1"));
        assert!(bundles[1].finished_editing);
        assert_eq!(bundles[1].comment, "x");
    }

    #[test]
    fn test_decode_base64_tracks() {
        let tracks = decode_tracks(
            &location(),
            &payload(vec![SsffFile {
                data: general_purpose::STANDARD.encode([0u8, 1, 2, 255]),
                encoding: FileEncoding::Base64,
                file_extension: "fms".to_string(),
            }]),
        )
        .unwrap();

        assert_eq!(tracks.len(), 1);
        assert!(tracks[0].0.ends_with("item01_bndl/item01.fms"));
        assert_eq!(tracks[0].1, vec![0u8, 1, 2, 255]);
    }

    #[test]
    fn test_duplicate_extension_rejected() {
        let file = SsffFile {
            data: String::new(),
            encoding: FileEncoding::Base64,
            file_extension: "fms".to_string(),
        };
        let err = decode_tracks(&location(), &payload(vec![file.clone(), file])).unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }

    #[test]
    fn test_undecodable_tracks_rejected() {
        let bad_base64 = SsffFile {
            data: "***".to_string(),
            encoding: FileEncoding::Base64,
            file_extension: "fms".to_string(),
        };
        assert!(matches!(
            decode_tracks(&location(), &payload(vec![bad_base64])),
            Err(Error::UnsupportedEncoding { .. })
        ));

        let url = SsffFile {
            data: "http://x".to_string(),
            encoding: FileEncoding::GetUrl,
            file_extension: "f0".to_string(),
        };
        assert!(matches!(
            decode_tracks(&location(), &payload(vec![url])),
            Err(Error::UnsupportedEncoding { .. })
        ));
    }
}
