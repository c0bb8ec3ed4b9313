//! Bundle Assembler
//!
//! Builds the `GETBUNDLE` payload from the files of one bundle directory:
//! the annotation document, a URL for the audio, and every catalog track
//! that exists on disk.

use base64::{engine::general_purpose, Engine as _};
use emuws_common::db::Identity;
use emuws_common::protocol::{BundlePayload, FileEncoding, MediaFile, SsffFile};
use serde_json::Value;
use std::io::ErrorKind;
use std::sync::Arc;
use tracing::{debug, warn};

use super::audio::read_audio_metadata;
use crate::catalog::TrackDefinition;
use crate::error::{Error, Result};
use crate::registry::SessionRegistry;
use crate::repo::{BundleLocation, RepositoryLayout};

/// Composes bundle payloads
pub struct BundleAssembler {
    layout: RepositoryLayout,
    registry: Arc<dyn SessionRegistry>,
    media_base_url: String,
}

impl BundleAssembler {
    pub fn new(
        layout: RepositoryLayout,
        registry: Arc<dyn SessionRegistry>,
        media_base_url: impl Into<String>,
    ) -> Self {
        Self {
            layout,
            registry,
            media_base_url: media_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// URL of the file endpoint serving this bundle's audio
    ///
    /// Each path segment is percent-encoded.
    pub fn media_url(&self, location: &BundleLocation) -> String {
        format!(
            "{}/file/project/{}/session/{}/file/{}",
            self.media_base_url,
            urlencoding::encode(&location.project_id),
            urlencoding::encode(&location.session_slug),
            urlencoding::encode(&location.audio_file_name())
        )
    }

    /// Assemble one bundle
    ///
    /// Membership is checked again here: it may have been revoked since the
    /// gate passed the request. Missing track files are skipped; a missing
    /// or unreadable audio file or annotation fails the whole bundle.
    pub async fn assemble(
        &self,
        identity: &Identity,
        project_id: &str,
        session: &str,
        bundle: &str,
        catalog: &[TrackDefinition],
    ) -> Result<BundlePayload> {
        let memberships = self
            .registry
            .find_projects_by_membership(project_id, &identity.username)
            .await?;
        if memberships.is_empty() {
            return Err(Error::NotAuthorizedForProject(project_id.to_string()));
        }

        let location = self.layout.bundle(project_id, session, bundle)?;

        let ssff_files = self.read_tracks(&location, catalog).await?;

        let audio = read_audio_metadata(location.audio_path()).await?;
        debug!(
            bundle = %location.bundle,
            sample_rate = audio.sample_rate,
            duration_s = audio.duration_seconds,
            "Read audio metadata"
        );

        let annotation = read_annotation(&location).await?;
        if let Some(declared) = annotation.get("sampleRate").and_then(Value::as_u64) {
            if declared != u64::from(audio.sample_rate) {
                warn!(
                    "Annotation of {} declares sampleRate {} but audio is {} Hz",
                    location.bundle, declared, audio.sample_rate
                );
            }
        }

        Ok(BundlePayload {
            annotation,
            media_file: Some(MediaFile {
                data: self.media_url(&location),
                encoding: FileEncoding::GetUrl,
            }),
            ssff_files,
        })
    }

    async fn read_tracks(
        &self,
        location: &BundleLocation,
        catalog: &[TrackDefinition],
    ) -> Result<Vec<SsffFile>> {
        let mut files = Vec::with_capacity(catalog.len());

        for track in catalog {
            let path = location.track_path(&track.file_extension)?;
            match tokio::fs::read(&path).await {
                Ok(bytes) => files.push(SsffFile {
                    data: general_purpose::STANDARD.encode(bytes),
                    encoding: FileEncoding::Base64,
                    file_extension: track.file_extension.clone(),
                }),
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    debug!("Track {} not present for bundle {}", track.name, location.bundle);
                }
                Err(e) => return Err(Error::Io(e)),
            }
        }

        Ok(files)
    }
}

/// Load the annotation document verbatim
async fn read_annotation(location: &BundleLocation) -> Result<Value> {
    let file = location.annotation_file_name();
    let unreadable = |reason: String| Error::AnnotationUnreadable {
        file: file.clone(),
        reason,
    };

    let text = tokio::fs::read_to_string(location.annotation_path())
        .await
        .map_err(|e| unreadable(e.to_string()))?;
    let annotation: Value = serde_json::from_str(&text).map_err(|e| unreadable(e.to_string()))?;

    if !annotation.is_object() {
        return Err(unreadable("annotation is not a JSON object".to_string()));
    }
    Ok(annotation)
}
