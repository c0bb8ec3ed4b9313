//! Track Catalog Resolver
//!
//! A project's emuDB config document declares which derived-signal (SSFF)
//! tracks exist. Declaration order is the order track files appear in an
//! assembled bundle.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use tracing::warn;

use crate::error::{Error, Result};
use crate::repo::{validate_component, RepositoryLayout};

/// Key of the track list inside the config document
const TRACK_DEFINITIONS_KEY: &str = "ssffTrackDefinitions";

/// One declared track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackDefinition {
    pub name: String,

    #[serde(rename = "columnName", default, skip_serializing_if = "Option::is_none")]
    pub column_name: Option<String>,

    #[serde(rename = "fileExtension")]
    pub file_extension: String,
}

/// Read and parse a project's config document
///
/// Missing or malformed documents fail with `ConfigUnreadable`. The
/// document is operator-managed, so nothing is retried or repaired.
pub async fn load_project_config(layout: &RepositoryLayout, project_id: &str) -> Result<Value> {
    let path = layout.config_path(project_id)?;
    let file = layout.config_file_name();

    let text = tokio::fs::read_to_string(&path).await.map_err(|e| {
        warn!("Project config unreadable at {}: {}", path.display(), e);
        Error::ConfigUnreadable {
            file: file.clone(),
            reason: e.to_string(),
        }
    })?;

    serde_json::from_str(&text).map_err(|e| {
        warn!("Project config malformed at {}: {}", path.display(), e);
        Error::ConfigUnreadable {
            file,
            reason: e.to_string(),
        }
    })
}

/// Extract the ordered track list from a parsed config document
///
/// A document without track definitions has no tracks. When an extension is
/// declared twice the first declaration wins.
pub fn tracks_from_config(config: &Value, file: &str) -> Result<Vec<TrackDefinition>> {
    let unreadable = |reason: String| Error::ConfigUnreadable {
        file: file.to_string(),
        reason,
    };

    let Some(definitions) = config.get(TRACK_DEFINITIONS_KEY) else {
        return Ok(Vec::new());
    };

    let declared: Vec<TrackDefinition> = serde_json::from_value(definitions.clone())
        .map_err(|e| unreadable(format!("{}: {}", TRACK_DEFINITIONS_KEY, e)))?;

    let mut seen = HashSet::new();
    let mut tracks = Vec::with_capacity(declared.len());
    for track in declared {
        validate_component("track extension", &track.file_extension)
            .map_err(|e| unreadable(e.to_string()))?;

        if !seen.insert(track.file_extension.clone()) {
            warn!(
                "Track {} repeats file extension {}, keeping first declaration",
                track.name, track.file_extension
            );
            continue;
        }
        tracks.push(track);
    }

    Ok(tracks)
}

/// Resolve the track catalog of a project
pub async fn resolve_tracks(
    layout: &RepositoryLayout,
    project_id: &str,
) -> Result<Vec<TrackDefinition>> {
    let config = load_project_config(layout, project_id).await?;
    tracks_from_config(&config, &layout.config_file_name())
}
