//! Audio container metadata
//!
//! Reads sample rate and duration of a bundle's audio file with lofty.
//! Only the container header is parsed; samples are never decoded.

use lofty::prelude::*;
use lofty::probe::Probe;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Properties of a bundle's audio file
#[derive(Debug, Clone, PartialEq)]
pub struct AudioMetadata {
    pub sample_rate: u32,
    pub duration_seconds: f64,
    pub channels: Option<u8>,
}

fn probe(path: &Path) -> std::result::Result<AudioMetadata, String> {
    let tagged_file = Probe::open(path)
        .map_err(|e| e.to_string())?
        .read()
        .map_err(|e| e.to_string())?;

    let properties = tagged_file.properties();
    let sample_rate = properties
        .sample_rate()
        .filter(|rate| *rate > 0)
        .ok_or_else(|| "no sample rate in container".to_string())?;

    Ok(AudioMetadata {
        sample_rate,
        duration_seconds: properties.duration().as_secs_f64(),
        channels: properties.channels(),
    })
}

/// Read audio metadata, failing with `AudioMetadataUnreadable`
pub async fn read_audio_metadata(path: PathBuf) -> Result<AudioMetadata> {
    let file = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let probed = tokio::task::spawn_blocking(move || probe(&path))
        .await
        .map_err(|e| Error::AudioMetadataUnreadable {
            file: file.clone(),
            reason: e.to_string(),
        })?;

    probed.map_err(|reason| Error::AudioMetadataUnreadable { file, reason })
}
