//! Repository layout
//!
//! Each project is a directory under the repositories root holding one
//! emuDB:
//!
//! ```text
//! <root>/<projectId>/Data/<db>_emuDB/
//!     <db>_DBconfig.json
//!     <session>_ses/<bundle>_bndl/<bundle>.wav
//!                                 <bundle>_annot.json
//!                                 <bundle>.<trackExtension>
//! ```

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Audio file extension of every bundle
pub const AUDIO_EXTENSION: &str = "wav";

/// Suffix of the annotation document file name
pub const ANNOTATION_SUFFIX: &str = "_annot.json";

/// Map a session display name to its directory name
///
/// Spaces become underscores and the result is lower-cased.
pub fn session_slug(session: &str) -> String {
    session.replace(' ', "_").to_lowercase()
}

/// Reject values that would escape their directory
pub fn validate_component<'a>(kind: &'static str, value: &'a str) -> Result<&'a str> {
    let bad = value.is_empty()
        || value == "."
        || value == ".."
        || value.contains(['/', '\\', '\0'])
        || value.contains("..");
    if bad {
        return Err(Error::InvalidName {
            kind,
            value: value.to_string(),
        });
    }
    Ok(value)
}

/// Path scheme of the repositories root
#[derive(Debug, Clone)]
pub struct RepositoryLayout {
    root: PathBuf,
    emu_db_name: String,
}

impl RepositoryLayout {
    pub fn new(root: impl Into<PathBuf>, emu_db_name: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            emu_db_name: emu_db_name.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Git working tree of a project
    pub fn project_dir(&self, project_id: &str) -> Result<PathBuf> {
        validate_component("project id", project_id)?;
        Ok(self.root.join(project_id))
    }

    pub fn emu_db_dir(&self, project_id: &str) -> Result<PathBuf> {
        Ok(self
            .project_dir(project_id)?
            .join("Data")
            .join(format!("{}_emuDB", self.emu_db_name)))
    }

    pub fn config_file_name(&self) -> String {
        format!("{}_DBconfig.json", self.emu_db_name)
    }

    pub fn config_path(&self, project_id: &str) -> Result<PathBuf> {
        Ok(self.emu_db_dir(project_id)?.join(self.config_file_name()))
    }

    /// Locate a bundle from its session display name and bundle name
    pub fn bundle(&self, project_id: &str, session: &str, bundle: &str) -> Result<BundleLocation> {
        let slug = session_slug(session);
        self.bundle_in_slug(project_id, &slug, bundle)
    }

    /// Locate a bundle from an already-slugged session directory name
    pub fn bundle_in_slug(
        &self,
        project_id: &str,
        session_slug: &str,
        bundle: &str,
    ) -> Result<BundleLocation> {
        validate_component("session name", session_slug)?;
        validate_component("bundle name", bundle)?;

        let dir = self
            .emu_db_dir(project_id)?
            .join(format!("{}_ses", session_slug))
            .join(format!("{}_bndl", bundle));

        Ok(BundleLocation {
            project_id: project_id.to_string(),
            session_slug: session_slug.to_string(),
            bundle: bundle.to_string(),
            dir,
        })
    }
}

/// Resolved location of one bundle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleLocation {
    pub project_id: String,
    pub session_slug: String,
    pub bundle: String,
    pub dir: PathBuf,
}

impl BundleLocation {
    pub fn audio_file_name(&self) -> String {
        format!("{}.{}", self.bundle, AUDIO_EXTENSION)
    }

    pub fn audio_path(&self) -> PathBuf {
        self.dir.join(self.audio_file_name())
    }

    pub fn annotation_file_name(&self) -> String {
        format!("{}{}", self.bundle, ANNOTATION_SUFFIX)
    }

    pub fn annotation_path(&self) -> PathBuf {
        self.dir.join(self.annotation_file_name())
    }

    pub fn track_file_name(&self, extension: &str) -> Result<String> {
        validate_component("track extension", extension)?;
        Ok(format!("{}.{}", self.bundle, extension))
    }

    pub fn track_path(&self, extension: &str) -> Result<PathBuf> {
        Ok(self.dir.join(self.track_file_name(extension)?))
    }

    /// Any file inside the bundle directory
    pub fn file_path(&self, file_name: &str) -> Result<PathBuf> {
        validate_component("file name", file_name)?;
        Ok(self.dir.join(file_name))
    }
}
