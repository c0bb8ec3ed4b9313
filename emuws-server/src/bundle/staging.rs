//! Staging saved files in the project's git repository
//!
//! Each project directory is a git working tree. Saved bundle files are
//! added to its index so the next commit (made outside this server) picks
//! them up, attributed to the editor who saved them. Nothing is ever
//! committed, reset or read back from here.

use emuws_common::db::Identity;
use git2::{ConfigLevel, Repository};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::locks::KeyedLocks;

/// Adds written files to a project repository's index
///
/// Staging is a read-modify-write of `.git/index`, so it is serialized per
/// repository.
pub struct GitStager {
    enabled: bool,
    repo_locks: KeyedLocks<PathBuf>,
}

impl GitStager {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            repo_locks: KeyedLocks::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Stage `files` (absolute paths inside `repo_dir`) on behalf of `author`
    ///
    /// The author's name and email go into the repository's local config.
    /// Failures are logged and swallowed. Returns how many files were
    /// staged.
    pub async fn stage(
        &self,
        author: &Identity,
        repo_dir: PathBuf,
        files: Vec<PathBuf>,
    ) -> usize {
        if !self.enabled || files.is_empty() {
            return 0;
        }

        let _guard = self.repo_locks.lock(repo_dir.clone()).await;

        let dir = repo_dir.clone();
        let name = author.display_name();
        let email = author.email.clone();
        let staged =
            tokio::task::spawn_blocking(move || stage_blocking(&dir, &name, &email, &files));
        match staged.await {
            Ok(Ok(count)) => {
                debug!("Staged {} file(s) in {}", count, repo_dir.display());
                count
            }
            Ok(Err(e)) => {
                warn!("Could not stage files in {}: {}", repo_dir.display(), e);
                0
            }
            Err(e) => {
                warn!("Staging task failed for {}: {}", repo_dir.display(), e);
                0
            }
        }
    }
}

fn stage_blocking(
    repo_dir: &Path,
    name: &str,
    email: &str,
    files: &[PathBuf],
) -> Result<usize, git2::Error> {
    let repo = Repository::open(repo_dir)?;

    let mut config = repo.config()?.open_level(ConfigLevel::Local)?;
    config.set_str("user.name", name)?;
    if !email.is_empty() {
        config.set_str("user.email", email)?;
    }

    let mut index = repo.index()?;

    let mut staged = 0;
    for file in files {
        let relative = file.strip_prefix(repo_dir).map_err(|_| {
            git2::Error::from_str(&format!("{} is outside the repository", file.display()))
        })?;
        index.add_path(relative)?;
        staged += 1;
    }

    index.write()?;
    Ok(staged)
}
