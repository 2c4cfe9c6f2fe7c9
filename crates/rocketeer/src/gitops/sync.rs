//! Repository synchronizer: keeps one working copy per target at its ref.
//!
//! An existing working copy is reused only if it still points at the target
//! remote and branch and fast-forwards cleanly. Anything else gets the directory
//! deleted and cloned again.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use super::error::{GitOpsError, Result};
use super::git::parse::same_remote;
use super::git::{validate_ref, GitRepository};
use crate::config::GitSettings;
use crate::sanitize::{redact_repo_url, sanitize_segment};

/// Where one configuration is checked out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncTarget {
    pub url: String,
    pub git_ref: String,
    pub path: PathBuf,
}

impl SyncTarget {
    /// Builds the target of configuration `name` in `namespace`.
    ///
    /// Every configuration gets its own directory under `work_dir`.
    pub fn new(
        work_dir: &Path,
        namespace: &str,
        name: &str,
        url: impl Into<String>,
        git_ref: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            git_ref: git_ref.into(),
            path: work_dir
                .join(sanitize_segment(namespace))
                .join(sanitize_segment(name)),
        }
    }
}

/// How a sync brought the working copy up to date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncAction {
    /// No working copy existed.
    Cloned,
    /// New commits were fast-forwarded.
    Pulled,
    UpToDate,
    /// The working copy was unusable and has been replaced.
    Recloned,
}

/// A synced working copy. Holds the target lock until dropped.
#[derive(Debug)]
pub struct WorkingCopy {
    pub path: PathBuf,
    pub git_ref: String,
    /// HEAD commit after the sync.
    pub revision: String,
    pub action: SyncAction,
    _guard: OwnedMutexGuard<()>,
}

impl WorkingCopy {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Clones and pulls working copies, one sync at a time per target path.
pub struct RepositorySynchronizer {
    settings: GitSettings,
    locks: Mutex<HashMap<PathBuf, Arc<AsyncMutex<()>>>>,
}

impl RepositorySynchronizer {
    pub fn new(settings: GitSettings) -> Self {
        Self {
            settings,
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn lock_for(&self, path: &Path) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
        locks.entry(path.to_path_buf()).or_default().clone()
    }

    /// Brings the working copy of `target` up to date.
    ///
    /// The returned [`WorkingCopy`] keeps other syncs of the same target waiting
    /// until it is dropped.
    pub async fn sync(&self, target: &SyncTarget) -> Result<WorkingCopy> {
        validate_ref(&target.git_ref).map_err(|reason| GitOpsError::InvalidRef {
            git_ref: target.git_ref.clone(),
            reason,
        })?;

        let guard = self.lock_for(&target.path).lock_owned().await;

        let (repo, action) = match self.try_update(target).await {
            Some(result) => result,
            None => {
                let existed = target.path.exists();
                remove_working_copy(&target.path)?;
                let repo = GitRepository::clone_into(
                    &target.url,
                    &target.git_ref,
                    &target.path,
                    &self.settings,
                )
                .await?;
                let action = if existed {
                    SyncAction::Recloned
                } else {
                    SyncAction::Cloned
                };
                (repo, action)
            }
        };

        let revision = repo.head_revision()?;
        log::info!(
            "Synced {} ({}) at {}: {:?}",
            redact_repo_url(&target.url),
            target.git_ref,
            &revision[..revision.len().min(12)],
            action
        );

        Ok(WorkingCopy {
            path: target.path.clone(),
            git_ref: target.git_ref.clone(),
            revision,
            action,
            _guard: guard,
        })
    }

    /// Pulls an existing, matching working copy. `None` means clone from scratch.
    async fn try_update(&self, target: &SyncTarget) -> Option<(GitRepository, SyncAction)> {
        let repo = GitRepository::new(&target.path, self.settings.clone());
        if !repo.is_git_repo() {
            return None;
        }

        let info = match repo.checkout_info() {
            Ok(info) => info,
            Err(e) => {
                log::warn!("Working copy {} is unreadable: {}", target.path.display(), e);
                return None;
            }
        };
        let remote_matches = info
            .remote_url
            .as_deref()
            .is_some_and(|url| same_remote(url, &target.url));
        if !remote_matches || info.branch.as_deref() != Some(target.git_ref.as_str()) {
            log::warn!(
                "Working copy {} points at {} ({}), expected {} ({})",
                target.path.display(),
                info.remote_url
                    .as_deref()
                    .map(redact_repo_url)
                    .unwrap_or_else(|| "<no origin>".to_string()),
                info.branch.as_deref().unwrap_or("<detached>"),
                redact_repo_url(&target.url),
                target.git_ref
            );
            return None;
        }

        match repo.pull(&target.git_ref).await {
            Ok(result) if result.up_to_date => Some((repo, SyncAction::UpToDate)),
            Ok(_) => Some((repo, SyncAction::Pulled)),
            Err(e) => {
                log::warn!(
                    "Pull of {} failed, re-cloning: {}",
                    target.path.display(),
                    e
                );
                None
            }
        }
    }
}

fn remove_working_copy(path: &Path) -> Result<()> {
    let result = match std::fs::symlink_metadata(path) {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => Err(e),
        Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(path),
        Ok(_) => std::fs::remove_file(path),
    };
    result.map_err(|source| GitOpsError::WorkingCopy {
        path: path.to_path_buf(),
        source,
    })
}
