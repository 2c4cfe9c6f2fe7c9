//! Git repository operations.
//!
//! Local queries run the `git` binary synchronously. Clone and pull talk to the
//! network: they run on tokio, are bounded by `GitSettings::timeout_secs` and the
//! child is killed if the deadline passes.

use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::time::Duration;

use tokio::process::Command as TokioCommand;

use super::auth::build_auth_env;
use super::parse::{count_changed_files, format_git_error, is_up_to_date};
use super::types::{CheckoutInfo, PullResult};
use crate::config::GitSettings;
use crate::gitops::error::{classify_git_error, GitOpsError, Result};
use crate::sanitize::redact_repo_url;

/// A git working copy on disk.
pub struct GitRepository {
    repo_path: PathBuf,
    settings: GitSettings,
}

impl GitRepository {
    /// Creates a handle for an existing (or not yet existing) working copy.
    pub fn new(repo_path: impl Into<PathBuf>, settings: GitSettings) -> Self {
        Self {
            repo_path: repo_path.into(),
            settings,
        }
    }

    /// Clones `url` at branch `git_ref` into `target`, which must not exist yet.
    pub async fn clone_into(
        url: &str,
        git_ref: &str,
        target: &Path,
        settings: &GitSettings,
    ) -> Result<Self> {
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|e| GitOpsError::WorkingCopy {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let target_str = target.to_str().ok_or_else(|| {
            GitOpsError::GitOperation(format!(
                "Working copy path is not valid UTF-8: {}",
                target.display()
            ))
        })?;

        let mut args = vec!["clone", "--branch", git_ref, "--single-branch"];
        if settings.recurse_submodules {
            args.push("--recurse-submodules");
        }
        // `--` keeps a hostile URL from being read as an option.
        args.extend(["--", url, target_str]);

        log::info!(
            "Cloning {} (ref {}) into {}",
            redact_repo_url(url),
            git_ref,
            target.display()
        );

        let mut cmd = TokioCommand::new("git");
        cmd.args(&args);
        let output = run_network(cmd, settings).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_git_error(&stderr, git_ref));
        }

        Ok(Self::new(target, settings.clone()))
    }

    /// Checks if the directory is a git working copy.
    pub fn is_git_repo(&self) -> bool {
        self.repo_path.join(".git").exists()
    }

    /// Gets the checked-out branch, `None` on a detached HEAD.
    pub fn current_branch(&self) -> Result<Option<String>> {
        let output = self.run_checked(&["rev-parse", "--abbrev-ref", "HEAD"])?;
        let branch = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(Some(branch).filter(|b| !b.is_empty() && b != "HEAD"))
    }

    /// Gets the URL of `origin`, `None` if no such remote exists.
    pub fn remote_url(&self) -> Result<Option<String>> {
        let output = self.run_git(&["remote", "get-url", "origin"])?;
        if !output.status.success() {
            return Ok(None);
        }
        let url = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(Some(url).filter(|u| !u.is_empty()))
    }

    /// Reads where this working copy points.
    pub fn checkout_info(&self) -> Result<CheckoutInfo> {
        if !self.is_git_repo() {
            return Err(GitOpsError::GitNotInitialized);
        }
        Ok(CheckoutInfo {
            remote_url: self.remote_url()?,
            branch: self.current_branch()?,
        })
    }

    /// Gets the full HEAD commit hash.
    pub fn head_revision(&self) -> Result<String> {
        let output = self.run_checked(&["rev-parse", "HEAD"])?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Fast-forwards the working copy from `origin/<git_ref>`.
    pub async fn pull(&self, git_ref: &str) -> Result<PullResult> {
        if !self.is_git_repo() {
            return Err(GitOpsError::GitNotInitialized);
        }

        let mut cmd = TokioCommand::new("git");
        cmd.current_dir(&self.repo_path).args(["pull", "--ff-only"]);
        if self.settings.recurse_submodules {
            cmd.arg("--recurse-submodules");
        }
        cmd.args(["origin", git_ref]);
        let output = run_network(cmd, &self.settings).await?;

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_git_error(&stderr, git_ref));
        }

        let up_to_date = is_up_to_date(&stdout);
        Ok(PullResult {
            up_to_date,
            files_changed: if up_to_date {
                0
            } else {
                count_changed_files(&stdout)
            },
            message: stdout,
        })
    }

    // ========================================================================
    // Private helpers
    // ========================================================================

    /// Runs a git command in the working copy.
    fn run_git(&self, args: &[&str]) -> Result<Output> {
        Command::new("git")
            .current_dir(&self.repo_path)
            .args(args)
            .output()
            .map_err(|e| GitOpsError::GitOperation(e.to_string()))
    }

    /// Runs a git command and fails on a non-zero exit.
    fn run_checked(&self, args: &[&str]) -> Result<Output> {
        let output = self.run_git(args)?;
        if output.status.success() {
            Ok(output)
        } else {
            Err(GitOpsError::GitOperation(format_git_error(&output)))
        }
    }
}

/// Runs a network git command with credentials and a deadline.
async fn run_network(mut cmd: TokioCommand, settings: &GitSettings) -> Result<Output> {
    let auth = build_auth_env(&settings.auth)?;
    for (key, value) in &auth.env_vars {
        cmd.env(key, value);
    }
    cmd.env("GIT_TERMINAL_PROMPT", "0")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = cmd
        .spawn()
        .map_err(|e| GitOpsError::GitOperation(format!("Failed to spawn git: {}", e)))?;

    let deadline = Duration::from_secs(settings.timeout_secs);
    let output = match tokio::time::timeout(deadline, child.wait_with_output()).await {
        Ok(result) => result.map_err(|e| GitOpsError::GitOperation(e.to_string()))?,
        Err(_) => {
            log::warn!("git timed out after {}s", settings.timeout_secs);
            return Err(GitOpsError::GitTimeout(settings.timeout_secs));
        }
    };

    // The askpass script must outlive the child.
    drop(auth);
    Ok(output)
}
