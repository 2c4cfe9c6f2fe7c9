//! Test harness for isolated engine runs.
//!
//! Every harness owns a temp directory holding:
//! - `remote/`, a git repository on branch `main` standing in for the remote
//! - `work/`, the engine's working-copy root
//!
//! plus a fresh [`MemoryStore`]. No network access is needed.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use tempfile::TempDir;

use rocketeer::config::{ConfigurationSpec, EngineSettings, GitSettings};
use rocketeer::gitops::{ApplyPolicy, GitOpsEngine, ReconcileRequest};
use rocketeer::store::MemoryStore;

/// Runs git in `dir`, panicking with stderr on failure.
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .current_dir(dir)
        .args(args)
        .output()
        .expect("Failed to run git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Creates a repository with one commit on `main`.
pub fn init_remote(dir: &Path) {
    std::fs::create_dir_all(dir).expect("Failed to create remote dir");
    git(dir, &["init", "--initial-branch=main"]);
    git(dir, &["config", "user.email", "test@test.com"]);
    git(dir, &["config", "user.name", "Test"]);
    std::fs::write(dir.join("README.md"), "# deploy\n").expect("Failed to write README");
    git(dir, &["add", "."]);
    git(dir, &["commit", "-m", "initial"]);
}

/// Isolated environment: remote repository, work dir and store.
pub struct TestHarness {
    temp_dir: TempDir,
    /// The repository the engine clones from.
    pub remote_dir: PathBuf,
    /// Root of the engine's working copies.
    pub work_dir: PathBuf,
    pub store: Arc<MemoryStore>,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let remote_dir = temp_dir.path().join("remote");
        let work_dir = temp_dir.path().join("work");
        init_remote(&remote_dir);

        Self {
            temp_dir,
            remote_dir,
            work_dir,
            store: Arc::new(MemoryStore::new()),
        }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// URL of the remote, as a local path.
    pub fn url(&self) -> String {
        self.remote_dir.display().to_string()
    }

    /// Writes a file into the remote's work tree (not committed).
    pub fn write(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.remote_dir.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create descriptor dir");
        }
        std::fs::write(&path, content).expect("Failed to write descriptor");
        path
    }

    pub fn remove(&self, relative: &str) {
        std::fs::remove_file(self.remote_dir.join(relative)).expect("Failed to remove file");
    }

    /// Commits everything in the remote and returns the new HEAD.
    pub fn commit(&self, message: &str) -> String {
        git(&self.remote_dir, &["add", "-A"]);
        git(&self.remote_dir, &["commit", "-m", message]);
        self.head()
    }

    pub fn head(&self) -> String {
        git(&self.remote_dir, &["rev-parse", "HEAD"])
    }

    /// Writes and commits one descriptor.
    pub fn commit_descriptor(&self, relative: &str, content: &str) -> String {
        self.write(relative, content);
        self.commit(&format!("add {}", relative))
    }

    pub fn settings(&self, policy: ApplyPolicy) -> EngineSettings {
        EngineSettings {
            work_dir: self.work_dir.clone(),
            store_timeout_secs: 5,
            apply_policy: policy,
            git: GitSettings {
                timeout_secs: 30,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn engine(&self, policy: ApplyPolicy) -> GitOpsEngine {
        GitOpsEngine::new(self.settings(policy), self.store.clone())
    }

    /// A spec pointing at the remote's `main` and the `k8s` folder.
    pub fn spec(&self) -> ConfigurationSpec {
        ConfigurationSpec::new(self.url(), "main").with_descriptors_folder("k8s")
    }

    pub fn request(namespace: &str, name: &str) -> ReconcileRequest {
        ReconcileRequest::new(namespace, name)
    }

    /// Where the engine checks out `name` in `namespace`.
    pub fn working_copy(&self, namespace: &str, name: &str) -> PathBuf {
        self.work_dir.join(namespace).join(name)
    }
}
