//! Configuration types: the `Configuration` trigger record and engine settings.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::gitops::error::GitOpsError;
use crate::gitops::reconciler::ApplyPolicy;
use crate::gitops::report::ReconcileReport;
use crate::gitops::resource::ObjectMeta;

/// API group of the `Configuration` custom resource.
pub const API_GROUP: &str = "app.rocketeer.io";

/// Full `apiVersion` of the `Configuration` custom resource.
pub const API_VERSION: &str = "app.rocketeer.io/v1alpha1";

/// Kind of the `Configuration` custom resource.
pub const CONFIGURATION_KIND: &str = "Configuration";

/// Folder holding descriptors when the spec does not name one.
pub const DEFAULT_DESCRIPTORS_FOLDER: &str = "k8s";

// ============================================================================
// Configuration custom resource
// ============================================================================

/// A `Configuration`: which repository and ref to reconcile into a namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    pub api_version: String,

    pub kind: String,

    pub metadata: ObjectMeta,

    pub spec: ConfigurationSpec,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ConfigurationStatus>,
}

impl Configuration {
    /// Creates a configuration in `namespace` with an empty status.
    pub fn new(name: impl Into<String>, namespace: impl Into<String>, spec: ConfigurationSpec) -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: CONFIGURATION_KIND.to_string(),
            metadata: ObjectMeta::new(name).in_namespace(namespace),
            spec,
            status: None,
        }
    }
}

/// Desired state of a `Configuration`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationSpec {
    /// Repository URL (https, ssh or local path).
    pub git_url: String,

    /// Branch to track.
    pub git_ref: String,

    /// Folder inside the repository holding descriptors. Defaults to `k8s`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub descriptors_folder: Option<String>,
}

impl ConfigurationSpec {
    pub fn new(git_url: impl Into<String>, git_ref: impl Into<String>) -> Self {
        Self {
            git_url: git_url.into(),
            git_ref: git_ref.into(),
            descriptors_folder: None,
        }
    }

    pub fn with_descriptors_folder(mut self, folder: impl Into<String>) -> Self {
        self.descriptors_folder = Some(folder.into());
        self
    }

    /// The descriptor folder, falling back to `k8s` when unset or blank.
    pub fn descriptors_folder(&self) -> &str {
        match self.descriptors_folder.as_deref().map(str::trim) {
            Some(folder) if !folder.is_empty() => folder,
            _ => DEFAULT_DESCRIPTORS_FOLDER,
        }
    }
}

/// Coarse state of the last reconciliation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigurationState {
    #[default]
    Pending,
    /// Every descriptor was applied or skipped.
    Synced,
    /// The pass completed but some descriptors failed.
    Degraded,
    /// The pass was aborted.
    Failed,
}

/// Observed state of a `Configuration`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationStatus {
    pub state: ConfigurationState,

    /// Commit the last pass reconciled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_time: Option<DateTime<Utc>>,

    #[serde(default)]
    pub created: usize,

    #[serde(default)]
    pub updated: usize,

    #[serde(default)]
    pub unchanged: usize,

    #[serde(default)]
    pub unrecognized: usize,

    #[serde(default)]
    pub failed: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ConfigurationStatus {
    /// Derives the status of a completed pass.
    pub fn from_report(report: &ReconcileReport) -> Self {
        let summary = report.summary();
        let (state, message) = if report.is_success() {
            (ConfigurationState::Synced, None)
        } else {
            let first = report
                .failures()
                .next()
                .map(|(file, err)| format!("{}: {}", file, err));
            (ConfigurationState::Degraded, first)
        };

        Self {
            state,
            revision: Some(report.revision.clone()),
            last_sync_time: Some(report.finished_at),
            created: summary.created,
            updated: summary.updated,
            unchanged: summary.unchanged,
            unrecognized: summary.unrecognized,
            failed: summary.failed,
            message,
        }
    }

    /// Derives the status of an aborted pass.
    pub fn from_error(error: &GitOpsError) -> Self {
        Self {
            state: ConfigurationState::Failed,
            last_sync_time: Some(Utc::now()),
            message: Some(error.to_string()),
            ..Default::default()
        }
    }
}

// ============================================================================
// Engine settings
// ============================================================================

/// Settings of the reconciliation engine itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineSettings {
    /// Root of all working copies.
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// Interval between scheduled passes.
    #[serde(default = "default_sync_interval_secs")]
    pub sync_interval_secs: u64,

    /// Bound on every store call.
    #[serde(default = "default_store_timeout_secs")]
    pub store_timeout_secs: u64,

    /// Descriptor files above this size are rejected.
    #[serde(default = "default_max_descriptor_bytes")]
    pub max_descriptor_bytes: u64,

    #[serde(default)]
    pub apply_policy: ApplyPolicy,

    #[serde(default)]
    pub git: GitSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            work_dir: default_work_dir(),
            sync_interval_secs: default_sync_interval_secs(),
            store_timeout_secs: default_store_timeout_secs(),
            max_descriptor_bytes: default_max_descriptor_bytes(),
            apply_policy: ApplyPolicy::default(),
            git: GitSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("./tmp")
}

fn default_sync_interval_secs() -> u64 {
    300 // 5 minutes
}

fn default_store_timeout_secs() -> u64 {
    30
}

fn default_max_descriptor_bytes() -> u64 {
    crate::gitops::loader::DEFAULT_MAX_DESCRIPTOR_BYTES
}

/// Git settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitSettings {
    /// Bound on clone and pull.
    #[serde(default = "default_git_timeout_secs")]
    pub timeout_secs: u64,

    /// Clone submodules along with the repository.
    #[serde(default = "default_true")]
    pub recurse_submodules: bool,

    /// Authentication settings.
    #[serde(default)]
    pub auth: GitAuthSettings,
}

impl Default for GitSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_git_timeout_secs(),
            recurse_submodules: true,
            auth: GitAuthSettings::default(),
        }
    }
}

fn default_git_timeout_secs() -> u64 {
    120
}

fn default_true() -> bool {
    true
}

/// Git authentication settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitAuthSettings {
    /// Authentication type: none, token, or ssh-key.
    #[serde(default, rename = "type")]
    pub auth_type: GitAuthType,

    /// Environment variable containing the token.
    #[serde(default)]
    pub token_env_var: String,

    /// Direct token value, stored in plaintext. Prefer `tokenEnvVar` or `tokenFile`.
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "token")]
    pub token_insecure: Option<String>,

    /// Path to a file containing the token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_file: Option<String>,

    /// Path to the SSH private key. Defaults to `~/.ssh/id_ed25519`.
    #[serde(default)]
    pub ssh_key_path: String,
}

/// Git authentication type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GitAuthType {
    #[default]
    None,
    Token,
    SshKey,
}

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingSettings {
    #[serde(default)]
    pub format: LogFormat,

    /// `EnvFilter` directives. `RUST_LOG` takes precedence.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            filter: default_log_filter(),
        }
    }
}

fn default_log_filter() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}
