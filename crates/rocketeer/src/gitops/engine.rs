//! One reconciliation pass: sync → load → classify → reconcile.

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, warn, Instrument};

use super::classifier::{classify, KindTag};
use super::error::{DescriptorError, GitOpsError, Result};
use super::loader::DescriptorLoader;
use super::reconciler::ResourceReconciler;
use super::report::{DescriptorReport, Outcome, ReconcileReport};
use super::sync::{RepositorySynchronizer, SyncTarget};
use crate::config::{Configuration, ConfigurationSpec, ConfigurationStatus, EngineSettings};
use crate::sanitize::{redact_path, redact_repo_url};
use crate::store::ResourceStore;

/// Namespace used for a `Configuration` that does not name one.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Which configuration to reconcile, and into which namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReconcileRequest {
    pub namespace: String,
    pub name: String,
}

impl ReconcileRequest {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn for_configuration(config: &Configuration) -> Self {
        Self::new(
            config
                .metadata
                .namespace
                .as_deref()
                .filter(|ns| !ns.is_empty())
                .unwrap_or(DEFAULT_NAMESPACE),
            config.metadata.name.as_str(),
        )
    }
}

impl fmt::Display for ReconcileRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Reconciles descriptor folders from git into a resource store.
pub struct GitOpsEngine {
    settings: EngineSettings,
    synchronizer: RepositorySynchronizer,
    loader: DescriptorLoader,
    reconciler: ResourceReconciler,
}

impl GitOpsEngine {
    pub fn new(settings: EngineSettings, store: Arc<dyn ResourceStore>) -> Self {
        let reconciler = ResourceReconciler::new(
            store,
            settings.apply_policy,
            Duration::from_secs(settings.store_timeout_secs),
        );
        Self {
            synchronizer: RepositorySynchronizer::new(settings.git.clone()),
            loader: DescriptorLoader::new(settings.max_descriptor_bytes),
            reconciler,
            settings,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Runs one pass for `request`.
    ///
    /// Fails only if the repository cannot be synced or the descriptor folder
    /// cannot be listed. Per-descriptor failures are collected in the report.
    ///
    /// A missing or unreadable folder is deliberately fatal
    /// ([`GitOpsError::ListDirectory`]) instead of yielding an empty report.
    pub async fn reconcile(
        &self,
        request: &ReconcileRequest,
        spec: &ConfigurationSpec,
    ) -> Result<ReconcileReport> {
        let span = info_span!(
            "reconcile",
            namespace = %request.namespace,
            name = %request.name,
            url = %redact_repo_url(&spec.git_url),
            git_ref = %spec.git_ref,
        );
        self.run(request, spec).instrument(span).await
    }

    /// Runs one pass for a `Configuration` and derives its status.
    pub async fn reconcile_configuration(&self, config: &Configuration) -> ConfigurationStatus {
        let request = ReconcileRequest::for_configuration(config);
        match self.reconcile(&request, &config.spec).await {
            Ok(report) => ConfigurationStatus::from_report(&report),
            Err(e) => ConfigurationStatus::from_error(&e),
        }
    }

    async fn run(&self, request: &ReconcileRequest, spec: &ConfigurationSpec) -> Result<ReconcileReport> {
        let started_at = Utc::now();
        let folder = relative_folder(spec.descriptors_folder())?;

        let target = SyncTarget::new(
            &self.settings.work_dir,
            &request.namespace,
            &request.name,
            spec.git_url.as_str(),
            spec.git_ref.as_str(),
        );
        let copy = self.synchronizer.sync(&target).await?;

        let folder_path = copy.path().join(&folder);
        ensure_inside(copy.path(), &folder_path)?;

        let mut descriptors = Vec::new();
        for loaded in self.loader.load(&folder_path)? {
            let report = match loaded {
                Ok(descriptor) => {
                    self.reconcile_descriptor(&request.namespace, descriptor.file_name, &descriptor.payload)
                        .await
                }
                Err(e) => DescriptorReport {
                    file: file_of(&e),
                    identity: None,
                    outcome: Outcome::Failed(e),
                },
            };
            match &report.outcome {
                Outcome::Failed(e) => warn!(file = %report.file, "{}", e),
                outcome => debug!(file = %report.file, outcome = %outcome),
            }
            descriptors.push(report);
        }

        let report = ReconcileReport {
            namespace: request.namespace.clone(),
            name: request.name.clone(),
            revision: copy.revision.clone(),
            started_at,
            finished_at: Utc::now(),
            descriptors,
        };
        drop(copy);

        let summary = report.summary();
        info!(
            revision = %report.revision,
            total = summary.total,
            created = summary.created,
            updated = summary.updated,
            unchanged = summary.unchanged,
            unrecognized = summary.unrecognized,
            failed = summary.failed,
            "reconcile finished"
        );
        Ok(report)
    }

    async fn reconcile_descriptor(
        &self,
        namespace: &str,
        file: String,
        payload: &[u8],
    ) -> DescriptorReport {
        let classified = match classify(payload) {
            Ok(classified) => classified,
            Err(e) => {
                return DescriptorReport {
                    file,
                    identity: None,
                    outcome: Outcome::Failed(e),
                }
            }
        };

        let identity = classified.identity.scoped_to(namespace);
        let outcome = match &identity.kind {
            KindTag::Known(kind) => self.reconciler.reconcile(*kind, namespace, payload).await,
            KindTag::Other(tag) => {
                info!(file = %file, kind = %tag, "ignoring descriptor of unmanaged kind");
                Outcome::Unrecognized { kind: tag.clone() }
            }
        };

        DescriptorReport {
            file,
            identity: Some(identity),
            outcome,
        }
    }
}

/// Validates the descriptor folder as a plain relative path.
fn relative_folder(folder: &str) -> Result<PathBuf> {
    let path = Path::new(folder);
    let plain = path
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if !plain {
        return Err(GitOpsError::PathTraversal(format!(
            "descriptor folder '{}' leaves the repository",
            folder
        )));
    }
    Ok(path.to_path_buf())
}

/// Rejects a folder that resolves outside the working copy, e.g. through a symlink.
fn ensure_inside(root: &Path, folder: &Path) -> Result<()> {
    let (Ok(root), Ok(resolved)) = (root.canonicalize(), folder.canonicalize()) else {
        // A missing folder is reported by the loader.
        return Ok(());
    };
    if resolved.starts_with(&root) {
        Ok(())
    } else {
        Err(GitOpsError::PathTraversal(format!(
            "descriptor folder '{}' resolves outside the repository",
            redact_path(folder)
        )))
    }
}

fn file_of(error: &DescriptorError) -> String {
    match error {
        DescriptorError::Read { path, .. } | DescriptorError::TooLarge { path, .. } => {
            redact_path(path)
        }
        _ => "<unknown>".to_string(),
    }
}
