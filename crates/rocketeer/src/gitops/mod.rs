//! GitOps reconciliation of descriptor folders.
//!
//! A pass syncs the repository of a configuration, reads every descriptor in its
//! folder, classifies it by kind and applies the recognized ones to a
//! [`ResourceStore`](crate::store::ResourceStore).

pub mod classifier;
pub mod diff;
pub mod engine;
pub mod error;
pub mod git;
pub mod loader;
pub mod reconciler;
pub mod report;
pub mod resource;
pub mod sync;
pub mod sync_scheduler;

pub use classifier::{classify, Classified, KindTag, ResourceIdentity};
pub use diff::FieldChange;
pub use engine::{GitOpsEngine, ReconcileRequest};
pub use error::{DescriptorError, GitOpsError, Result};
pub use git::GitRepository;
pub use loader::{Descriptor, DescriptorLoader};
pub use reconciler::{ApplyPolicy, KindHandler, ResourceReconciler, TypedHandler};
pub use report::{DescriptorReport, Outcome, ReconcileReport, ReportSummary};
pub use resource::{ManagedResource, Manifest, ObjectMeta, ResourceBody, ResourceKind};
pub use sync::{RepositorySynchronizer, SyncAction, SyncTarget, WorkingCopy};
pub use sync_scheduler::SyncScheduler;
