//! Resource store abstraction.
//!
//! The engine never talks to a cluster directly. It reads and writes resources
//! through a [`ResourceStore`], keyed by `(kind, namespace, name)`. Implementations
//! use optimistic concurrency: an update must carry the `resourceVersion` it read.

pub mod memory;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::gitops::resource::{ManagedResource, ResourceKind};

pub use memory::{MemoryStore, StoreCall};

/// Errors returned by a [`ResourceStore`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("{kind} '{namespace}/{name}' already exists")]
    AlreadyExists {
        kind: ResourceKind,
        namespace: String,
        name: String,
    },

    #[error("{kind} '{namespace}/{name}' not found")]
    NotFound {
        kind: ResourceKind,
        namespace: String,
        name: String,
    },

    #[error("Conflict on {kind} '{name}': expected version {expected:?}, stored version is {actual}")]
    Conflict {
        kind: ResourceKind,
        name: String,
        expected: Option<String>,
        actual: String,
    },

    #[error("Store returned a {actual} when a {expected} was requested")]
    KindMismatch {
        expected: ResourceKind,
        actual: ResourceKind,
    },

    #[error("Store call timed out after {0}s")]
    Timeout(u64),

    #[error("Store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Returns true if the call may succeed when retried on the next pass.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StoreError::Conflict { .. } | StoreError::Timeout(_) | StoreError::Backend(_)
        )
    }
}

/// The store operation a call performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreOp {
    Get,
    Create,
    Update,
}

impl std::fmt::Display for StoreOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreOp::Get => write!(f, "get"),
            StoreOp::Create => write!(f, "create"),
            StoreOp::Update => write!(f, "update"),
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Live resource store, per kind get/create/update.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Fetches a resource. `Ok(None)` means it does not exist.
    async fn get(
        &self,
        kind: ResourceKind,
        name: &str,
        namespace: &str,
    ) -> Result<Option<ManagedResource>>;

    /// Creates a resource and returns it as stored.
    async fn create(&self, resource: &ManagedResource) -> Result<ManagedResource>;

    /// Overwrites a resource and returns it as stored.
    ///
    /// `resource.metadata.resourceVersion` must match the stored version.
    async fn update(&self, resource: &ManagedResource) -> Result<ManagedResource>;
}
