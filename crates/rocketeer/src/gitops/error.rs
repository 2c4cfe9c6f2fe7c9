//! GitOps-specific error types.

use std::path::PathBuf;
use thiserror::Error;

pub use crate::store::StoreOp;
use crate::store::StoreError;

/// Errors that abort a whole reconciliation pass.
#[derive(Error, Debug)]
pub enum GitOpsError {
    #[error("Git operation failed: {0}")]
    GitOperation(String),

    #[error("Git network error: {0}")]
    GitNetworkError(String),

    #[error("Git operation timed out after {0}s")]
    GitTimeout(u64),

    #[error("Git authentication failed: {0}")]
    GitAuthFailed(String),

    #[error("Git ref '{0}' not found on remote")]
    GitRefNotFound(String),

    #[error("Git repository not initialized")]
    GitNotInitialized,

    #[error("Invalid git ref '{git_ref}': {reason}")]
    InvalidRef { git_ref: String, reason: String },

    #[error("Failed to list descriptor folder '{path}': {source}")]
    ListDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to reset working copy '{path}': {source}")]
    WorkingCopy {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Path traversal detected: {0}")]
    PathTraversal(String),
}

impl GitOpsError {
    /// Returns true if the error is likely transient and the operation can be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GitOpsError::GitNetworkError(_) | GitOpsError::GitTimeout(_)
        )
    }
}

/// Classifies a git stderr string into a more specific error variant.
///
/// `git_ref` is used to recognise "remote branch not found" output from clone.
pub fn classify_git_error(stderr: &str, git_ref: &str) -> GitOpsError {
    let lower = stderr.to_lowercase();

    if lower.contains("could not resolve host")
        || lower.contains("connection refused")
        || lower.contains("connection timed out")
        || lower.contains("network is unreachable")
        || lower.contains("unable to access")
        || lower.contains("failed to connect")
        || lower.contains("couldn't connect to server")
        || lower.contains("the remote end hung up unexpectedly")
    {
        return GitOpsError::GitNetworkError(stderr.trim().to_string());
    }

    if lower.contains("authentication failed")
        || lower.contains("permission denied")
        || lower.contains("invalid credentials")
        || lower.contains("could not read username")
    {
        return GitOpsError::GitAuthFailed(stderr.trim().to_string());
    }

    if (lower.contains("remote branch") && lower.contains("not found"))
        || lower.contains("couldn't find remote ref")
    {
        return GitOpsError::GitRefNotFound(git_ref.to_string());
    }

    GitOpsError::GitOperation(stderr.trim().to_string())
}

/// Errors scoped to a single descriptor. They are collected, never fatal.
#[derive(Error, Debug)]
pub enum DescriptorError {
    #[error("Failed to read descriptor '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Descriptor '{path}' is {size} bytes, limit is {limit}")]
    TooLarge { path: PathBuf, size: u64, limit: u64 },

    #[error("Invalid descriptor envelope: {0}")]
    Envelope(String),

    #[error("Failed to decode {kind}: {message}")]
    Decode { kind: String, message: String },

    #[error("Store {op} of {kind}/{name} failed: {source}")]
    Store {
        op: StoreOp,
        kind: String,
        name: String,
        #[source]
        source: StoreError,
    },
}

impl DescriptorError {
    /// Returns true if retrying the same descriptor later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            DescriptorError::Store { source, .. } => source.is_retryable(),
            DescriptorError::Read { .. } => true,
            _ => false,
        }
    }
}

/// Result type for GitOps operations.
pub type Result<T> = std::result::Result<T, GitOpsError>;
