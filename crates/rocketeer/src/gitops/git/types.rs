//! Pure data types for git operations.

use serde::{Deserialize, Serialize};

/// Result of a git pull.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullResult {
    /// Whether the remote had nothing new.
    pub up_to_date: bool,
    /// Trimmed stdout of the pull.
    pub message: String,
    /// Number of files changed.
    pub files_changed: u32,
}

/// Where an existing working copy points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutInfo {
    /// URL of the `origin` remote, if configured.
    pub remote_url: Option<String>,
    /// Checked-out branch; `None` on a detached HEAD.
    pub branch: Option<String>,
}
