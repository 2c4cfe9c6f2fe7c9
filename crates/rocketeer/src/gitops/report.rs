//! Per-descriptor outcomes of a reconciliation pass.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::classifier::ResourceIdentity;
use super::error::DescriptorError;

/// What happened to one descriptor.
#[derive(Debug)]
pub enum Outcome {
    Created,
    Updated,
    /// The stored resource already matched the descriptor.
    SkippedNoOp,
    /// The kind is not managed; the descriptor was ignored.
    Unrecognized { kind: String },
    Failed(DescriptorError),
}

impl Outcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }

    /// Short machine-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Created => "created",
            Outcome::Updated => "updated",
            Outcome::SkippedNoOp => "unchanged",
            Outcome::Unrecognized { .. } => "unrecognized",
            Outcome::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Unrecognized { kind } => write!(f, "unrecognized kind '{}'", kind),
            Outcome::Failed(e) => write!(f, "failed: {}", e),
            other => f.write_str(other.label()),
        }
    }
}

/// The outcome of one descriptor file.
#[derive(Debug)]
pub struct DescriptorReport {
    /// File name inside the descriptor folder.
    pub file: String,
    /// `None` when the file could not be read or classified.
    pub identity: Option<ResourceIdentity>,
    pub outcome: Outcome,
}

/// Counts per outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub total: usize,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub unrecognized: usize,
    pub failed: usize,
}

/// Result of one reconciliation pass over a descriptor folder.
#[derive(Debug)]
pub struct ReconcileReport {
    pub namespace: String,
    pub name: String,
    /// HEAD commit of the working copy the pass read.
    pub revision: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// One entry per descriptor, in file-name order.
    pub descriptors: Vec<DescriptorReport>,
}

impl ReconcileReport {
    pub fn summary(&self) -> ReportSummary {
        self.descriptors
            .iter()
            .fold(ReportSummary::default(), |mut summary, report| {
                summary.total += 1;
                match report.outcome {
                    Outcome::Created => summary.created += 1,
                    Outcome::Updated => summary.updated += 1,
                    Outcome::SkippedNoOp => summary.unchanged += 1,
                    Outcome::Unrecognized { .. } => summary.unrecognized += 1,
                    Outcome::Failed(_) => summary.failed += 1,
                }
                summary
            })
    }

    /// True when no descriptor failed. Unrecognized kinds do not count as failures.
    pub fn is_success(&self) -> bool {
        !self.descriptors.iter().any(|d| d.outcome.is_failure())
    }

    /// Failed descriptors with their errors.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &DescriptorError)> {
        self.descriptors.iter().filter_map(|d| match &d.outcome {
            Outcome::Failed(e) => Some((d.file.as_str(), e)),
            _ => None,
        })
    }

    /// Whether any failure is worth retrying soon.
    pub fn has_retryable_failures(&self) -> bool {
        self.failures().any(|(_, e)| e.is_retryable())
    }
}
