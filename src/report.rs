//! Run report — the serializable summary handed back to the caller

use crate::model::{EdgeStatus, ValidationFinding};
use crate::provider::CostEstimate;
use crate::store::CommitResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Terminal status of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunStatus {
    /// All stages ran and validation left no blocking findings
    Success,
    /// All stages ran but unresolved findings need review
    CompletedWithFindings,
    /// A stage aborted the run
    Failed,
    /// Nothing executed; the report carries only estimates
    DryRun,
}

/// One line per executed stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageSummary {
    pub name: String,
    pub output: String,
}

/// Per-status edge counts after validation.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EdgeCounts {
    pub accepted: usize,
    pub needs_review: usize,
    pub rejected: usize,
}

impl EdgeCounts {
    pub fn tally(statuses: impl Iterator<Item = EdgeStatus>) -> Self {
        let mut counts = Self::default();
        for status in statuses {
            match status {
                EdgeStatus::Accepted => counts.accepted += 1,
                EdgeStatus::NeedsReview => counts.needs_review += 1,
                EdgeStatus::Rejected => counts.rejected += 1,
            }
        }
        counts
    }
}

/// The full account of a run: what executed, what it produced, what it
/// cost. Serialized as JSON for the `--report` flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub stages: Vec<StageSummary>,
    pub edges: EdgeCounts,
    pub findings: Vec<ValidationFinding>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit: Option<CommitResult>,
    pub usage: BTreeMap<String, CostEstimate>,
    pub total_cost: f64,
    /// Populated in dry-run mode instead of execution results.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimate: Option<CostEstimate>,
}

impl RunReport {
    pub fn new(run_id: Uuid, status: RunStatus) -> Self {
        Self {
            run_id,
            status,
            failed_stage: None,
            error: None,
            stages: Vec::new(),
            edges: EdgeCounts::default(),
            findings: Vec::new(),
            commit: None,
            usage: BTreeMap::new(),
            total_cost: 0.0,
            estimate: None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, RunStatus::Success | RunStatus::DryRun)
    }
}
