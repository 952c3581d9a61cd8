//! Stage contract and the artifacts that flow between stages

use super::context::RunContext;
use crate::catalog::NodeCatalog;
use crate::merge::MergeOutcome;
use crate::model::{Proposal, SchemaError};
use crate::provider::{CostEstimate, ProviderError};
use crate::store::{CommitResult, StorageError};
use crate::validate::ValidationOutcome;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// The artifact a stage consumes and produces.
///
/// Serializable so the controller can checkpoint it after each stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "data")]
pub enum StageData {
    /// Input to the first stage
    Empty,
    Proposals(Vec<Proposal>),
    Merged(MergeOutcome),
    Validated(ValidationOutcome),
    Committed(CommitResult),
}

impl StageData {
    /// Short description for logs and summaries.
    pub fn describe(&self) -> String {
        match self {
            Self::Empty => "empty".to_string(),
            Self::Proposals(p) => format!("{} proposals", p.len()),
            Self::Merged(m) => format!("{} edges, {} rejected", m.edges.len(), m.rejected.len()),
            Self::Validated(v) => {
                format!("{} edges, {} findings", v.clean.len(), v.findings.len())
            }
            Self::Committed(c) => format!("{} inserted, {} updated", c.inserted, c.updated),
        }
    }
}

/// Errors that abort a stage (and with it, the run).
#[derive(Debug, Error)]
pub enum StageError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("stage received unexpected input: expected {expected}, got {got}")]
    UnexpectedInput {
        expected: &'static str,
        got: String,
    },
}

impl StageError {
    pub fn unexpected_input(expected: &'static str, got: &StageData) -> Self {
        Self::UnexpectedInput {
            expected,
            got: got.describe(),
        }
    }
}

/// The contract pipeline stages implement.
///
/// A stage consumes the prior stage's artifact plus the node catalog,
/// and is expected to be idempotent at pipeline position: re-running
/// with the same inputs reproduces an equivalent output (provider
/// responses are non-deterministic, so equivalence is structural, not
/// byte-level).
#[async_trait]
pub trait Stage: Send + Sync {
    /// Stage name, unique within a pipeline (used for checkpoints and
    /// resume).
    fn name(&self) -> &str;

    /// Estimated provider-call volume and cost, for dry-run mode.
    fn estimate(&self, catalog: &NodeCatalog) -> CostEstimate {
        let _ = catalog;
        CostEstimate::default()
    }

    /// Run the stage.
    async fn execute(
        &self,
        input: StageData,
        catalog: &NodeCatalog,
        ctx: Arc<RunContext>,
    ) -> Result<StageData, StageError>;
}
