//! File-backed provider — replays a saved payload file
//!
//! Lets a run consume previously captured provider output (or
//! hand-curated judgments) without network access. The whole file is a
//! single payload in the standard shape; every `propose` call filters
//! it down to the pairs in the batch.

use super::parse::parse_payload;
use super::traits::{CostEstimate, InferenceProvider, ProviderError, StandardPair, TaskSpec};
use crate::catalog::NodeCatalog;
use crate::model::Proposal;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

pub struct PayloadFileProvider {
    id: String,
    weight: f64,
    proposals: Vec<Proposal>,
}

impl PayloadFileProvider {
    /// Load and parse the payload file eagerly, so a bad file fails the
    /// run at construction rather than mid-pipeline.
    pub fn load(
        id: impl Into<String>,
        weight: f64,
        path: impl AsRef<Path>,
        catalog: &Arc<NodeCatalog>,
    ) -> Result<Self, ProviderError> {
        let id = id.into();
        let raw = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ProviderError::Permanent(format!(
                "provider '{}': cannot read payload file {}: {}",
                id,
                path.as_ref().display(),
                e
            ))
        })?;
        let payload: serde_json::Value = serde_json::from_str(&raw)
            .map_err(|e| ProviderError::Payload(format!("provider '{}': {}", id, e)))?;
        let proposals = parse_payload(&id, weight, &payload, catalog)?;
        Ok(Self {
            id,
            weight,
            proposals,
        })
    }
}

#[async_trait]
impl InferenceProvider for PayloadFileProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn estimate_cost(&self, _batch_len: usize) -> CostEstimate {
        // Replaying a file costs nothing.
        CostEstimate { calls: 1, cost: 0.0 }
    }

    async fn propose(
        &self,
        batch: &[StandardPair],
        _task: &TaskSpec,
    ) -> Result<Vec<Proposal>, ProviderError> {
        let codes: BTreeSet<&str> = batch
            .iter()
            .flat_map(|p| [p.a.code.as_str(), p.b.code.as_str()])
            .collect();
        Ok(self
            .proposals
            .iter()
            .filter(|p| codes.contains(p.source.as_str()) && codes.contains(p.target.as_str()))
            .cloned()
            .collect())
    }
}
