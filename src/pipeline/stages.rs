//! The five concrete pipeline stages
//!
//! candidates -> inference -> merge -> validate -> persist

use super::context::RunContext;
use super::stage::{Stage, StageData, StageError};
use crate::catalog::NodeCatalog;
use crate::merge::{self, MergeConfig};
use crate::model::Proposal;
use crate::provider::{CostEstimate, InferenceProvider, StandardPair, TaskSpec};
use crate::rules;
use crate::store::EdgeStore;
use crate::validate;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

pub const STAGE_CANDIDATES: &str = "candidates";
pub const STAGE_INFERENCE: &str = "inference";
pub const STAGE_MERGE: &str = "merge";
pub const STAGE_VALIDATE: &str = "validate";
pub const STAGE_PERSIST: &str = "persist";

/// Stage 1: deterministic rule-based candidates from catalog structure.
pub struct CandidateStage;

#[async_trait]
impl Stage for CandidateStage {
    fn name(&self) -> &str {
        STAGE_CANDIDATES
    }

    async fn execute(
        &self,
        input: StageData,
        catalog: &NodeCatalog,
        _ctx: Arc<RunContext>,
    ) -> Result<StageData, StageError> {
        if !matches!(input, StageData::Empty) {
            return Err(StageError::unexpected_input("empty", &input));
        }
        let proposals = rules::generate(catalog);
        info!(count = proposals.len(), "rule candidates generated");
        Ok(StageData::Proposals(proposals))
    }
}

/// Stage 2: fan pair batches out to the configured providers.
///
/// Provider calls run concurrently, bounded by the run semaphore. A
/// cost-limit breach cancels the remaining batches but keeps proposals
/// already returned.
pub struct InferenceStage {
    providers: Vec<Arc<dyn InferenceProvider>>,
    task: TaskSpec,
    batch_size: usize,
}

impl InferenceStage {
    pub fn new(providers: Vec<Arc<dyn InferenceProvider>>, task: TaskSpec, batch_size: usize) -> Self {
        Self {
            providers,
            task,
            batch_size: batch_size.max(1),
        }
    }

    /// Pairs worth submitting for judgment: every same-domain pair, plus
    /// cross-domain pairs that share a content group (bridge candidates).
    /// Deterministic order, so batch indices are stable across runs.
    pub fn candidate_pairs(catalog: &NodeCatalog) -> Vec<StandardPair> {
        let standards: Vec<_> = catalog.iter().collect();
        let mut pairs = Vec::new();
        for (i, a) in standards.iter().enumerate() {
            for b in &standards[i + 1..] {
                let same_domain = a.domain == b.domain;
                let shared_group = match (&a.content_group, &b.content_group) {
                    (Some(ga), Some(gb)) => ga == gb,
                    _ => false,
                };
                if same_domain || shared_group {
                    pairs.push(StandardPair::new((*a).clone(), (*b).clone()));
                }
            }
        }
        pairs
    }

    fn batches(pairs: &[StandardPair], batch_size: usize) -> Vec<Vec<StandardPair>> {
        pairs.chunks(batch_size).map(|c| c.to_vec()).collect()
    }
}

#[async_trait]
impl Stage for InferenceStage {
    fn name(&self) -> &str {
        STAGE_INFERENCE
    }

    fn estimate(&self, catalog: &NodeCatalog) -> CostEstimate {
        let pairs = Self::candidate_pairs(catalog);
        let mut total = CostEstimate::default();
        for batch in Self::batches(&pairs, self.batch_size) {
            for provider in &self.providers {
                total.add(provider.estimate_cost(batch.len()));
            }
        }
        total
    }

    async fn execute(
        &self,
        input: StageData,
        catalog: &NodeCatalog,
        ctx: Arc<RunContext>,
    ) -> Result<StageData, StageError> {
        let mut proposals = match input {
            StageData::Proposals(p) => p,
            other => return Err(StageError::unexpected_input("proposals", &other)),
        };

        let pairs = Self::candidate_pairs(catalog);
        let batches = Self::batches(&pairs, self.batch_size);
        info!(
            pairs = pairs.len(),
            batches = batches.len(),
            providers = self.providers.len(),
            "dispatching inference batches"
        );

        let mut join_set: JoinSet<Result<Vec<Proposal>, StageError>> = JoinSet::new();
        for provider in &self.providers {
            for (batch_idx, batch) in batches.iter().enumerate() {
                let provider = Arc::clone(provider);
                let batch = batch.clone();
                let task = self.task.clone();
                let ctx = Arc::clone(&ctx);
                join_set.spawn(async move {
                    let cache_key = format!("{}:{}", provider.id(), batch_idx);
                    if let Some(hit) = ctx.cached(&cache_key) {
                        debug!(key = %cache_key, "inference cache hit");
                        return Ok(hit);
                    }

                    let _permit = ctx.permit().await;
                    if ctx.is_cancelled() {
                        warn!(
                            provider = provider.id(),
                            batch = batch_idx,
                            "run cancelled, skipping batch"
                        );
                        return Ok(Vec::new());
                    }

                    ctx.record_usage(provider.id(), provider.estimate_cost(batch.len()));
                    let batch_proposals = provider.propose(&batch, &task).await?;
                    ctx.store_cached(cache_key, batch_proposals.clone());
                    Ok(batch_proposals)
                });
            }
        }

        while let Some(joined) = join_set.join_next().await {
            let result = joined.map_err(|e| {
                StageError::Provider(crate::provider::ProviderError::Permanent(format!(
                    "inference task panicked: {e}"
                )))
            })?;
            proposals.extend(result?);
        }

        if ctx.is_cancelled() {
            warn!(
                total_cost = ctx.total_cost(),
                "inference ended early, proceeding with partial proposals"
            );
        }

        Ok(StageData::Proposals(proposals))
    }
}

/// Stage 3: ensemble merge of all proposals into per-edge verdicts.
pub struct MergeStage {
    config: MergeConfig,
}

impl MergeStage {
    pub fn new(config: MergeConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Stage for MergeStage {
    fn name(&self) -> &str {
        STAGE_MERGE
    }

    async fn execute(
        &self,
        input: StageData,
        _catalog: &NodeCatalog,
        _ctx: Arc<RunContext>,
    ) -> Result<StageData, StageError> {
        let proposals = match input {
            StageData::Proposals(p) => p,
            other => return Err(StageError::unexpected_input("proposals", &other)),
        };
        let outcome = merge::merge(&proposals, &self.config);
        info!(
            edges = outcome.edges.len(),
            rejected = outcome.rejected.len(),
            "merge complete"
        );
        Ok(StageData::Merged(outcome))
    }
}

/// Stage 4: structural validation and cycle repair.
pub struct ValidateStage;

#[async_trait]
impl Stage for ValidateStage {
    fn name(&self) -> &str {
        STAGE_VALIDATE
    }

    async fn execute(
        &self,
        input: StageData,
        catalog: &NodeCatalog,
        _ctx: Arc<RunContext>,
    ) -> Result<StageData, StageError> {
        let merged = match input {
            StageData::Merged(m) => m,
            other => return Err(StageError::unexpected_input("merged edges", &other)),
        };
        let outcome = validate::validate(catalog, merged.edges);
        info!(
            edges = outcome.clean.len(),
            findings = outcome.findings.len(),
            "validation complete"
        );
        Ok(StageData::Validated(outcome))
    }
}

/// Stage 5: idempotent commit of validated edges.
pub struct PersistStage {
    store: Arc<dyn EdgeStore>,
}

impl PersistStage {
    pub fn new(store: Arc<dyn EdgeStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Stage for PersistStage {
    fn name(&self) -> &str {
        STAGE_PERSIST
    }

    async fn execute(
        &self,
        input: StageData,
        _catalog: &NodeCatalog,
        _ctx: Arc<RunContext>,
    ) -> Result<StageData, StageError> {
        let validated = match input {
            StageData::Validated(v) => v,
            other => return Err(StageError::unexpected_input("validated edges", &other)),
        };
        let result = self.store.upsert_edges(&validated.clean)?;
        info!(
            inserted = result.inserted,
            updated = result.updated,
            "edges committed"
        );
        Ok(StageData::Committed(result))
    }
}
