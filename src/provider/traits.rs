//! Provider trait — the contract inference adapters implement

use crate::model::{Proposal, RelationType, Standard};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from provider calls.
///
/// Transient failures are retried by the adapter boundary; permanent
/// failures abort the current stage.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("transient provider failure: {0}")]
    Transient(String),

    #[error("permanent provider failure: {0}")]
    Permanent(String),

    #[error("unparseable provider payload: {0}")]
    Payload(String),
}

impl ProviderError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// A pair of standards submitted to a provider for judgment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardPair {
    pub a: Standard,
    pub b: Standard,
}

impl StandardPair {
    pub fn new(a: Standard, b: Standard) -> Self {
        Self { a, b }
    }
}

/// What the provider is asked to judge for a batch of pairs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Relation types the provider should consider
    pub relations: Vec<RelationType>,
    /// Free-text framing for the task (domain, curriculum revision, ...)
    pub instructions: String,
}

impl TaskSpec {
    pub fn new(relations: Vec<RelationType>, instructions: impl Into<String>) -> Self {
        Self {
            relations,
            instructions: instructions.into(),
        }
    }
}

/// Estimated cost of a provider call, for dry-run reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    pub calls: u64,
    pub cost: f64,
}

impl CostEstimate {
    pub fn add(&mut self, other: CostEstimate) {
        self.calls += other.calls;
        self.cost += other.cost;
    }
}

/// The contract inference adapters implement.
///
/// Implementations must be safe to call concurrently. Retry and backoff
/// live outside the trait, in [`RetryingProvider`], so individual adapters
/// stay free of ad-hoc retry loops.
#[async_trait]
pub trait InferenceProvider: Send + Sync {
    /// Unique provider identifier (e.g. "gemini-pro", "rule")
    fn id(&self) -> &str;

    /// Reliability weight applied to this provider's proposals, in [0, 1]
    fn weight(&self) -> f64;

    /// Cost estimate for judging `batch_len` pairs, without calling out
    fn estimate_cost(&self, batch_len: usize) -> CostEstimate;

    /// Judge a batch of pairs, returning validated proposals.
    async fn propose(
        &self,
        batch: &[StandardPair],
        task: &TaskSpec,
    ) -> Result<Vec<Proposal>, ProviderError>;
}

/// Wraps a provider with the uniform retry policy.
pub struct RetryingProvider<P> {
    inner: P,
    policy: super::RetryPolicy,
}

impl<P: InferenceProvider> RetryingProvider<P> {
    pub fn new(inner: P, policy: super::RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl<P: InferenceProvider> InferenceProvider for RetryingProvider<P> {
    fn id(&self) -> &str {
        self.inner.id()
    }

    fn weight(&self) -> f64 {
        self.inner.weight()
    }

    fn estimate_cost(&self, batch_len: usize) -> CostEstimate {
        self.inner.estimate_cost(batch_len)
    }

    async fn propose(
        &self,
        batch: &[StandardPair],
        task: &TaskSpec,
    ) -> Result<Vec<Proposal>, ProviderError> {
        self.policy
            .run(self.inner.id(), || self.inner.propose(batch, task))
            .await
    }
}
