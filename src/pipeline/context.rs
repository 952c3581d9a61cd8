//! Per-run state: cost accounting, proposal cache, cancellation
//!
//! Everything that used to be a process-wide counter or cache lives
//! here, scoped to one run and passed explicitly through the pipeline.

use crate::model::Proposal;
use crate::provider::CostEstimate;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::warn;
use uuid::Uuid;

/// A cooperative cancellation token.
///
/// The controller sets the token on a cost-limit breach; in-flight
/// provider dispatch checks it between calls. Proposals already
/// returned are kept.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// State owned by a single pipeline run.
pub struct RunContext {
    pub run_id: Uuid,
    semaphore: Arc<Semaphore>,
    cancel: CancellationToken,
    cost_limit: Option<f64>,
    usage: Mutex<BTreeMap<String, CostEstimate>>,
    cache: DashMap<String, Vec<Proposal>>,
}

impl RunContext {
    pub fn new(max_concurrent_calls: usize, cost_limit: Option<f64>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            semaphore: Arc::new(Semaphore::new(max_concurrent_calls.max(1))),
            cancel: CancellationToken::new(),
            cost_limit,
            usage: Mutex::new(BTreeMap::new()),
            cache: DashMap::new(),
        }
    }

    /// Acquire an in-flight slot for a provider call.
    pub async fn permit(&self) -> SemaphorePermit<'_> {
        self.semaphore
            .acquire()
            .await
            .expect("run semaphore closed")
    }

    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Record usage for one provider call. Breaching the cost limit
    /// cancels the rest of the stage; completed work is kept.
    pub fn record_usage(&self, provider_id: &str, cost: CostEstimate) {
        let total = {
            let mut usage = self.usage.lock().expect("usage lock poisoned");
            usage.entry(provider_id.to_string()).or_default().add(cost);
            usage.values().map(|c| c.cost).sum::<f64>()
        };

        if let Some(limit) = self.cost_limit {
            if total > limit && !self.cancel.is_cancelled() {
                warn!(total, limit, "cost limit breached, cancelling remaining calls");
                self.cancel.cancel();
            }
        }
    }

    /// Per-provider usage snapshot.
    pub fn usage(&self) -> BTreeMap<String, CostEstimate> {
        self.usage.lock().expect("usage lock poisoned").clone()
    }

    pub fn total_cost(&self) -> f64 {
        self.usage
            .lock()
            .expect("usage lock poisoned")
            .values()
            .map(|c| c.cost)
            .sum()
    }

    pub fn cached(&self, key: &str) -> Option<Vec<Proposal>> {
        self.cache.get(key).map(|entry| entry.clone())
    }

    pub fn store_cached(&self, key: impl Into<String>, proposals: Vec<Proposal>) {
        self.cache.insert(key.into(), proposals);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_shared_across_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn cost_limit_breach_cancels() {
        let ctx = RunContext::new(2, Some(1.0));
        ctx.record_usage("p1", CostEstimate { calls: 1, cost: 0.6 });
        assert!(!ctx.is_cancelled());
        ctx.record_usage("p2", CostEstimate { calls: 1, cost: 0.6 });
        assert!(ctx.is_cancelled());
        assert_eq!(ctx.usage().len(), 2);
    }

    #[test]
    fn no_limit_never_cancels() {
        let ctx = RunContext::new(2, None);
        ctx.record_usage("p1", CostEstimate { calls: 9, cost: 999.0 });
        assert!(!ctx.is_cancelled());
        assert_eq!(ctx.total_cost(), 999.0);
    }
}
