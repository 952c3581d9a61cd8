//! Mock provider — preconfigured responses for testing and offline runs

use super::traits::{CostEstimate, InferenceProvider, ProviderError, StandardPair, TaskSpec};
use crate::model::Proposal;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// One scripted outcome for a `propose` call.
#[derive(Debug)]
pub enum ScriptedResponse {
    Proposals(Vec<Proposal>),
    Transient(String),
    Permanent(String),
}

/// A provider that replays scripted responses in order.
///
/// When the script is exhausted it returns empty proposal sets, so a
/// test can script only the calls it cares about.
pub struct MockProvider {
    id: String,
    weight: f64,
    cost_per_call: f64,
    script: Mutex<VecDeque<ScriptedResponse>>,
}

impl MockProvider {
    pub fn new(id: impl Into<String>, weight: f64) -> Self {
        Self {
            id: id.into(),
            weight,
            cost_per_call: 0.01,
            script: Mutex::new(VecDeque::new()),
        }
    }

    pub fn with_cost_per_call(mut self, cost: f64) -> Self {
        self.cost_per_call = cost;
        self
    }

    /// Queue a successful response.
    pub fn with_proposals(self, proposals: Vec<Proposal>) -> Self {
        self.push(ScriptedResponse::Proposals(proposals));
        self
    }

    /// Queue a transient failure.
    pub fn with_transient_failure(self, message: impl Into<String>) -> Self {
        self.push(ScriptedResponse::Transient(message.into()));
        self
    }

    /// Queue a permanent failure.
    pub fn with_permanent_failure(self, message: impl Into<String>) -> Self {
        self.push(ScriptedResponse::Permanent(message.into()));
        self
    }

    fn push(&self, response: ScriptedResponse) {
        self.script
            .lock()
            .expect("mock script lock poisoned")
            .push_back(response);
    }
}

#[async_trait]
impl InferenceProvider for MockProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn weight(&self) -> f64 {
        self.weight
    }

    fn estimate_cost(&self, batch_len: usize) -> CostEstimate {
        CostEstimate {
            calls: 1,
            cost: self.cost_per_call * batch_len.max(1) as f64,
        }
    }

    async fn propose(
        &self,
        batch: &[StandardPair],
        _task: &TaskSpec,
    ) -> Result<Vec<Proposal>, ProviderError> {
        let next = self
            .script
            .lock()
            .expect("mock script lock poisoned")
            .pop_front();

        match next {
            Some(ScriptedResponse::Proposals(proposals)) => Ok(proposals),
            Some(ScriptedResponse::Transient(msg)) => Err(ProviderError::Transient(msg)),
            Some(ScriptedResponse::Permanent(msg)) => Err(ProviderError::Permanent(msg)),
            None => {
                let _ = batch;
                Ok(Vec::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RelationType, StandardCode};

    fn proposal(source: &str, target: &str) -> Proposal {
        Proposal::new(
            StandardCode::parse(source).unwrap(),
            StandardCode::parse(target).unwrap(),
            RelationType::SimilarTo,
            0.7,
            "",
            "mock",
            1.0,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn scripted_responses_replay_in_order() {
        let provider = MockProvider::new("mock", 1.0)
            .with_proposals(vec![proposal("M1-A-01", "M1-A-02")])
            .with_transient_failure("rate limited");

        let task = TaskSpec::new(vec![RelationType::SimilarTo], "test");

        let first = provider.propose(&[], &task).await.unwrap();
        assert_eq!(first.len(), 1);

        let second = provider.propose(&[], &task).await;
        assert!(matches!(second, Err(ProviderError::Transient(_))));

        // Exhausted script yields empty sets
        let third = provider.propose(&[], &task).await.unwrap();
        assert!(third.is_empty());
    }

    #[test]
    fn cost_estimate_scales_with_batch() {
        let provider = MockProvider::new("mock", 1.0).with_cost_per_call(0.5);
        assert_eq!(provider.estimate_cost(4).cost, 2.0);
        assert_eq!(provider.estimate_cost(4).calls, 1);
    }
}
