//! Merged edges — the pipeline's authoritative output unit

use super::{RelationType, StandardCode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The unique key of a merged edge.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct EdgeKey {
    pub source: StandardCode,
    pub target: StandardCode,
    pub relation: RelationType,
}

impl EdgeKey {
    pub fn new(source: StandardCode, target: StandardCode, relation: RelationType) -> Self {
        Self {
            source,
            target,
            relation,
        }
    }

    /// The key of the opposite direction for the same relation type.
    pub fn inverse(&self) -> EdgeKey {
        EdgeKey {
            source: self.target.clone(),
            target: self.source.clone(),
            relation: self.relation,
        }
    }
}

impl std::fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -[{}]-> {}", self.source, self.relation, self.target)
    }
}

/// Decision status of a merged edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EdgeStatus {
    Accepted,
    Rejected,
    NeedsReview,
}

/// One decision per (source, target, relation) triple, derived from all
/// proposals for that triple.
///
/// Only the validator's repair pass may mutate a merged edge after the
/// merge (demotion to needs-review, or removal to break a cycle).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedEdge {
    pub key: EdgeKey,
    /// Weighted-average confidence over contributing proposals, in [0, 1]
    pub final_confidence: f64,
    /// Application-level importance, independent of confidence
    pub weight: f64,
    /// Providers that contributed at least one proposal
    pub contributing_sources: BTreeSet<String>,
    pub status: EdgeStatus,
    /// Diagnostic note (contradiction, tie-break, isolated merge error)
    pub note: Option<String>,
}

impl MergedEdge {
    pub fn is_accepted(&self) -> bool {
        self.status == EdgeStatus::Accepted
    }

    pub fn source(&self) -> &StandardCode {
        &self.key.source
    }

    pub fn target(&self) -> &StandardCode {
        &self.key.target
    }

    pub fn relation(&self) -> RelationType {
        self.key.relation
    }
}
