//! Proposals — unconfirmed, source-attributed relationship claims

use super::{SchemaError, StandardCode};
use serde::{Deserialize, Serialize};

/// Provider id used by the rule-based candidate generator.
pub const RULE_PROVIDER_ID: &str = "rule";

/// The relationship vocabulary of the graph.
///
/// `Prerequisite` and `GradeProgression` are ordering-sensitive: an edge
/// and its inverse cannot both stand, and cycles are structurally invalid.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    /// Source must be mastered before target
    Prerequisite,
    /// Same concept deepened across grade bands (spiral curriculum)
    GradeProgression,
    /// Descriptive similarity between standards
    SimilarTo,
    /// Horizontal link bridging two domains
    DomainBridge,
}

impl RelationType {
    pub const ALL: [RelationType; 4] = [
        RelationType::Prerequisite,
        RelationType::GradeProgression,
        RelationType::SimilarTo,
        RelationType::DomainBridge,
    ];

    /// True for relation types where direction carries meaning and
    /// cycles are invalid.
    pub fn is_ordering_sensitive(&self) -> bool {
        matches!(self, Self::Prerequisite | Self::GradeProgression)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prerequisite => "prerequisite",
            Self::GradeProgression => "grade_progression",
            Self::SimilarTo => "similar_to",
            Self::DomainBridge => "domain_bridge",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, SchemaError> {
        match raw {
            "prerequisite" => Ok(Self::Prerequisite),
            "grade_progression" => Ok(Self::GradeProgression),
            "similar_to" => Ok(Self::SimilarTo),
            "domain_bridge" => Ok(Self::DomainBridge),
            other => Err(SchemaError::UnknownRelationType(other.to_string())),
        }
    }
}

impl std::fmt::Display for RelationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One source's claim about a relationship between two standards.
///
/// Immutable once constructed. Many proposals may reference the same
/// (source, target, relation) triple; the merge engine reconciles them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub source: StandardCode,
    pub target: StandardCode,
    pub relation: RelationType,
    /// The proposing source's own confidence, in [0, 1]
    pub raw_confidence: f64,
    /// Free-text justification from the source
    pub rationale: String,
    /// Which provider produced this (or `"rule"`)
    pub provider_id: String,
    /// Reliability weight of the provider, in [0, 1]
    pub provider_weight: f64,
}

impl Proposal {
    /// Construct a proposal, rejecting self-references and out-of-range
    /// confidences at the boundary.
    pub fn new(
        source: StandardCode,
        target: StandardCode,
        relation: RelationType,
        raw_confidence: f64,
        rationale: impl Into<String>,
        provider_id: impl Into<String>,
        provider_weight: f64,
    ) -> Result<Self, SchemaError> {
        if source == target {
            return Err(SchemaError::SelfReference(source.to_string()));
        }
        if !(0.0..=1.0).contains(&raw_confidence) {
            return Err(SchemaError::ConfidenceOutOfRange(raw_confidence));
        }
        Ok(Self {
            source,
            target,
            relation,
            raw_confidence,
            rationale: rationale.into(),
            provider_id: provider_id.into(),
            provider_weight: provider_weight.clamp(0.0, 1.0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(s: &str) -> StandardCode {
        StandardCode::parse(s).unwrap()
    }

    #[test]
    fn self_reference_rejected() {
        let err = Proposal::new(
            code("M1-NUM-01"),
            code("M1-NUM-01"),
            RelationType::SimilarTo,
            0.5,
            "",
            "test",
            1.0,
        );
        assert!(matches!(err, Err(SchemaError::SelfReference(_))));
    }

    #[test]
    fn confidence_out_of_range_rejected() {
        let err = Proposal::new(
            code("M1-NUM-01"),
            code("M1-NUM-02"),
            RelationType::SimilarTo,
            1.5,
            "",
            "test",
            1.0,
        );
        assert!(matches!(err, Err(SchemaError::ConfidenceOutOfRange(_))));
    }

    #[test]
    fn relation_type_round_trips() {
        for rt in RelationType::ALL {
            assert_eq!(RelationType::parse(rt.as_str()).unwrap(), rt);
        }
        assert!(RelationType::parse("unknown").is_err());
    }

    #[test]
    fn ordering_sensitivity() {
        assert!(RelationType::Prerequisite.is_ordering_sensitive());
        assert!(RelationType::GradeProgression.is_ordering_sensitive());
        assert!(!RelationType::SimilarTo.is_ordering_sensitive());
        assert!(!RelationType::DomainBridge.is_ordering_sensitive());
    }
}
