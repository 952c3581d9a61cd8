//! Ensemble merge engine
//!
//! Reconciles rule-based candidates and provider proposals into one
//! decision per (source, target, relation) triple: weighted-average
//! confidence, per-type acceptance thresholds, contradiction detection
//! for ordering-sensitive relations, and tie-breaking between mutually
//! exclusive relation types on the same pair.
//!
//! `merge` is a pure function over its inputs — given the same proposal
//! set it produces the same edge set, regardless of input order.

use crate::model::{EdgeKey, EdgeStatus, MergedEdge, Proposal, RelationType, StandardCode};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info};

/// Threshold used for relation types without an explicit entry.
const FALLBACK_THRESHOLD: f64 = 0.6;

/// Base weight for relation types without an explicit entry.
const FALLBACK_BASE_WEIGHT: f64 = 0.5;

/// Merge configuration: thresholds, tie-break order, compatibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Per-relation-type acceptance thresholds
    pub thresholds: HashMap<RelationType, f64>,
    /// Tie-break order between relation types with equal confidence;
    /// earlier wins. Structural relations outrank descriptive ones.
    pub type_precedence: Vec<RelationType>,
    /// Unordered pairs of relation types that may coexist on the same
    /// (source, target) pair. Pairs not listed are mutually exclusive.
    pub compatible: Vec<(RelationType, RelationType)>,
    /// Per-relation-type base weights, scaled by final confidence to
    /// produce the edge weight
    pub base_weights: HashMap<RelationType, f64>,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            thresholds: HashMap::from([
                (RelationType::Prerequisite, 0.70),
                (RelationType::GradeProgression, 0.65),
                (RelationType::SimilarTo, 0.55),
                (RelationType::DomainBridge, 0.50),
            ]),
            type_precedence: vec![
                RelationType::Prerequisite,
                RelationType::GradeProgression,
                RelationType::DomainBridge,
                RelationType::SimilarTo,
            ],
            compatible: vec![
                (RelationType::Prerequisite, RelationType::SimilarTo),
                (RelationType::GradeProgression, RelationType::SimilarTo),
                (RelationType::DomainBridge, RelationType::SimilarTo),
            ],
            base_weights: HashMap::from([
                (RelationType::Prerequisite, 1.0),
                (RelationType::GradeProgression, 0.8),
                (RelationType::SimilarTo, 0.6),
                (RelationType::DomainBridge, 0.4),
            ]),
        }
    }
}

impl MergeConfig {
    pub fn threshold(&self, relation: RelationType) -> f64 {
        self.thresholds
            .get(&relation)
            .copied()
            .unwrap_or(FALLBACK_THRESHOLD)
    }

    pub fn base_weight(&self, relation: RelationType) -> f64 {
        self.base_weights
            .get(&relation)
            .copied()
            .unwrap_or(FALLBACK_BASE_WEIGHT)
    }

    /// Rank in the precedence order; unlisted types rank last.
    fn precedence_rank(&self, relation: RelationType) -> usize {
        self.type_precedence
            .iter()
            .position(|&t| t == relation)
            .unwrap_or(usize::MAX)
    }

    fn are_compatible(&self, a: RelationType, b: RelationType) -> bool {
        a == b
            || self
                .compatible
                .iter()
                .any(|&(x, y)| (x == a && y == b) || (x == b && y == a))
    }
}

/// The merge engine's output: forwarded edges plus the rejected audit log.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MergeOutcome {
    /// Accepted and needs-review edges, forwarded to the validator
    pub edges: Vec<MergedEdge>,
    /// Below-threshold and tie-break losers, retained for traceability
    pub rejected: Vec<MergedEdge>,
}

impl MergeOutcome {
    pub fn count(&self, status: EdgeStatus) -> usize {
        match status {
            EdgeStatus::Rejected => self.rejected.len(),
            _ => self.edges.iter().filter(|e| e.status == status).count(),
        }
    }
}

/// Merge all proposals into one decision per triple.
pub fn merge(proposals: &[Proposal], config: &MergeConfig) -> MergeOutcome {
    // Group by triple. BTreeMap keeps processing order independent of
    // input order.
    let mut groups: BTreeMap<EdgeKey, Vec<&Proposal>> = BTreeMap::new();
    let mut rejected: Vec<MergedEdge> = Vec::new();

    for proposal in proposals {
        if proposal.source == proposal.target {
            // Construction forbids this; tolerate deserialized data.
            rejected.push(audit_edge(proposal, "self-loop proposal dropped"));
            continue;
        }
        groups
            .entry(EdgeKey::new(
                proposal.source.clone(),
                proposal.target.clone(),
                proposal.relation,
            ))
            .or_default()
            .push(proposal);
    }

    // Decide each group independently.
    let mut edges: BTreeMap<EdgeKey, MergedEdge> = BTreeMap::new();
    for (key, group) in groups {
        let edge = merge_group(key, &group, config);
        match edge.status {
            EdgeStatus::Rejected => rejected.push(edge),
            _ => {
                // Re-merging the same triple overwrites, never appends.
                edges.insert(edge.key.clone(), edge);
            }
        }
    }

    detect_contradictions(&mut edges);
    resolve_type_competition(&mut edges, &mut rejected, config);

    let outcome = MergeOutcome {
        edges: edges.into_values().collect(),
        rejected,
    };
    info!(
        accepted = outcome.count(EdgeStatus::Accepted),
        needs_review = outcome.count(EdgeStatus::NeedsReview),
        rejected = outcome.rejected.len(),
        "merge complete"
    );
    outcome
}

/// Merge one proposal group into a single edge.
///
/// Errors inside a group are isolated: a group that cannot be merged
/// cleanly becomes a needs-review edge with a note, never an abort.
fn merge_group(key: EdgeKey, group: &[&Proposal], config: &MergeConfig) -> MergedEdge {
    let total_weight: f64 = group.iter().map(|p| p.provider_weight).sum();
    let contributing: BTreeSet<String> =
        group.iter().map(|p| p.provider_id.clone()).collect();

    let (confidence, note) = if total_weight > 0.0 {
        let weighted: f64 = group
            .iter()
            .map(|p| p.raw_confidence * p.provider_weight)
            .sum();
        (weighted / total_weight, None)
    } else {
        // All contributors carry zero weight; no meaningful average.
        (0.0, Some("zero total provider weight".to_string()))
    };

    let (status, note) = if note.is_some() || !confidence.is_finite() {
        (
            EdgeStatus::NeedsReview,
            note.or_else(|| Some("non-finite merged confidence".to_string())),
        )
    } else if confidence >= config.threshold(key.relation) {
        (EdgeStatus::Accepted, None)
    } else {
        (EdgeStatus::Rejected, None)
    };

    let confidence = if confidence.is_finite() { confidence } else { 0.0 };
    debug!(edge = %key, confidence, ?status, "merged proposal group");

    MergedEdge {
        weight: edge_weight(config.base_weight(key.relation), confidence),
        key,
        final_confidence: confidence,
        contributing_sources: contributing,
        status,
        note,
    }
}

/// Original base-weight scheme: type base × confidence, 3 decimals.
fn edge_weight(base: f64, confidence: f64) -> f64 {
    (base * confidence * 1000.0).round() / 1000.0
}

/// For asymmetric relation types, an edge and its inverse cannot both
/// stand. Both directions are demoted to needs-review.
fn detect_contradictions(edges: &mut BTreeMap<EdgeKey, MergedEdge>) {
    let accepted: Vec<EdgeKey> = edges
        .values()
        .filter(|e| e.is_accepted() && e.key.relation.is_ordering_sensitive())
        .map(|e| e.key.clone())
        .collect();

    for key in accepted {
        let inverse = key.inverse();
        // Process each unordered pair once.
        if key.source < key.target {
            continue;
        }
        let inverse_accepted = edges.get(&inverse).is_some_and(|e| e.is_accepted());
        if !inverse_accepted {
            continue;
        }
        for k in [&key, &inverse] {
            if let Some(edge) = edges.get_mut(k) {
                edge.status = EdgeStatus::NeedsReview;
                edge.note = Some(format!(
                    "contradiction: inverse edge {} also cleared threshold",
                    k.inverse()
                ));
            }
        }
    }
}

/// Tie-break between relation types competing for the same (source,
/// target) pair. Compatible types coexist; mutually exclusive types are
/// resolved by confidence, then by the configured precedence order, and
/// flagged needs-review when neither distinguishes them.
fn resolve_type_competition(
    edges: &mut BTreeMap<EdgeKey, MergedEdge>,
    rejected: &mut Vec<MergedEdge>,
    config: &MergeConfig,
) {
    let mut by_pair: BTreeMap<(StandardCode, StandardCode), Vec<EdgeKey>> = BTreeMap::new();
    for edge in edges.values().filter(|e| e.is_accepted()) {
        by_pair
            .entry((edge.key.source.clone(), edge.key.target.clone()))
            .or_default()
            .push(edge.key.clone());
    }

    for (_, keys) in by_pair {
        if keys.len() < 2 {
            continue;
        }
        for i in 0..keys.len() {
            for j in (i + 1)..keys.len() {
                let (a, b) = (&keys[i], &keys[j]);
                if config.are_compatible(a.relation, b.relation) {
                    continue;
                }
                // Either edge may already have lost a previous duel.
                let (conf_a, conf_b) = match (edges.get(a), edges.get(b)) {
                    (Some(ea), Some(eb)) if ea.is_accepted() && eb.is_accepted() => {
                        (ea.final_confidence, eb.final_confidence)
                    }
                    _ => continue,
                };

                let loser = if conf_a > conf_b {
                    Some(b)
                } else if conf_b > conf_a {
                    Some(a)
                } else {
                    let (rank_a, rank_b) = (
                        config.precedence_rank(a.relation),
                        config.precedence_rank(b.relation),
                    );
                    if rank_a < rank_b {
                        Some(b)
                    } else if rank_b < rank_a {
                        Some(a)
                    } else {
                        None
                    }
                };

                match loser {
                    Some(loser_key) => {
                        let winner = if loser_key == a { b } else { a };
                        if let Some(mut edge) = edges.remove(loser_key) {
                            edge.status = EdgeStatus::Rejected;
                            edge.note =
                                Some(format!("lost tie-break to {}", winner.relation));
                            rejected.push(edge);
                        }
                    }
                    None => {
                        // Indistinguishable and mutually exclusive.
                        for k in [a, b] {
                            if let Some(edge) = edges.get_mut(k) {
                                edge.status = EdgeStatus::NeedsReview;
                                edge.note = Some(
                                    "unresolvable tie between mutually exclusive relation types"
                                        .to_string(),
                                );
                            }
                        }
                    }
                }
            }
        }
    }
}

fn audit_edge(proposal: &Proposal, note: &str) -> MergedEdge {
    MergedEdge {
        key: EdgeKey::new(
            proposal.source.clone(),
            proposal.target.clone(),
            proposal.relation,
        ),
        final_confidence: proposal.raw_confidence,
        weight: 0.0,
        contributing_sources: BTreeSet::from([proposal.provider_id.clone()]),
        status: EdgeStatus::Rejected,
        note: Some(note.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StandardCode;

    fn code(s: &str) -> StandardCode {
        StandardCode::parse(s).unwrap()
    }

    fn proposal(
        source: &str,
        target: &str,
        relation: RelationType,
        confidence: f64,
        provider: &str,
        weight: f64,
    ) -> Proposal {
        Proposal::new(
            code(source),
            code(target),
            relation,
            confidence,
            "",
            provider,
            weight,
        )
        .unwrap()
    }

    #[test]
    fn weighted_average_matches_reference_scenario() {
        // (0.9·1.0 + 0.6·0.5 + 0.5·0.3) / (1.0 + 0.5 + 0.3) ≈ 0.767
        let proposals = vec![
            proposal("A-1", "B-1", RelationType::Prerequisite, 0.9, "p1", 1.0),
            proposal("A-1", "B-1", RelationType::Prerequisite, 0.6, "p2", 0.5),
            proposal("A-1", "B-1", RelationType::Prerequisite, 0.5, "p3", 0.3),
        ];

        let outcome = merge(&proposals, &MergeConfig::default());
        assert_eq!(outcome.edges.len(), 1);
        let edge = &outcome.edges[0];
        assert!((edge.final_confidence - 0.7666666).abs() < 1e-4);
        assert_eq!(edge.status, EdgeStatus::Accepted);
        assert_eq!(edge.contributing_sources.len(), 3);
    }

    #[test]
    fn confidence_stays_within_contributor_range() {
        let proposals = vec![
            proposal("A-1", "B-1", RelationType::SimilarTo, 0.9, "p1", 0.2),
            proposal("A-1", "B-1", RelationType::SimilarTo, 0.6, "p2", 1.0),
        ];
        let outcome = merge(&proposals, &MergeConfig::default());
        let conf = outcome.edges[0].final_confidence;
        assert!(conf >= 0.6 && conf <= 0.9);
    }

    #[test]
    fn below_threshold_rejected_but_audited() {
        let proposals = vec![proposal(
            "A-1",
            "B-1",
            RelationType::Prerequisite,
            0.5,
            "p1",
            1.0,
        )];
        let outcome = merge(&proposals, &MergeConfig::default());
        assert!(outcome.edges.is_empty());
        assert_eq!(outcome.rejected.len(), 1);
        assert_eq!(outcome.rejected[0].status, EdgeStatus::Rejected);
    }

    #[test]
    fn rule_only_group_merges_normally() {
        let proposals = vec![proposal(
            "A-1",
            "B-1",
            RelationType::DomainBridge,
            0.6,
            "rule",
            0.6,
        )];
        let outcome = merge(&proposals, &MergeConfig::default());
        assert_eq!(outcome.edges.len(), 1);
        assert_eq!(outcome.edges[0].status, EdgeStatus::Accepted);
    }

    #[test]
    fn merge_is_order_independent() {
        let a = proposal("A-1", "B-1", RelationType::Prerequisite, 0.9, "p1", 1.0);
        let b = proposal("B-1", "C-1", RelationType::SimilarTo, 0.7, "p2", 0.8);
        let c = proposal("A-1", "B-1", RelationType::Prerequisite, 0.6, "p3", 0.4);

        let forward = merge(&[a.clone(), b.clone(), c.clone()], &MergeConfig::default());
        let reverse = merge(&[c, b, a], &MergeConfig::default());

        assert_eq!(forward.edges, reverse.edges);
        assert_eq!(forward.rejected, reverse.rejected);
    }

    #[test]
    fn contradiction_demotes_both_directions() {
        // (X,Y) at 0.75 and (Y,X) at 0.72 both clear the 0.70 threshold
        let proposals = vec![
            proposal("X-1", "Y-1", RelationType::Prerequisite, 0.75, "p1", 1.0),
            proposal("Y-1", "X-1", RelationType::Prerequisite, 0.72, "p2", 1.0),
        ];

        let outcome = merge(&proposals, &MergeConfig::default());
        assert_eq!(outcome.edges.len(), 2);
        for edge in &outcome.edges {
            assert_eq!(edge.status, EdgeStatus::NeedsReview);
            assert!(edge.note.as_deref().unwrap_or("").contains("contradiction"));
        }
    }

    #[test]
    fn symmetric_types_do_not_contradict() {
        let proposals = vec![
            proposal("X-1", "Y-1", RelationType::SimilarTo, 0.8, "p1", 1.0),
            proposal("Y-1", "X-1", RelationType::SimilarTo, 0.8, "p2", 1.0),
        ];
        let outcome = merge(&proposals, &MergeConfig::default());
        assert!(outcome.edges.iter().all(|e| e.is_accepted()));
    }

    #[test]
    fn higher_confidence_type_wins_exclusive_competition() {
        // prerequisite and grade_progression are mutually exclusive
        let proposals = vec![
            proposal("A-1", "B-1", RelationType::Prerequisite, 0.9, "p1", 1.0),
            proposal("A-1", "B-1", RelationType::GradeProgression, 0.8, "p2", 1.0),
        ];

        let outcome = merge(&proposals, &MergeConfig::default());
        assert_eq!(outcome.edges.len(), 1);
        assert_eq!(outcome.edges[0].relation(), RelationType::Prerequisite);
        assert_eq!(outcome.rejected.len(), 1);
        assert!(outcome.rejected[0]
            .note
            .as_deref()
            .unwrap()
            .contains("tie-break"));
    }

    #[test]
    fn exact_tie_resolved_by_precedence_order() {
        let proposals = vec![
            proposal("A-1", "B-1", RelationType::GradeProgression, 0.9, "p1", 1.0),
            proposal("A-1", "B-1", RelationType::Prerequisite, 0.9, "p2", 1.0),
        ];

        let outcome = merge(&proposals, &MergeConfig::default());
        assert_eq!(outcome.edges.len(), 1);
        // prerequisite outranks grade_progression in the default order
        assert_eq!(outcome.edges[0].relation(), RelationType::Prerequisite);
    }

    #[test]
    fn compatible_types_coexist() {
        let proposals = vec![
            proposal("A-1", "B-1", RelationType::Prerequisite, 0.9, "p1", 1.0),
            proposal("A-1", "B-1", RelationType::SimilarTo, 0.7, "p2", 1.0),
        ];

        let outcome = merge(&proposals, &MergeConfig::default());
        assert_eq!(outcome.edges.len(), 2);
        assert!(outcome.edges.iter().all(|e| e.is_accepted()));
    }

    #[test]
    fn zero_weight_group_isolated_as_needs_review() {
        let proposals = vec![proposal(
            "A-1",
            "B-1",
            RelationType::SimilarTo,
            0.9,
            "p1",
            0.0,
        )];
        let outcome = merge(&proposals, &MergeConfig::default());
        assert_eq!(outcome.edges.len(), 1);
        assert_eq!(outcome.edges[0].status, EdgeStatus::NeedsReview);
        assert!(outcome.edges[0].note.is_some());
    }

    #[test]
    fn edge_weight_scales_base_by_confidence() {
        let proposals = vec![proposal(
            "A-1",
            "B-1",
            RelationType::Prerequisite,
            0.8,
            "p1",
            1.0,
        )];
        let outcome = merge(&proposals, &MergeConfig::default());
        assert_eq!(outcome.edges[0].weight, 0.8); // 1.0 base × 0.8
    }
}
