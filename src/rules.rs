//! Rule-based candidate generator
//!
//! Produces deterministic, zero-cost candidate edges from catalog structure
//! before any provider is called. Rule proposals are first-class merge
//! inputs — a prior that inference agrees with or overrides, not a filter.

use crate::catalog::NodeCatalog;
use crate::model::{Proposal, RelationType, Standard, RULE_PROVIDER_ID};
use tracing::debug;

/// Fixed confidence for ordinal-adjacency candidates.
const ADJACENCY_CONFIDENCE: f64 = 0.5;

/// Precedence confidence starts here for a one-band gap and grows with
/// the gap — precedence is less ambiguous across bigger separations.
const PRECEDENCE_BASE_CONFIDENCE: f64 = 0.55;
const PRECEDENCE_GAP_STEP: f64 = 0.1;
const PRECEDENCE_MAX_CONFIDENCE: f64 = 0.85;

/// Reliability weight assigned to the rule provider.
const RULE_WEIGHT: f64 = 0.6;

/// Generate all rule-based candidate proposals for a catalog.
///
/// Pure and deterministic; performs no I/O.
pub fn generate(catalog: &NodeCatalog) -> Vec<Proposal> {
    let mut proposals = Vec::new();
    adjacency_candidates(catalog, &mut proposals);
    precedence_candidates(catalog, &mut proposals);
    debug!(count = proposals.len(), "rule candidates generated");
    proposals
}

/// Adjacency rule: standards in the same (grade band, domain, content
/// group) whose ordinals differ by exactly 1 get a horizontal candidate.
fn adjacency_candidates(catalog: &NodeCatalog, out: &mut Vec<Proposal>) {
    for ((band, domain, group), members) in catalog.adjacency_groups() {
        for pair in members.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if b.ordinal - a.ordinal != 1 {
                continue;
            }
            out.push(rule_proposal(
                a,
                b,
                RelationType::DomainBridge,
                ADJACENCY_CONFIDENCE,
                format!(
                    "adjacent ordinals {} and {} in {}/{}/{}",
                    a.ordinal, b.ordinal, band, domain, group
                ),
            ));
        }
    }
}

/// Precedence rule: standards sharing (domain, content group) in different
/// grade bands get a prerequisite candidate from the lower band to the
/// higher, confidence scaling with the band gap.
fn precedence_candidates(catalog: &NodeCatalog, out: &mut Vec<Proposal>) {
    for ((domain, group), members) in catalog.progression_groups() {
        for i in 0..members.len() {
            for j in (i + 1)..members.len() {
                let (lower, higher) = (members[i], members[j]);
                let gap = lower.grade_band.gap(&higher.grade_band);
                if gap == 0 {
                    continue;
                }
                out.push(rule_proposal(
                    lower,
                    higher,
                    RelationType::Prerequisite,
                    precedence_confidence(gap),
                    format!(
                        "grade band {} precedes {} in {}/{}",
                        lower.grade_band, higher.grade_band, domain, group
                    ),
                ));
            }
        }
    }
}

fn precedence_confidence(gap: u8) -> f64 {
    (PRECEDENCE_BASE_CONFIDENCE + PRECEDENCE_GAP_STEP * f64::from(gap - 1))
        .min(PRECEDENCE_MAX_CONFIDENCE)
}

fn rule_proposal(
    source: &Standard,
    target: &Standard,
    relation: RelationType,
    confidence: f64,
    rationale: String,
) -> Proposal {
    // Source and target come from distinct catalog entries, so the
    // self-reference check cannot fire.
    Proposal::new(
        source.code.clone(),
        target.code.clone(),
        relation,
        confidence,
        rationale,
        RULE_PROVIDER_ID,
        RULE_WEIGHT,
    )
    .expect("catalog entries are distinct and confidence is constant")
}
