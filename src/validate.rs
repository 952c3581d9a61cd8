//! Graph validator
//!
//! Checks the merged edge set for structural soundness: cycles among
//! ordering-sensitive accepted edges, self-loops, duplicate keys,
//! contradictions and coverage gaps. Runs one bounded repair pass that
//! breaks each detected cycle by removing its lowest-confidence edge;
//! cycles that survive repair are escalated, not looped on.
//!
//! Cycle search is an explicit-stack depth-first traversal — no
//! unbounded recursion — and produces the exact cycle path for
//! diagnostics.

use crate::catalog::NodeCatalog;
use crate::model::{
    EdgeKey, EdgeStatus, FindingKind, MergedEdge, Severity, StandardCode, ValidationFinding,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::{info, warn};

/// The validator's output: the repaired edge set plus every finding,
/// resolved ones included, for audit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub clean: Vec<MergedEdge>,
    pub findings: Vec<ValidationFinding>,
}

impl ValidationOutcome {
    /// True when no unresolved error-severity cycle or contradiction
    /// finding remains.
    pub fn is_clean(&self) -> bool {
        !self.findings.iter().any(|f| f.blocks_success())
    }

    pub fn unresolved(&self) -> impl Iterator<Item = &ValidationFinding> {
        self.findings.iter().filter(|f| !f.resolved)
    }
}

/// Validate the merged edge set against the catalog.
pub fn validate(catalog: &NodeCatalog, edges: Vec<MergedEdge>) -> ValidationOutcome {
    let mut findings = Vec::new();

    let mut edges = drop_self_loops(edges, &mut findings);
    drop_duplicates(&mut edges, &mut findings);
    report_contradictions(&edges, &mut findings);

    repair_cycles(&mut edges, &mut findings);
    report_review_only_cycles(&edges, &mut findings);
    report_orphans(catalog, &edges, &mut findings);

    let outcome = ValidationOutcome {
        clean: edges,
        findings,
    };
    info!(
        edges = outcome.clean.len(),
        findings = outcome.findings.len(),
        clean = outcome.is_clean(),
        "validation complete"
    );
    outcome
}

/// The merge engine should never produce self-loops; drop any that slip
/// through and record the invariant violation.
fn drop_self_loops(
    edges: Vec<MergedEdge>,
    findings: &mut Vec<ValidationFinding>,
) -> Vec<MergedEdge> {
    let mut kept = Vec::with_capacity(edges.len());
    for edge in edges {
        if edge.key.source == edge.key.target {
            warn!(edge = %edge.key, "self-loop reached the validator");
            findings.push(
                ValidationFinding::new(FindingKind::SelfLoop, Severity::Error)
                    .with_edges(vec![edge.key.clone()])
                    .with_nodes(vec![edge.key.source.clone()])
                    .with_note("removed unconditionally")
                    .resolved(),
            );
        } else {
            kept.push(edge);
        }
    }
    kept
}

/// Duplicate keys are impossible by construction; this scan exists to
/// catch invariant violations from bugs. First occurrence wins.
fn drop_duplicates(edges: &mut Vec<MergedEdge>, findings: &mut Vec<ValidationFinding>) {
    let mut seen: HashSet<EdgeKey> = HashSet::with_capacity(edges.len());
    edges.retain(|edge| {
        if seen.insert(edge.key.clone()) {
            true
        } else {
            warn!(edge = %edge.key, "duplicate edge key reached the validator");
            findings.push(
                ValidationFinding::new(FindingKind::Duplicate, Severity::Error)
                    .with_edges(vec![edge.key.clone()])
                    .with_note("duplicate key removed, first occurrence kept")
                    .resolved(),
            );
            false
        }
    });
}

/// Surface contradictions the merge engine demoted: both directions of
/// an ordering-sensitive relation present for the same pair.
fn report_contradictions(edges: &[MergedEdge], findings: &mut Vec<ValidationFinding>) {
    let keys: HashSet<&EdgeKey> = edges
        .iter()
        .filter(|e| e.key.relation.is_ordering_sensitive())
        .map(|e| &e.key)
        .collect();

    let mut reported: HashSet<EdgeKey> = HashSet::new();
    for edge in edges {
        let key = &edge.key;
        if !key.relation.is_ordering_sensitive() || reported.contains(key) {
            continue;
        }
        let inverse = key.inverse();
        if keys.contains(&inverse) {
            reported.insert(key.clone());
            reported.insert(inverse.clone());
            findings.push(
                ValidationFinding::new(FindingKind::Contradiction, Severity::Error)
                    .with_edges(vec![key.clone(), inverse.clone()])
                    .with_nodes(vec![key.source.clone(), key.target.clone()])
                    .with_note("edge and its inverse both survived the merge"),
            );
        }
    }
}

/// One bounded repair pass over the accepted ordering-sensitive subgraph.
///
/// For each detected cycle, the single lowest-confidence edge on the
/// cycle is removed and the finding marked resolved. Detection re-runs
/// once; cycles that persist are escalated by demoting their edges to
/// needs-review, which is guaranteed to terminate.
fn repair_cycles(edges: &mut Vec<MergedEdge>, findings: &mut Vec<ValidationFinding>) {
    let cycles = find_cycles(&accepted_precedence_edges(edges));
    if cycles.is_empty() {
        return;
    }

    let mut removed: BTreeSet<EdgeKey> = BTreeSet::new();
    for cycle in &cycles {
        let victim = cycle
            .iter()
            .filter(|k| !removed.contains(*k))
            .min_by(|a, b| {
                let (ca, cb) = (confidence_of(edges, a), confidence_of(edges, b));
                ca.partial_cmp(&cb)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.cmp(b))
            });

        let mut finding = ValidationFinding::new(FindingKind::Cycle, Severity::Error)
            .with_edges(cycle.clone())
            .with_nodes(cycle_nodes(cycle));

        match victim {
            Some(victim) => {
                finding = finding
                    .with_note(format!("repaired by removing {}", victim))
                    .resolved();
                removed.insert(victim.clone());
            }
            None => {
                // Every edge of this cycle was already removed while
                // breaking an overlapping cycle.
                finding = finding.with_note("resolved by overlapping repair").resolved();
            }
        }
        findings.push(finding);
    }
    edges.retain(|e| !removed.contains(&e.key));

    // Single re-check; no further removals.
    for cycle in find_cycles(&accepted_precedence_edges(edges)) {
        warn!("cycle persists after repair pass, escalating to needs-review");
        for edge in edges.iter_mut() {
            if cycle.contains(&edge.key) {
                edge.status = EdgeStatus::NeedsReview;
                edge.note = Some("demoted: cycle persisted after repair".to_string());
            }
        }
        findings.push(
            ValidationFinding::new(FindingKind::Cycle, Severity::Error)
                .with_nodes(cycle_nodes(&cycle))
                .with_edges(cycle)
                .with_note("persisted after repair; edges demoted to needs-review"),
        );
    }
}

/// Cycles that appear only when needs-review edges join the accepted
/// subgraph are diagnostic signal, reported as warnings.
fn report_review_only_cycles(edges: &[MergedEdge], findings: &mut Vec<ValidationFinding>) {
    let with_review: Vec<&MergedEdge> = edges
        .iter()
        .filter(|e| e.key.relation.is_ordering_sensitive() && e.status != EdgeStatus::Rejected)
        .collect();
    let review_count = with_review
        .iter()
        .filter(|e| e.status == EdgeStatus::NeedsReview)
        .count();
    if review_count == 0 {
        return;
    }

    // The accepted subgraph is acyclic at this point, so any cycle here
    // involves at least one needs-review edge.
    for cycle in find_cycles_in(&precedence_adjacency(&with_review)) {
        findings.push(
            ValidationFinding::new(FindingKind::Cycle, Severity::Warning)
                .with_nodes(cycle_nodes(&cycle))
                .with_edges(cycle)
                .with_note("cycle only present when needs-review edges are included"),
        );
    }
}

/// Nodes untouched by any accepted edge are a coverage gap, not an
/// error.
fn report_orphans(
    catalog: &NodeCatalog,
    edges: &[MergedEdge],
    findings: &mut Vec<ValidationFinding>,
) {
    let mut connected: HashSet<&StandardCode> = HashSet::new();
    for edge in edges.iter().filter(|e| e.is_accepted()) {
        connected.insert(&edge.key.source);
        connected.insert(&edge.key.target);
    }

    let orphans: Vec<StandardCode> = catalog
        .codes()
        .filter(|code| !connected.contains(code))
        .cloned()
        .collect();

    if !orphans.is_empty() {
        findings.push(
            ValidationFinding::new(FindingKind::OrphanNode, Severity::Warning)
                .with_nodes(orphans)
                .with_note("not referenced by any accepted edge"),
        );
    }
}

fn accepted_precedence_edges(edges: &[MergedEdge]) -> Vec<&MergedEdge> {
    edges
        .iter()
        .filter(|e| e.is_accepted() && e.key.relation.is_ordering_sensitive())
        .collect()
}

type Adjacency<'a> = BTreeMap<&'a StandardCode, Vec<(&'a StandardCode, &'a EdgeKey)>>;

fn precedence_adjacency<'a>(edges: &[&'a MergedEdge]) -> Adjacency<'a> {
    let mut adjacency: Adjacency = BTreeMap::new();
    for edge in edges {
        adjacency
            .entry(&edge.key.source)
            .or_default()
            .push((&edge.key.target, &edge.key));
        adjacency.entry(&edge.key.target).or_default();
    }
    for targets in adjacency.values_mut() {
        targets.sort();
    }
    adjacency
}

fn find_cycles(edges: &Vec<&MergedEdge>) -> Vec<Vec<EdgeKey>> {
    let adjacency = precedence_adjacency(edges);
    find_cycles_in(&adjacency)
}

/// Iterative depth-first search with an explicit frame stack and a
/// recursion-stack marker. A back-edge to a node on the current path
/// yields the full cycle path.
fn find_cycles_in(adjacency: &Adjacency<'_>) -> Vec<Vec<EdgeKey>> {
    #[derive(Clone, Copy, PartialEq)]
    enum Color {
        White,
        Gray,
        Black,
    }

    let mut color: HashMap<&StandardCode, Color> =
        adjacency.keys().map(|&n| (n, Color::White)).collect();
    let mut cycles: Vec<Vec<EdgeKey>> = Vec::new();
    let mut seen_cycles: HashSet<BTreeSet<EdgeKey>> = HashSet::new();

    for &root in adjacency.keys() {
        if color[root] != Color::White {
            continue;
        }

        // Frame: (node, index of next neighbor to try)
        let mut frames: Vec<(&StandardCode, usize)> = vec![(root, 0)];
        let mut path: Vec<(&StandardCode, Option<&EdgeKey>)> = vec![(root, None)];
        color.insert(root, Color::Gray);

        while let Some(frame) = frames.last_mut() {
            let node = frame.0;
            let next = frame.1;
            frame.1 += 1;

            let neighbors = &adjacency[node];
            if next < neighbors.len() {
                let (neighbor, via) = neighbors[next];
                match color[neighbor] {
                    Color::White => {
                        color.insert(neighbor, Color::Gray);
                        frames.push((neighbor, 0));
                        path.push((neighbor, Some(via)));
                    }
                    Color::Gray => {
                        // Back-edge: extract the cycle path.
                        if let Some(start) = path.iter().position(|&(n, _)| n == neighbor) {
                            let mut cycle: Vec<EdgeKey> = path[start + 1..]
                                .iter()
                                .filter_map(|&(_, via)| via.cloned())
                                .collect();
                            cycle.push(via.clone());
                            let signature: BTreeSet<EdgeKey> = cycle.iter().cloned().collect();
                            if seen_cycles.insert(signature) {
                                cycles.push(cycle);
                            }
                        }
                    }
                    Color::Black => {}
                }
            } else {
                color.insert(node, Color::Black);
                frames.pop();
                path.pop();
            }
        }
    }
    cycles
}

fn confidence_of(edges: &[MergedEdge], key: &EdgeKey) -> f64 {
    edges
        .iter()
        .find(|e| &e.key == key)
        .map(|e| e.final_confidence)
        .unwrap_or(f64::MAX)
}

fn cycle_nodes(cycle: &[EdgeKey]) -> Vec<StandardCode> {
    let mut nodes: Vec<StandardCode> = Vec::with_capacity(cycle.len());
    for key in cycle {
        if !nodes.contains(&key.source) {
            nodes.push(key.source.clone());
        }
    }
    nodes
}
