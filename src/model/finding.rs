//! Validation findings emitted by the graph validator

use super::{EdgeKey, StandardCode};
use serde::{Deserialize, Serialize};

/// What kind of structural problem a finding describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FindingKind {
    /// Cycle among ordering-sensitive accepted edges
    Cycle,
    SelfLoop,
    /// Duplicate edge key — impossible by construction, reported only to
    /// catch invariant violations from bugs
    Duplicate,
    /// Node untouched by any accepted edge
    OrphanNode,
    /// An edge and its inverse both cleared threshold
    Contradiction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Severity {
    Error,
    Warning,
}

/// A structural violation found during validation.
///
/// Resolved findings (e.g. a cycle broken by the repair pass) stay in the
/// finding list for audit, marked `resolved = true`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationFinding {
    pub kind: FindingKind,
    pub involved_edges: Vec<EdgeKey>,
    pub involved_nodes: Vec<StandardCode>,
    pub severity: Severity,
    pub resolved: bool,
    pub note: Option<String>,
}

impl ValidationFinding {
    pub fn new(kind: FindingKind, severity: Severity) -> Self {
        Self {
            kind,
            involved_edges: Vec::new(),
            involved_nodes: Vec::new(),
            severity,
            resolved: false,
            note: None,
        }
    }

    pub fn with_edges(mut self, edges: Vec<EdgeKey>) -> Self {
        self.involved_edges = edges;
        self
    }

    pub fn with_nodes(mut self, nodes: Vec<StandardCode>) -> Self {
        self.involved_nodes = nodes;
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn resolved(mut self) -> Self {
        self.resolved = true;
        self
    }

    /// True for findings that block a fully-successful run status.
    /// Warnings (orphan nodes, diagnostic cycles) never block.
    pub fn blocks_success(&self) -> bool {
        !self.resolved
            && self.severity == Severity::Error
            && matches!(self.kind, FindingKind::Cycle | FindingKind::Contradiction)
    }
}
