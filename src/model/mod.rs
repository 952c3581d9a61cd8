//! Core data types shared across the pipeline

mod edge;
mod finding;
mod proposal;
mod standard;

pub use edge::{EdgeKey, EdgeStatus, MergedEdge};
pub use finding::{FindingKind, Severity, ValidationFinding};
pub use proposal::{Proposal, RelationType, RULE_PROVIDER_ID};
pub use standard::{GradeBand, Standard, StandardCode};

use thiserror::Error;

/// Malformed node or proposal data. Always fatal — schema errors abort
/// the run rather than being silently dropped.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("invalid standard code '{0}': expected segments of [A-Z0-9] joined by '-' or '.'")]
    InvalidCode(String),

    #[error("duplicate standard code '{0}'")]
    DuplicateCode(String),

    #[error("proposal references itself: {0}")]
    SelfReference(String),

    #[error("confidence {0} outside [0, 1]")]
    ConfidenceOutOfRange(f64),

    #[error("unknown relation type '{0}'")]
    UnknownRelationType(String),

    #[error("unknown standard code '{0}'")]
    UnknownCode(String),
}
