//! Strand: curriculum knowledge-graph construction pipeline
//!
//! Builds a relationship graph over a fixed catalog of curriculum
//! standards: deterministic rule candidates, multi-provider inference,
//! weighted ensemble merge, structural validation with cycle repair,
//! and idempotent persistence — all run as a checkpointed stage
//! pipeline that can resume from any stage.
//!
//! # Core Concepts
//!
//! - **Catalog**: the immutable node set, validated once at load
//! - **Proposals**: source-attributed relationship claims from rules
//!   and providers
//! - **Merge**: one weighted decision per (source, target, relation)
//! - **Pipeline**: candidates -> inference -> merge -> validate -> persist,
//!   with a checkpoint after each stage
//!
//! # Example
//!
//! ```
//! use strand::{NodeCatalog, CatalogRecord};
//!
//! let catalog = NodeCatalog::from_records(vec![CatalogRecord {
//!     code: "M1-NUM-01".into(),
//!     grade_band: 1,
//!     domain: "number".into(),
//!     content_group: Some("counting".into()),
//!     ordinal: 1,
//! }])
//! .unwrap();
//! let candidates = strand::rules::generate(&catalog);
//! assert!(candidates.is_empty()); // a single node has no pairs
//! ```

pub mod catalog;
pub mod config;
pub mod merge;
pub mod model;
pub mod pipeline;
pub mod provider;
pub mod report;
pub mod rules;
pub mod store;
pub mod validate;

pub use catalog::{CatalogRecord, NodeCatalog};
pub use config::{ConfigError, ProviderSpec, RunConfig};
pub use merge::{MergeConfig, MergeOutcome};
pub use model::{
    EdgeKey, EdgeStatus, GradeBand, MergedEdge, Proposal, RelationType, SchemaError, Standard,
    StandardCode, ValidationFinding,
};
pub use pipeline::{
    CancellationToken, CheckpointLog, Pipeline, PipelineError, RunContext, RunOptions, Stage,
    StageData, StageError,
};
pub use provider::{
    CostEstimate, InferenceProvider, MockProvider, PayloadFileProvider, ProviderError,
    RetryPolicy, RetryingProvider, StandardPair, TaskSpec,
};
pub use report::{RunReport, RunStatus};
pub use store::{CommitResult, EdgeStore, MemoryEdgeStore, SqliteEdgeStore, StorageError};
pub use validate::ValidationOutcome;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
