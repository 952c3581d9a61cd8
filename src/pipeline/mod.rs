//! Staged pipeline: candidates -> inference -> merge -> validate -> persist
//!
//! The controller owns stage ordering, checkpointing and resume; stages
//! own their semantics and nothing else.

mod checkpoint;
mod context;
mod controller;
mod stage;
pub mod stages;

pub use checkpoint::{CheckpointLog, StageCheckpoint};
pub use context::{CancellationToken, RunContext};
pub use controller::{Pipeline, PipelineError, RunOptions};
pub use stage::{Stage, StageData, StageError};
