//! Inference provider adapters
//!
//! Providers are interchangeable oracles with a name, a cost, and a
//! reliability weight. The core only sees validated `Proposal` records;
//! raw payloads stop at the parse boundary.

mod file;
mod mock;
mod parse;
mod retry;
mod traits;

pub use file::PayloadFileProvider;
pub use mock::{MockProvider, ScriptedResponse};
pub use parse::parse_payload;
pub use retry::RetryPolicy;
pub use traits::{
    CostEstimate, InferenceProvider, ProviderError, RetryingProvider, StandardPair, TaskSpec,
};
