//! Common test utilities for pipeline integration tests
//!
//! Fixture catalogs, proposal builders and pre-wired pipelines so each
//! test file only spells out what it actually varies.

#![allow(dead_code)]

use std::sync::Arc;
use strand::pipeline::stages::{
    CandidateStage, InferenceStage, MergeStage, PersistStage, ValidateStage,
};
use strand::{
    CatalogRecord, CheckpointLog, EdgeStore, InferenceProvider, MergeConfig, MockProvider,
    NodeCatalog, Pipeline, Proposal, RelationType, Stage, StandardCode, TaskSpec,
};

/// A small catalog spanning two domains and two grade bands, with a
/// shared content group to exercise adjacency, precedence and bridge
/// pair generation.
pub fn fixture_catalog() -> Arc<NodeCatalog> {
    Arc::new(
        NodeCatalog::from_records(vec![
            record("M1-NUM-01", 1, "number", Some("counting"), 1),
            record("M1-NUM-02", 1, "number", Some("counting"), 2),
            record("M2-NUM-01", 2, "number", Some("counting"), 1),
            record("M2-NUM-02", 2, "number", Some("fractions"), 2),
            record("M1-GEO-01", 1, "geometry", Some("shapes"), 1),
            record("M2-GEO-01", 2, "geometry", Some("shapes"), 1),
        ])
        .unwrap(),
    )
}

pub fn record(
    code: &str,
    grade_band: u8,
    domain: &str,
    content_group: Option<&str>,
    ordinal: u32,
) -> CatalogRecord {
    CatalogRecord {
        code: code.to_string(),
        grade_band,
        domain: domain.to_string(),
        content_group: content_group.map(String::from),
        ordinal,
    }
}

pub fn proposal(
    source: &str,
    target: &str,
    relation: RelationType,
    confidence: f64,
    provider_id: &str,
    weight: f64,
) -> Proposal {
    Proposal::new(
        StandardCode::parse(source).unwrap(),
        StandardCode::parse(target).unwrap(),
        relation,
        confidence,
        "test fixture",
        provider_id,
        weight,
    )
    .unwrap()
}

pub fn task() -> TaskSpec {
    TaskSpec::new(RelationType::ALL.to_vec(), "integration test")
}

/// Full five-stage pipeline over the fixture catalog with the given
/// providers and store, checkpointing in memory.
pub fn build_pipeline(
    catalog: Arc<NodeCatalog>,
    providers: Vec<Arc<dyn InferenceProvider>>,
    store: Arc<dyn EdgeStore>,
) -> Pipeline {
    build_pipeline_with_log(
        catalog,
        providers,
        store,
        CheckpointLog::open_in_memory().unwrap(),
    )
}

/// Same as [`build_pipeline`] but with an explicit checkpoint log, so
/// tests can share one log across pipeline instances.
pub fn build_pipeline_with_log(
    catalog: Arc<NodeCatalog>,
    providers: Vec<Arc<dyn InferenceProvider>>,
    store: Arc<dyn EdgeStore>,
    log: CheckpointLog,
) -> Pipeline {
    let stages: Vec<Box<dyn Stage>> = vec![
        Box::new(CandidateStage),
        Box::new(InferenceStage::new(providers, task(), 10)),
        Box::new(MergeStage::new(MergeConfig::default())),
        Box::new(ValidateStage),
        Box::new(PersistStage::new(store)),
    ];
    Pipeline::new(stages, catalog, log)
}

/// A provider that replays the same proposal set on every scripted call.
pub fn scripted_provider(
    id: &str,
    weight: f64,
    proposals: Vec<Proposal>,
    calls: usize,
) -> Arc<dyn InferenceProvider> {
    let mut provider = MockProvider::new(id, weight);
    for _ in 0..calls {
        provider = provider.with_proposals(proposals.clone());
    }
    Arc::new(provider)
}
