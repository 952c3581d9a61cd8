//! Pipeline controller — stage ordering, checkpoints, resume, dry runs

use super::checkpoint::CheckpointLog;
use super::context::RunContext;
use super::stage::{Stage, StageData, StageError};
use crate::catalog::NodeCatalog;
use crate::provider::CostEstimate;
use crate::report::{EdgeCounts, RunReport, RunStatus, StageSummary};
use crate::store::StorageError;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

/// Errors raised by the controller itself. Stage failures are reported
/// through [`RunStatus::Failed`] instead, so a partial run still yields
/// a report.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("unknown stage: {0}")]
    UnknownStage(String),

    #[error("cannot resume from '{stage}': no valid checkpoint for predecessor '{predecessor}'")]
    MissingCheckpoint {
        stage: String,
        predecessor: String,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// How a run should execute.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Re-run starting at this stage, seeded from the predecessor's
    /// checkpoint. Checkpoints strictly after the resume point are
    /// invalidated first.
    pub resume_from: Option<String>,
    /// Estimate provider cost without executing anything.
    pub dry_run: bool,
}

/// The staged construction pipeline.
///
/// Stages run strictly in order; each completed stage is checkpointed
/// before the next begins. A failed stage leaves every earlier
/// checkpoint intact, so the run can be resumed from the failure point.
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
    catalog: Arc<NodeCatalog>,
    checkpoints: CheckpointLog,
}

impl Pipeline {
    pub fn new(
        stages: Vec<Box<dyn Stage>>,
        catalog: Arc<NodeCatalog>,
        checkpoints: CheckpointLog,
    ) -> Self {
        Self {
            stages,
            catalog,
            checkpoints,
        }
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Execute the pipeline and produce a run report.
    pub async fn run(
        &self,
        ctx: Arc<RunContext>,
        options: &RunOptions,
    ) -> Result<RunReport, PipelineError> {
        if options.dry_run {
            return Ok(self.dry_run(&ctx));
        }

        let (start, mut data) = self.resume_point(options)?;
        let mut report = RunReport::new(ctx.run_id, RunStatus::Success);

        for stage in &self.stages[start..] {
            let name = stage.name().to_string();
            info!(stage = %name, input = %data.describe(), "stage starting");

            data = match stage.execute(data, &self.catalog, Arc::clone(&ctx)).await {
                Ok(output) => output,
                Err(err) => {
                    error!(stage = %name, error = %err, "stage failed");
                    return Ok(self.failed(report, ctx, name, err));
                }
            };

            self.checkpoints.append(ctx.run_id, &name, &data)?;
            report.stages.push(StageSummary {
                name,
                output: data.describe(),
            });
            self.harvest(&mut report, &data);
        }

        report.usage = ctx.usage();
        report.total_cost = ctx.total_cost();
        Ok(report)
    }

    /// Sum stage estimates without touching providers or storage.
    fn dry_run(&self, ctx: &RunContext) -> RunReport {
        let mut total = CostEstimate::default();
        let mut report = RunReport::new(ctx.run_id, RunStatus::DryRun);
        for stage in &self.stages {
            let estimate = stage.estimate(&self.catalog);
            report.stages.push(StageSummary {
                name: stage.name().to_string(),
                output: format!("estimated {} calls, {:.4} cost", estimate.calls, estimate.cost),
            });
            total.add(estimate);
        }
        report.estimate = Some(total);
        report
    }

    /// Resolve the starting stage index and its input artifact.
    fn resume_point(&self, options: &RunOptions) -> Result<(usize, StageData), PipelineError> {
        let Some(resume_from) = options.resume_from.as_deref() else {
            return Ok((0, StageData::Empty));
        };

        let idx = self
            .stages
            .iter()
            .position(|s| s.name() == resume_from)
            .ok_or_else(|| PipelineError::UnknownStage(resume_from.to_string()))?;

        // Downstream checkpoints describe work that is about to be
        // redone; invalidate them so nothing stale survives the re-run.
        // The resume stage's own checkpoint is superseded when it
        // re-completes.
        let stale: Vec<&str> = self.stages[idx + 1..].iter().map(|s| s.name()).collect();
        let invalidated = self.checkpoints.invalidate(&stale)?;
        info!(
            resume_from,
            invalidated, "resuming: downstream checkpoints invalidated"
        );

        if idx == 0 {
            return Ok((0, StageData::Empty));
        }

        let predecessor = self.stages[idx - 1].name();
        let checkpoint = self.checkpoints.latest(predecessor)?.ok_or_else(|| {
            PipelineError::MissingCheckpoint {
                stage: resume_from.to_string(),
                predecessor: predecessor.to_string(),
            }
        })?;
        Ok((idx, checkpoint.artifact))
    }

    /// Pull edge counts, findings and the commit result out of stage
    /// artifacts as they flow past.
    fn harvest(&self, report: &mut RunReport, data: &StageData) {
        match data {
            StageData::Merged(outcome) => {
                report.edges.rejected = outcome.rejected.len();
            }
            StageData::Validated(outcome) => {
                let rejected = report.edges.rejected;
                report.edges = EdgeCounts::tally(outcome.clean.iter().map(|e| e.status));
                report.edges.rejected = rejected;
                report.findings = outcome.findings.clone();
                if !outcome.is_clean() {
                    report.status = RunStatus::CompletedWithFindings;
                }
            }
            StageData::Committed(result) => {
                report.commit = Some(*result);
            }
            _ => {}
        }
    }

    fn failed(
        &self,
        mut report: RunReport,
        ctx: Arc<RunContext>,
        stage: String,
        err: StageError,
    ) -> RunReport {
        report.status = RunStatus::Failed;
        report.failed_stage = Some(stage);
        report.error = Some(err.to_string());
        report.usage = ctx.usage();
        report.total_cost = ctx.total_cost();
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogRecord;
    use crate::merge::MergeConfig;
    use crate::model::RelationType;
    use crate::pipeline::stages::{
        CandidateStage, InferenceStage, MergeStage, PersistStage, ValidateStage, STAGE_MERGE,
    };
    use crate::provider::{InferenceProvider, MockProvider, TaskSpec};
    use crate::store::{EdgeStore, MemoryEdgeStore};

    fn catalog() -> Arc<NodeCatalog> {
        Arc::new(
            NodeCatalog::from_records(vec![
                CatalogRecord {
                    code: "M1-NUM-01".to_string(),
                    grade_band: 1,
                    domain: "number".to_string(),
                    content_group: Some("counting".to_string()),
                    ordinal: 1,
                },
                CatalogRecord {
                    code: "M1-NUM-02".to_string(),
                    grade_band: 1,
                    domain: "number".to_string(),
                    content_group: Some("counting".to_string()),
                    ordinal: 2,
                },
                CatalogRecord {
                    code: "M2-NUM-01".to_string(),
                    grade_band: 2,
                    domain: "number".to_string(),
                    content_group: Some("counting".to_string()),
                    ordinal: 1,
                },
            ])
            .unwrap(),
        )
    }

    fn pipeline(store: Arc<dyn EdgeStore>) -> Pipeline {
        let provider: Arc<dyn InferenceProvider> = Arc::new(MockProvider::new("mock", 0.8));
        let stages: Vec<Box<dyn Stage>> = vec![
            Box::new(CandidateStage),
            Box::new(InferenceStage::new(
                vec![provider],
                TaskSpec::new(RelationType::ALL.to_vec(), "test"),
                10,
            )),
            Box::new(MergeStage::new(MergeConfig::default())),
            Box::new(ValidateStage),
            Box::new(PersistStage::new(store)),
        ];
        Pipeline::new(stages, catalog(), CheckpointLog::open_in_memory().unwrap())
    }

    #[tokio::test]
    async fn full_run_commits_and_checkpoints() {
        let store = Arc::new(MemoryEdgeStore::new());
        let pipeline = pipeline(store.clone());
        let ctx = Arc::new(RunContext::new(2, None));

        let report = pipeline.run(ctx, &RunOptions::default()).await.unwrap();

        assert_eq!(report.status, RunStatus::Success);
        assert_eq!(report.stages.len(), 5);
        assert!(report.commit.is_some());
        assert!(store.edge_count().unwrap() > 0);
        for name in pipeline.stage_names() {
            assert!(pipeline.checkpoints.has_valid(name).unwrap());
        }
    }

    #[tokio::test]
    async fn dry_run_executes_nothing() {
        let store = Arc::new(MemoryEdgeStore::new());
        let pipeline = pipeline(store.clone());
        let ctx = Arc::new(RunContext::new(2, None));

        let report = pipeline
            .run(
                ctx,
                &RunOptions {
                    dry_run: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(report.status, RunStatus::DryRun);
        assert!(report.estimate.is_some());
        assert_eq!(store.edge_count().unwrap(), 0);
        assert!(!pipeline.checkpoints.has_valid("candidates").unwrap());
    }

    #[tokio::test]
    async fn resume_requires_predecessor_checkpoint() {
        let store = Arc::new(MemoryEdgeStore::new());
        let pipeline = pipeline(store);
        let ctx = Arc::new(RunContext::new(2, None));

        let err = pipeline
            .run(
                ctx,
                &RunOptions {
                    resume_from: Some(STAGE_MERGE.to_string()),
                    dry_run: false,
                },
            )
            .await;

        assert!(matches!(err, Err(PipelineError::MissingCheckpoint { .. })));
    }

    #[tokio::test]
    async fn resume_reruns_from_checkpoint() {
        let store = Arc::new(MemoryEdgeStore::new());
        let pipeline = pipeline(store.clone());

        let first = pipeline
            .run(Arc::new(RunContext::new(2, None)), &RunOptions::default())
            .await
            .unwrap();
        let committed = store.load_edges().unwrap();

        let resumed = pipeline
            .run(
                Arc::new(RunContext::new(2, None)),
                &RunOptions {
                    resume_from: Some(STAGE_MERGE.to_string()),
                    dry_run: false,
                },
            )
            .await
            .unwrap();

        assert_eq!(resumed.status, RunStatus::Success);
        assert_eq!(resumed.stages.len(), 3); // merge, validate, persist
        assert_eq!(store.load_edges().unwrap(), committed);
        assert_eq!(resumed.edges.accepted, first.edges.accepted);
    }

    #[tokio::test]
    async fn unknown_resume_stage_is_an_error() {
        let store = Arc::new(MemoryEdgeStore::new());
        let pipeline = pipeline(store);

        let err = pipeline
            .run(
                Arc::new(RunContext::new(2, None)),
                &RunOptions {
                    resume_from: Some("nonsense".to_string()),
                    dry_run: false,
                },
            )
            .await;

        assert!(matches!(err, Err(PipelineError::UnknownStage(_))));
    }
}
