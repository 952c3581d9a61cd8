//! Strand CLI — curriculum knowledge-graph construction pipeline.
//!
//! Usage:
//!   strand run --catalog standards.json [--config run.yaml] [--resume-from stage]
//!   strand edges [--db path]

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use strand::pipeline::stages::{
    CandidateStage, InferenceStage, MergeStage, PersistStage, ValidateStage,
};
use strand::{
    CatalogRecord, CheckpointLog, EdgeStore, InferenceProvider, NodeCatalog, PayloadFileProvider,
    Pipeline, RelationType, RetryPolicy, RetryingProvider, RunConfig, RunContext, RunOptions,
    RunReport, RunStatus, SqliteEdgeStore, Stage, TaskSpec,
};

#[derive(Parser)]
#[command(
    name = "strand",
    version,
    about = "Curriculum knowledge-graph construction pipeline"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the construction pipeline
    Run {
        /// Catalog file: JSON array of standard records
        #[arg(long)]
        catalog: PathBuf,
        /// YAML run configuration
        #[arg(long)]
        config: Option<PathBuf>,
        /// Resume from this stage instead of starting fresh
        #[arg(long)]
        resume_from: Option<String>,
        /// Estimate provider cost without executing anything
        #[arg(long)]
        dry_run: bool,
        /// Path to the edge database
        #[arg(long)]
        db: Option<PathBuf>,
        /// Path to the checkpoint database
        #[arg(long)]
        checkpoints: Option<PathBuf>,
        /// Maximum concurrent provider calls
        #[arg(long)]
        max_concurrent_calls: Option<usize>,
        /// Cumulative provider cost limit
        #[arg(long)]
        cost_limit: Option<f64>,
        /// Pairs per provider batch
        #[arg(long)]
        batch_size: Option<usize>,
        /// Write the JSON run report here
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Show what the edge database currently holds
    Edges {
        /// Path to the edge database
        #[arg(long)]
        db: Option<PathBuf>,
    },
}

/// Default database path (~/.local/share/strand/edges.db)
fn default_db_path() -> PathBuf {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".local/share"));
    let strand_dir = data_dir.join("strand");
    std::fs::create_dir_all(&strand_dir).ok();
    strand_dir.join("edges.db")
}

fn default_checkpoint_path(db_path: &PathBuf) -> PathBuf {
    db_path.with_file_name("checkpoints.db")
}

fn load_catalog(path: &PathBuf) -> Result<Arc<NodeCatalog>, String> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read catalog '{}': {}", path.display(), e))?;
    let records: Vec<CatalogRecord> = serde_json::from_str(&raw)
        .map_err(|e| format!("malformed catalog '{}': {}", path.display(), e))?;
    let catalog = NodeCatalog::from_records(records)
        .map_err(|e| format!("invalid catalog '{}': {}", path.display(), e))?;
    Ok(Arc::new(catalog))
}

fn build_providers(
    config: &RunConfig,
    catalog: &Arc<NodeCatalog>,
) -> Result<Vec<Arc<dyn InferenceProvider>>, String> {
    let mut providers: Vec<Arc<dyn InferenceProvider>> = Vec::with_capacity(config.providers.len());
    for spec in &config.providers {
        let provider =
            PayloadFileProvider::load(&spec.id, spec.weight, &spec.payload_file, catalog)
                .map_err(|e| e.to_string())?;
        providers.push(Arc::new(RetryingProvider::new(
            provider,
            RetryPolicy::default(),
        )));
    }
    Ok(providers)
}

fn print_summary(report: &RunReport) {
    match report.status {
        RunStatus::DryRun => {
            if let Some(estimate) = &report.estimate {
                println!(
                    "Dry run: {} provider calls, estimated cost {:.4}",
                    estimate.calls, estimate.cost
                );
            }
            for stage in &report.stages {
                println!("  {:<12} {}", stage.name, stage.output);
            }
        }
        RunStatus::Failed => {
            eprintln!(
                "Run {} failed at stage '{}': {}",
                report.run_id,
                report.failed_stage.as_deref().unwrap_or("?"),
                report.error.as_deref().unwrap_or("unknown error")
            );
        }
        _ => {
            println!(
                "Run {}: {} accepted, {} needs review, {} rejected (cost {:.4})",
                report.run_id,
                report.edges.accepted,
                report.edges.needs_review,
                report.edges.rejected,
                report.total_cost
            );
            for finding in report.findings.iter().filter(|f| !f.resolved) {
                println!(
                    "  finding: {:?} ({:?}){}",
                    finding.kind,
                    finding.severity,
                    finding
                        .note
                        .as_deref()
                        .map(|n| format!(": {}", n))
                        .unwrap_or_default()
                );
            }
        }
    }
}

async fn cmd_run(
    catalog_path: PathBuf,
    config_path: Option<PathBuf>,
    resume_from: Option<String>,
    dry_run: bool,
    db: Option<PathBuf>,
    checkpoints: Option<PathBuf>,
    max_concurrent_calls: Option<usize>,
    cost_limit: Option<f64>,
    batch_size: Option<usize>,
    report_path: Option<PathBuf>,
) -> i32 {
    let mut config = match config_path {
        Some(path) => match RunConfig::load(&path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error: {}", e);
                return 1;
            }
        },
        None => RunConfig::default(),
    };

    // CLI flags override the file.
    if resume_from.is_some() {
        config.resume_from = resume_from;
    }
    if dry_run {
        config.dry_run = true;
    }
    if let Some(v) = max_concurrent_calls {
        config.max_concurrent_calls = v;
    }
    if cost_limit.is_some() {
        config.cost_limit = cost_limit;
    }
    if let Some(v) = batch_size {
        config.batch_size = v;
    }
    if db.is_some() {
        config.db_path = db;
    }
    if checkpoints.is_some() {
        config.checkpoint_path = checkpoints;
    }

    let catalog = match load_catalog(&catalog_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    let merge_config = match config.merge_config() {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    let providers = match build_providers(&config, &catalog) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    let db_path = config.db_path.clone().unwrap_or_else(default_db_path);
    let checkpoint_path = config
        .checkpoint_path
        .clone()
        .unwrap_or_else(|| default_checkpoint_path(&db_path));

    let store = match SqliteEdgeStore::open(&db_path) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            eprintln!("Error: cannot open edge database: {}", e);
            return 1;
        }
    };
    let checkpoint_log = match CheckpointLog::open(&checkpoint_path) {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Error: cannot open checkpoint database: {}", e);
            return 1;
        }
    };

    let task = TaskSpec::new(RelationType::ALL.to_vec(), config.task_instructions.clone());
    let stages: Vec<Box<dyn Stage>> = vec![
        Box::new(CandidateStage),
        Box::new(InferenceStage::new(providers, task, config.batch_size)),
        Box::new(MergeStage::new(merge_config)),
        Box::new(ValidateStage),
        Box::new(PersistStage::new(store)),
    ];
    let pipeline = Pipeline::new(stages, catalog, checkpoint_log);

    let ctx = Arc::new(RunContext::new(
        config.max_concurrent_calls,
        config.cost_limit,
    ));
    let options = RunOptions {
        resume_from: config.resume_from.clone(),
        dry_run: config.dry_run,
    };

    let report = match pipeline.run(ctx, &options).await {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    if let Some(path) = report_path {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&path, json) {
                    eprintln!("Warning: cannot write report to '{}': {}", path.display(), e);
                }
            }
            Err(e) => eprintln!("Warning: cannot serialize report: {}", e),
        }
    }

    print_summary(&report);
    match report.status {
        RunStatus::Success | RunStatus::DryRun => 0,
        RunStatus::CompletedWithFindings => 2,
        RunStatus::Failed => 1,
    }
}

fn cmd_edges(db: Option<PathBuf>) -> i32 {
    let db_path = db.unwrap_or_else(default_db_path);
    let store = match SqliteEdgeStore::open(&db_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: cannot open edge database: {}", e);
            return 1;
        }
    };
    let edges = match store.load_edges() {
        Ok(e) => e,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    if edges.is_empty() {
        println!("No edges stored.");
        return 0;
    }
    println!("{:<40}  {:>10}  {:>8}  {:<12}", "EDGE", "CONFIDENCE", "WEIGHT", "STATUS");
    println!("{}", "-".repeat(76));
    for edge in edges {
        println!(
            "{:<40}  {:>10.3}  {:>8.3}  {:<12}",
            edge.key.to_string(),
            edge.final_confidence,
            edge.weight,
            format!("{:?}", edge.status)
        );
    }
    0
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("strand=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let code = match cli.command {
        Commands::Run {
            catalog,
            config,
            resume_from,
            dry_run,
            db,
            checkpoints,
            max_concurrent_calls,
            cost_limit,
            batch_size,
            report,
        } => {
            cmd_run(
                catalog,
                config,
                resume_from,
                dry_run,
                db,
                checkpoints,
                max_concurrent_calls,
                cost_limit,
                batch_size,
                report,
            )
            .await
        }
        Commands::Edges { db } => cmd_edges(db),
    };
    std::process::exit(code);
}
