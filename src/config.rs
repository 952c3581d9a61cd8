//! Run configuration
//!
//! YAML file plus CLI overrides. The config owns every tunable of a
//! run: pipeline knobs, merge thresholds, and the provider roster.

use crate::merge::MergeConfig;
use crate::model::RelationType;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("unknown relation type in config: {0}")]
    UnknownRelation(String),
}

fn default_max_concurrent_calls() -> usize {
    4
}

fn default_batch_size() -> usize {
    25
}

/// One provider entry in the roster.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSpec {
    pub id: String,
    /// Reliability weight in [0, 1]
    pub weight: f64,
    /// JSON payload file replayed as this provider's output
    pub payload_file: PathBuf,
}

/// Everything a run needs, deserialized from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Stage name to resume from; None means a fresh run
    #[serde(default)]
    pub resume_from: Option<String>,

    #[serde(default)]
    pub dry_run: bool,

    /// Acceptance threshold overrides, keyed by relation type name
    #[serde(default)]
    pub thresholds: std::collections::BTreeMap<String, f64>,

    /// Base weight overrides, keyed by relation type name
    #[serde(default)]
    pub base_weights: std::collections::BTreeMap<String, f64>,

    #[serde(default = "default_max_concurrent_calls")]
    pub max_concurrent_calls: usize,

    /// Abort-threshold for cumulative provider cost; None means unlimited
    #[serde(default)]
    pub cost_limit: Option<f64>,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Edge database path; defaults to the platform data directory
    #[serde(default)]
    pub db_path: Option<PathBuf>,

    /// Checkpoint database path; defaults next to the edge database
    #[serde(default)]
    pub checkpoint_path: Option<PathBuf>,

    /// Free-text framing passed to providers with each batch
    #[serde(default)]
    pub task_instructions: String,

    #[serde(default)]
    pub providers: Vec<ProviderSpec>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            resume_from: None,
            dry_run: false,
            thresholds: Default::default(),
            base_weights: Default::default(),
            max_concurrent_calls: default_max_concurrent_calls(),
            cost_limit: None,
            batch_size: default_batch_size(),
            db_path: None,
            checkpoint_path: None,
            task_instructions: String::new(),
            providers: Vec::new(),
        }
    }
}

impl RunConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path.as_ref()).map_err(|source| ConfigError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        })?;
        Ok(serde_yaml::from_str(&raw)?)
    }

    /// Build the merge configuration: defaults overlaid with any
    /// per-type overrides from the file.
    pub fn merge_config(&self) -> Result<MergeConfig, ConfigError> {
        let mut config = MergeConfig::default();
        for (name, value) in &self.thresholds {
            let relation = RelationType::parse(name)
                .map_err(|_| ConfigError::UnknownRelation(name.clone()))?;
            config.thresholds.insert(relation, *value);
        }
        for (name, value) in &self.base_weights {
            let relation = RelationType::parse(name)
                .map_err(|_| ConfigError::UnknownRelation(name.clone()))?;
            config.base_weights.insert(relation, *value);
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn config_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn minimal_config_gets_defaults() {
        let file = config_file("providers: []\n");
        let config = RunConfig::load(file.path()).unwrap();
        assert_eq!(config.max_concurrent_calls, 4);
        assert_eq!(config.batch_size, 25);
        assert!(config.cost_limit.is_none());
        assert!(!config.dry_run);
    }

    #[test]
    fn default_matches_deserialized_defaults() {
        let config = RunConfig::default();
        assert_eq!(config.max_concurrent_calls, 4);
        assert_eq!(config.batch_size, 25);
    }

    #[test]
    fn threshold_overrides_apply() {
        let file = config_file(
            "thresholds:\n  prerequisite: 0.9\nbase_weights:\n  similar_to: 0.3\n",
        );
        let config = RunConfig::load(file.path()).unwrap();
        let merge = config.merge_config().unwrap();
        assert_eq!(merge.threshold(RelationType::Prerequisite), 0.9);
        assert_eq!(merge.base_weight(RelationType::SimilarTo), 0.3);
        // Untouched entries keep defaults
        assert_eq!(merge.threshold(RelationType::DomainBridge), 0.50);
    }

    #[test]
    fn unknown_relation_in_overrides_rejected() {
        let file = config_file("thresholds:\n  friendship: 0.9\n");
        let config = RunConfig::load(file.path()).unwrap();
        assert!(matches!(
            config.merge_config(),
            Err(ConfigError::UnknownRelation(_))
        ));
    }

    #[test]
    fn unknown_top_level_field_rejected() {
        let file = config_file("no_such_knob: true\n");
        assert!(matches!(
            RunConfig::load(file.path()),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn provider_roster_parses() {
        let file = config_file(
            r#"
providers:
  - id: gemini
    weight: 1.0
    payload_file: /tmp/gemini.json
  - id: claude
    weight: 0.9
    payload_file: /tmp/claude.json
cost_limit: 5.0
resume_from: merge
"#,
        );
        let config = RunConfig::load(file.path()).unwrap();
        assert_eq!(config.providers.len(), 2);
        assert_eq!(config.providers[1].id, "claude");
        assert_eq!(config.cost_limit, Some(5.0));
        assert_eq!(config.resume_from.as_deref(), Some("merge"));
    }
}
