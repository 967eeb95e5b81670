//! Scoring configuration
//!
//! Serde-backed configuration with JSON file loading and environment overrides.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

use super::errors::{Result, ScoringError};
use super::model::{ModelParams, MIN_TRAINING_SAMPLES};
use super::pipeline::DEFAULT_PREVIEW_CHARS;

pub const ENV_CONTAMINATION: &str = "CHANNEL_RISK_CONTAMINATION";
pub const ENV_SEED: &str = "CHANNEL_RISK_SEED";
pub const ENV_TREES: &str = "CHANNEL_RISK_TREES";
pub const ENV_MIN_MESSAGES: &str = "CHANNEL_RISK_MIN_MESSAGES";

/// Scoring configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Anomaly model configuration
    pub model: ModelConfig,

    /// Channel aggregation configuration
    pub aggregation: AggregationConfig,
}

/// Anomaly model configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Expected anomaly fraction used to calibrate the decision offset
    pub contamination: f64,

    /// Seed for the randomized ensemble
    pub seed: u64,

    /// Number of isolation trees
    pub n_estimators: usize,

    /// Per-tree sub-sample size cap
    pub max_samples: usize,

    /// Minimum rows accepted by fit
    pub min_training_samples: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            contamination: 0.1,
            seed: 42,
            n_estimators: 100,
            max_samples: 256,
            min_training_samples: MIN_TRAINING_SAMPLES,
        }
    }
}

impl ModelConfig {
    pub fn params(&self) -> ModelParams {
        ModelParams {
            contamination: self.contamination,
            seed: self.seed,
            n_estimators: self.n_estimators,
            max_samples: self.max_samples,
            min_training_samples: self.min_training_samples,
        }
    }
}

/// Channel aggregation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Channels with fewer results are left out of summaries
    pub min_messages: usize,

    /// Length of `top_patterns`
    pub top_patterns: usize,

    /// Length of `most_anomalous`
    pub most_anomalous: usize,

    /// Characters kept in `text_preview`
    pub preview_chars: usize,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            min_messages: 5,
            top_patterns: 3,
            most_anomalous: 3,
            preview_chars: DEFAULT_PREVIEW_CHARS,
        }
    }
}

impl ScoringConfig {
    /// Load configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Defaults overridden by `CHANNEL_RISK_*` environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Override fields from `CHANNEL_RISK_*` environment variables, then validate
    pub fn apply_env(&mut self) -> Result<()> {
        if let Some(v) = env_value(ENV_CONTAMINATION)? {
            self.model.contamination = v;
        }
        if let Some(v) = env_value(ENV_SEED)? {
            self.model.seed = v;
        }
        if let Some(v) = env_value(ENV_TREES)? {
            self.model.n_estimators = v;
        }
        if let Some(v) = env_value(ENV_MIN_MESSAGES)? {
            self.aggregation.min_messages = v;
        }
        self.validate()
    }

    /// Validate configuration validity
    pub fn validate(&self) -> Result<()> {
        self.model.params().validate()?;

        if self.aggregation.min_messages == 0 {
            return Err(ScoringError::Configuration(
                "min_messages must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

fn env_value<T: FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ScoringError::Configuration(format!("{} has invalid value {:?}", key, raw))),
        Err(_) => Ok(None),
    }
}
