//! Isolation-forest anomaly model
//!
//! `TrainedModel` is an immutable value produced by a full fit: frozen z-score
//! normalization, the tree ensemble and the contamination-calibrated decision
//! offset. `AnomalyModel` holds the current trained value (if any) and swaps
//! it wholesale on re-fit, so readers see either the old or the new model.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::errors::{Result, ScoringError};
use super::features::FeatureTable;
use super::rules::RiskLevel;

/// Minimum rows required by `fit`
pub const MIN_TRAINING_SAMPLES: usize = 10;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// Std below this is treated as a constant column (scale 1.0)
const STD_FLOOR: f64 = 1e-12;

/// Fit parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    /// Expected fraction of anomalies in the training set, in (0, 0.5]
    pub contamination: f64,
    /// Seed for sub-sampling and split selection
    pub seed: u64,
    pub n_estimators: usize,
    /// Upper bound on the per-tree sub-sample size
    pub max_samples: usize,
    pub min_training_samples: usize,
}

impl Default for ModelParams {
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

impl ModelParams {
    pub fn with_contamination(mut self, contamination: f64) -> Self {
        self.contamination = contamination;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.contamination > 0.0 && self.contamination <= 0.5) {
            return Err(ScoringError::Configuration(format!(
                "contamination must be in (0, 0.5], got {}",
                self.contamination
            )));
        }
        if self.n_estimators == 0 {
            return Err(ScoringError::Configuration("n_estimators must be at least 1".to_string()));
        }
        if self.max_samples == 0 {
            return Err(ScoringError::Configuration("max_samples must be at least 1".to_string()));
        }
        if self.min_training_samples < MIN_TRAINING_SAMPLES {
            return Err(ScoringError::Configuration(format!(
                "min_training_samples must be at least {}, got {}",
                MIN_TRAINING_SAMPLES, self.min_training_samples
            )));
        }
        Ok(())
    }
}

/// Frozen z-score parameters of one column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColumnStats {
    pub mean: f64,
    /// Population std; 1.0 for constant columns
    pub std: f64,
}

impl ColumnStats {
    fn from_column(values: impl Iterator<Item = f64> + Clone) -> Self {
        let n = values.clone().count().max(1) as f64;
        let mean = values.clone().sum::<f64>() / n;
        let variance = values.map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std = variance.sqrt();
        Self {
            mean,
            std: if std < STD_FLOOR { 1.0 } else { std },
        }
    }

    pub fn normalize(&self, value: f64) -> f64 {
        (value - self.mean) / self.std
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        size: usize,
    },
}

/// One randomized partition tree; root is node 0
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationTree {
    nodes: Vec<Node>,
}

impl IsolationTree {
    fn build(data: &[Vec<f64>], sample: &[usize], max_depth: usize, rng: &mut StdRng) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.grow(data, sample, 0, max_depth, rng);
        tree
    }

    fn grow(
        &mut self,
        data: &[Vec<f64>],
        indices: &[usize],
        depth: usize,
        max_depth: usize,
        rng: &mut StdRng,
    ) -> usize {
        if indices.len() <= 1 || depth >= max_depth {
            return self.push(Node::Leaf { size: indices.len() });
        }

        // only features that still vary inside this partition can split it
        let width = data[indices[0]].len();
        let candidates: Vec<(usize, f64, f64)> = (0..width)
            .filter_map(|feature| {
                let (lo, hi) = indices.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
                    let v = data[i][feature];
                    (lo.min(v), hi.max(v))
                });
                (hi > lo).then_some((feature, lo, hi))
            })
            .collect();

        if candidates.is_empty() {
            return self.push(Node::Leaf { size: indices.len() });
        }

        let (feature, lo, hi) = candidates[rng.gen_range(0..candidates.len())];
        let threshold = rng.gen_range(lo..hi);
        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) =
            indices.iter().partition(|&&i| data[i][feature] <= threshold);

        let node = self.push(Node::Leaf { size: 0 });
        let left = self.grow(data, &left_indices, depth + 1, max_depth, rng);
        let right = self.grow(data, &right_indices, depth + 1, max_depth, rng);
        self.nodes[node] = Node::Split {
            feature,
            threshold,
            left,
            right,
        };
        node
    }

    fn push(&mut self, node: Node) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// Isolation path length of a normalized sample, including the
    /// unbuilt-subtree adjustment at the reached leaf
    pub fn path_length(&self, sample: &[f64]) -> f64 {
        let mut node = 0;
        let mut depth = 0.0;
        loop {
            match &self.nodes[node] {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if sample[*feature] <= *threshold { *left } else { *right };
                    depth += 1.0;
                }
                Node::Leaf { size } => return depth + average_path_length(*size),
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

/// Expected path length of an unsuccessful search in a random binary tree of `n` samples
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Linear-interpolated percentile, `q` in [0, 100]
fn percentile(values: &[f64], q: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let rank = (q / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}

/// Map an anomaly score to a risk level: `< -0.2` High, `< 0` Medium, else Low
pub fn risk_level(score: f64) -> RiskLevel {
    RiskLevel::from_anomaly_score(score)
}

/// Immutable trained anomaly model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    schema: Vec<String>,
    normalization: Vec<ColumnStats>,
    trees: Vec<IsolationTree>,
    sample_size: usize,
    offset: f64,
    params: ModelParams,
    training_samples: usize,
    trained_at: DateTime<Utc>,
}

impl TrainedModel {
    /// Fit normalization, ensemble and decision offset on `features`
    pub fn fit(features: &FeatureTable, params: &ModelParams) -> Result<Self> {
        params.validate()?;

        let n = features.len();
        if n < params.min_training_samples {
            warn!(
                "refusing to train anomaly model: {} rows, need {}",
                n, params.min_training_samples
            );
            return Err(ScoringError::InsufficientData {
                required: params.min_training_samples,
                actual: n,
            });
        }
        check_row_widths(features)?;

        let width = features.width();
        let normalization: Vec<ColumnStats> = (0..width)
            .map(|col| ColumnStats::from_column(features.rows.iter().map(move |row| row[col])))
            .collect();
        let data: Vec<Vec<f64>> = features
            .rows
            .iter()
            .map(|row| normalize_row(&normalization, row))
            .collect();

        let mut rng = StdRng::seed_from_u64(params.seed);
        let sample_size = params.max_samples.min(n);
        let max_depth = (sample_size as f64).log2().ceil().max(1.0) as usize;

        let trees: Vec<IsolationTree> = (0..params.n_estimators)
            .map(|_| {
                let sample = index::sample(&mut rng, n, sample_size).into_vec();
                IsolationTree::build(&data, &sample, max_depth, &mut rng)
            })
            .collect();

        let mut model = Self {
            schema: features.columns.clone(),
            normalization,
            trees,
            sample_size,
            offset: 0.0,
            params: *params,
            training_samples: n,
            trained_at: Utc::now(),
        };

        let training_scores: Vec<f64> = data.iter().map(|row| model.raw_score(row)).collect();
        model.offset = percentile(&training_scores, 100.0 * params.contamination);

        info!(
            "🤖 anomaly model trained: rows={}, trees={}, sample_size={}, offset={:.4}",
            n,
            model.trees.len(),
            sample_size,
            model.offset
        );
        Ok(model)
    }

    /// Anomaly scores and labels; negative score / `true` label = anomalous
    pub fn infer(&self, features: &FeatureTable) -> Result<(Vec<f64>, Vec<bool>)> {
        let scores = self.decision_function(features)?;
        let labels = scores.iter().map(|&s| s < 0.0).collect();
        Ok((scores, labels))
    }

    /// `score_samples - offset` per row
    pub fn decision_function(&self, features: &FeatureTable) -> Result<Vec<f64>> {
        Ok(self
            .score_samples(features)?
            .into_iter()
            .map(|s| s - self.offset)
            .collect())
    }

    /// Raw scores in [-1, 0): `-2^(-mean_path / c(sample_size))`
    pub fn score_samples(&self, features: &FeatureTable) -> Result<Vec<f64>> {
        self.check_schema(features)?;
        check_row_widths(features)?;

        let scores: Vec<f64> = features
            .rows
            .iter()
            .map(|row| self.raw_score(&normalize_row(&self.normalization, row)))
            .collect();
        debug!("scored {} rows against {} trees", scores.len(), self.trees.len());
        Ok(scores)
    }

    fn raw_score(&self, normalized: &[f64]) -> f64 {
        let total: f64 = self.trees.iter().map(|t| t.path_length(normalized)).sum();
        let mean_path = total / self.trees.len() as f64;
        let expected = average_path_length(self.sample_size);
        if expected <= 0.0 {
            return -1.0;
        }
        -(2f64.powf(-mean_path / expected))
    }

    fn check_schema(&self, features: &FeatureTable) -> Result<()> {
        if features.columns != self.schema {
            return Err(ScoringError::SchemaMismatch {
                expected: self.schema.clone(),
                actual: features.columns.clone(),
            });
        }
        Ok(())
    }

    pub fn schema(&self) -> &[String] {
        &self.schema
    }

    pub fn normalization(&self) -> &[ColumnStats] {
        &self.normalization
    }

    pub fn decision_offset(&self) -> f64 {
        self.offset
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    pub fn params(&self) -> &ModelParams {
        &self.params
    }

    pub fn training_samples(&self) -> usize {
        self.training_samples
    }

    pub fn trained_at(&self) -> DateTime<Utc> {
        self.trained_at
    }

    /// Save the trained model as JSON
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load a model saved with `save_to_file`
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let model: Self = serde_json::from_str(&content)?;
        if model.trees.is_empty() || model.normalization.len() != model.schema.len() {
            return Err(ScoringError::Configuration(format!(
                "model file {} is inconsistent",
                path.display()
            )));
        }
        Ok(model)
    }
}

fn normalize_row(normalization: &[ColumnStats], row: &[f64]) -> Vec<f64> {
    row.iter()
        .zip(normalization)
        .map(|(&v, stats)| stats.normalize(v))
        .collect()
}

fn check_row_widths(features: &FeatureTable) -> Result<()> {
    let width = features.width();
    match features.rows.iter().position(|row| row.len() != width) {
        Some(i) => Err(ScoringError::Configuration(format!(
            "row {} has {} values but the table has {} columns",
            i,
            features.rows[i].len(),
            width
        ))),
        None => Ok(()),
    }
}

/// Current anomaly model: untrained, or one immutable trained value.
///
/// A re-fit builds the new value off to the side and replaces the whole
/// `Arc` under a short write lock.
#[derive(Debug, Default)]
pub struct AnomalyModel {
    state: RwLock<Option<Arc<TrainedModel>>>,
}

impl AnomalyModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_trained(model: TrainedModel) -> Self {
        Self {
            state: RwLock::new(Some(Arc::new(model))),
        }
    }

    pub fn is_trained(&self) -> bool {
        self.state.read().is_some()
    }

    /// The trained value currently installed
    pub fn snapshot(&self) -> Option<Arc<TrainedModel>> {
        self.state.read().clone()
    }

    /// Fit and install a new model. On error the previous state is untouched.
    pub fn fit(&self, features: &FeatureTable, params: &ModelParams) -> Result<Arc<TrainedModel>> {
        let trained = TrainedModel::fit(features, params)?;
        Ok(self.install(trained))
    }

    /// Replace the installed model
    pub fn install(&self, model: TrainedModel) -> Arc<TrainedModel> {
        let model = Arc::new(model);
        *self.state.write() = Some(Arc::clone(&model));
        model
    }

    pub fn infer(&self, features: &FeatureTable) -> Result<(Vec<f64>, Vec<bool>)> {
        let model = self.snapshot().ok_or(ScoringError::NotTrained)?;
        model.infer(features)
    }
}
