//! Channel post risk scoring
//!
//! Two complementary engines score each post:
//!
//! - 📏 a deterministic weighted pattern-rule engine over raw text
//! - 🌲 a trainable isolation-forest anomaly model over extracted features
//!
//! `ScoringPipeline` merges both into one `ScoringResult` per message and
//! `ChannelAggregator` reduces results into per-channel summaries. The core
//! performs no I/O; callers supply `MessageRecord`s and consume the results.

pub mod aggregator;
pub mod config;
pub mod errors;
pub mod features;
pub mod model;
pub mod patterns;
pub mod pipeline;
pub mod rules;

pub use aggregator::{group_by_channel, ChannelAggregator, ChannelSummary};
pub use config::{AggregationConfig, ModelConfig, ScoringConfig};
pub use errors::{Result, ScoringError};
pub use features::{FeatureExtractor, FeatureTable, FeatureVector, MessageRecord};
pub use model::{risk_level, AnomalyModel, ModelParams, TrainedModel};
pub use patterns::{CategoryRegistry, RiskCategory, RISK_REGISTRY, SUSPICIOUS_REGISTRY};
pub use pipeline::{rank_most_anomalous, ScoringPipeline, ScoringResult};
pub use rules::{PatternRuleEngine, RiskLevel, RuleAnalysis};
