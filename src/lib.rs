// src/lib.rs

// Scoring core
pub mod fraud_detection;

// Collaborator-side data loading used by the binary
pub mod dataset;

pub use fraud_detection::{
    ChannelAggregator, ChannelSummary, FeatureExtractor, MessageRecord, PatternRuleEngine,
    RiskLevel, ScoringConfig, ScoringError, ScoringPipeline, ScoringResult,
};
