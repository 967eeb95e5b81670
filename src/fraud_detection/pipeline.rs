//! Scoring pipeline - main entry
//!
//! Runs the rule engine on every message and, once a model is trained, the
//! anomaly model as well, merging both into one `ScoringResult`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use super::aggregator::{ChannelAggregator, ChannelSummary};
use super::config::ScoringConfig;
use super::errors::Result;
use super::features::{FeatureExtractor, MessageRecord};
use super::model::{risk_level, AnomalyModel, ModelParams, TrainedModel};
use super::patterns::SUSPICIOUS_REGISTRY;
use super::rules::{PatternRuleEngine, RiskLevel};

/// Default length of `ScoringResult::text_preview`, in characters
pub const DEFAULT_PREVIEW_CHARS: usize = 200;

/// Combined verdict for one message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringResult {
    pub message_id: i64,
    pub channel: String,
    pub timestamp: Option<String>,
    pub text_preview: String,

    // === rule engine ===
    pub rule_risk_score: f64,
    pub rule_risk_level: RiskLevel,
    pub detected_products: Vec<String>,
    pub risk_factors: Vec<String>,
    pub confidence: f64,

    // === anomaly model, absent while untrained ===
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anomaly_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_anomaly: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anomaly_risk_level: Option<RiskLevel>,

    /// Suspicious-pattern categories present in the text, registry order
    pub matched_categories: Vec<String>,
}

/// Scoring pipeline
#[derive(Debug)]
pub struct ScoringPipeline {
    extractor: FeatureExtractor,
    rule_engine: PatternRuleEngine,
    model: AnomalyModel,
    params: ModelParams,
    aggregator: ChannelAggregator,
    preview_chars: usize,
}

impl ScoringPipeline {
    pub fn new() -> Self {
        Self::with_config(&ScoringConfig::default())
    }

    pub fn with_config(config: &ScoringConfig) -> Self {
        Self {
            extractor: FeatureExtractor::new(),
            rule_engine: PatternRuleEngine::new(),
            model: AnomalyModel::new(),
            params: config.model.params(),
            aggregator: ChannelAggregator::with_config(&config.aggregation),
            preview_chars: config.aggregation.preview_chars,
        }
    }

    /// Start from an already trained model
    pub fn with_model(mut self, model: TrainedModel) -> Self {
        self.model = AnomalyModel::from_trained(model);
        self
    }

    pub fn model(&self) -> &AnomalyModel {
        &self.model
    }

    pub fn params(&self) -> &ModelParams {
        &self.params
    }

    pub fn aggregator(&self) -> &ChannelAggregator {
        &self.aggregator
    }

    pub fn is_trained(&self) -> bool {
        self.model.is_trained()
    }

    /// Extract features from `messages` and fit a fresh model over them.
    /// The previous model, if any, stays installed when this fails.
    pub fn fit(&self, messages: &[MessageRecord]) -> Result<Arc<TrainedModel>> {
        let table = self.extractor.extract(messages);
        self.model.fit(&table, &self.params)
    }

    /// Score one message; its id defaults to 0
    pub fn analyze(&self, message: &MessageRecord) -> Result<ScoringResult> {
        let mut results = self.analyze_batch(std::slice::from_ref(message))?;
        Ok(results.remove(0))
    }

    /// Score messages in input order. Ids default to the batch position.
    pub fn analyze_batch(&self, messages: &[MessageRecord]) -> Result<Vec<ScoringResult>> {
        // one snapshot for the whole batch
        let anomaly = match self.model.snapshot() {
            Some(model) => Some(model.infer(&self.extractor.extract(messages))?),
            None => None,
        };

        let results: Vec<ScoringResult> = messages
            .iter()
            .enumerate()
            .map(|(idx, message)| {
                let scored = anomaly
                    .as_ref()
                    .map(|(scores, labels)| (scores[idx], labels[idx]));
                self.build_result(idx, message, scored)
            })
            .collect();

        debug!(
            "analyzed {} messages (anomaly model {})",
            results.len(),
            if anomaly.is_some() { "applied" } else { "untrained" }
        );
        Ok(results)
    }

    fn build_result(&self, position: usize, message: &MessageRecord, scored: Option<(f64, bool)>) -> ScoringResult {
        let (rule_risk_score, detected_products, risk_factors) =
            self.rule_engine.calculate_risk_score(&message.text);
        let matched_categories = SUSPICIOUS_REGISTRY
            .matched(&message.text)
            .iter()
            .map(|c| c.name.to_string())
            .collect();

        ScoringResult {
            message_id: message.id.unwrap_or(position as i64),
            channel: message.channel.clone(),
            timestamp: message.timestamp.clone(),
            text_preview: text_preview(&message.text, self.preview_chars),
            rule_risk_score,
            rule_risk_level: self.rule_engine.get_risk_level(rule_risk_score),
            detected_products,
            risk_factors,
            confidence: self.rule_engine.confidence(rule_risk_score),
            anomaly_score: scored.map(|(score, _)| score),
            is_anomaly: scored.map(|(_, label)| label),
            anomaly_risk_level: scored.map(|(score, _)| risk_level(score)),
            matched_categories,
        }
    }

    /// Score and summarise each channel. Channels below the aggregator's
    /// `min_messages` are skipped without being scored.
    pub fn analyze_channel_behavior(
        &self,
        channel_messages: &BTreeMap<String, Vec<MessageRecord>>,
    ) -> Result<BTreeMap<String, ChannelSummary>> {
        let mut grouped = BTreeMap::new();
        for (channel, messages) in channel_messages {
            if messages.len() < self.aggregator.min_messages() {
                continue;
            }
            grouped.insert(channel.clone(), self.analyze_batch(messages)?);
        }

        let summaries = self.aggregator.aggregate(&grouped)?;
        info!(
            "📊 channel analysis: {} of {} channels summarised",
            summaries.len(),
            channel_messages.len()
        );
        Ok(summaries)
    }
}

impl Default for ScoringPipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Results sorted most anomalous first (ascending `anomaly_score`).
/// Unscored results go last; the input is left untouched.
pub fn rank_most_anomalous(results: &[ScoringResult]) -> Vec<ScoringResult> {
    let mut ranked = results.to_vec();
    ranked.sort_by(|a, b| match (a.anomaly_score, b.anomaly_score) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    ranked
}

/// First `max_chars` characters, with `...` appended when truncated
pub fn text_preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn training_messages() -> Vec<MessageRecord> {
        let mut messages: Vec<MessageRecord> = (0..20)
            .map(|i| {
                MessageRecord::new(format!("Normal message {} about medical products", i))
                    .with_id(i)
                    .with_channel("@test_channel")
                    .with_timestamp("2024-01-01T12:00:00Z")
            })
            .collect();
        messages.push(
            MessageRecord::new("URGENT!!! 100% GUARANTEED PROFIT!!! LIMITED TIME OFFER!!! DM ME NOW!!!")
                .with_id(100)
                .with_channel("@suspicious_channel")
                .with_timestamp("2024-01-01T12:00:00Z")
                .with_media(true),
        );
        messages.push(
            MessageRecord::new("Miracle cure! Instant healing! Call now for special discount!")
                .with_id(101)
                .with_channel("@medical_scam")
                .with_timestamp("2024-01-01T12:00:00Z"),
        );
        messages
    }

    #[test]
    fn test_untrained_results_omit_anomaly_fields() {
        let pipeline = ScoringPipeline::new();
        let result = pipeline
            .analyze(&MessageRecord::new("We have paracetamol and ibuprofen tablets available."))
            .unwrap();

        assert_eq!(result.message_id, 0);
        assert_eq!(result.channel, "unknown");
        assert!(result.anomaly_score.is_none());
        assert!(result.is_anomaly.is_none());
        assert!(result.anomaly_risk_level.is_none());
        assert!(result.detected_products.contains(&"paracetamol".to_string()));

        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("anomaly_score").is_none());
    }

    #[test]
    fn test_trained_results_carry_anomaly_fields() {
        let pipeline = ScoringPipeline::new();
        pipeline.fit(&training_messages()).unwrap();
        assert!(pipeline.is_trained());

        let results = pipeline.analyze_batch(&training_messages()).unwrap();
        assert_eq!(results.len(), 22);
        assert!(results.iter().all(|r| r.anomaly_score.is_some()));
        assert_eq!(results[20].message_id, 100);
        assert_eq!(results[20].matched_categories[0], "urgency");
    }

    #[test]
    fn test_rule_fields_match_rule_engine() {
        let text = "Guaranteed profit! Act now, DM me for aspirin";
        let result = ScoringPipeline::new().analyze(&MessageRecord::new(text)).unwrap();
        let analysis = PatternRuleEngine::new().analyze_message(text, None);

        assert_eq!(result.rule_risk_score, analysis.risk_score);
        assert_eq!(result.rule_risk_level, analysis.risk_level);
        assert_eq!(result.detected_products, analysis.detected_products);
        assert_eq!(result.risk_factors, analysis.risk_factors);
        assert_eq!(result.confidence, analysis.confidence);
    }

    #[test]
    fn test_batch_ids_default_to_position() {
        let pipeline = ScoringPipeline::new();
        let messages = vec![MessageRecord::new("a"), MessageRecord::new("b").with_id(7), MessageRecord::new("c")];
        let ids: Vec<i64> = pipeline
            .analyze_batch(&messages)
            .unwrap()
            .iter()
            .map(|r| r.message_id)
            .collect();
        assert_eq!(ids, vec![0, 7, 2]);
    }

    #[test]
    fn test_rank_most_anomalous_is_explicit() {
        let pipeline = ScoringPipeline::new();
        pipeline.fit(&training_messages()).unwrap();
        let results = pipeline.analyze_batch(&training_messages()).unwrap();
        let ranked = rank_most_anomalous(&results);

        // analysis keeps input order, ranking is a separate copy
        assert_eq!(results[0].message_id, 0);
        let first_two: Vec<i64> = ranked[..2].iter().map(|r| r.message_id).collect();
        assert!(first_two.contains(&100) && first_two.contains(&101));
        assert!(ranked
            .windows(2)
            .all(|w| w[0].anomaly_score.unwrap() <= w[1].anomaly_score.unwrap()));
    }

    #[test]
    fn test_text_preview() {
        assert_eq!(text_preview("short", 200), "short");
        let long = "é".repeat(250);
        let preview = text_preview(&long, 200);
        assert_eq!(preview.chars().count(), 203);
        assert!(preview.ends_with("..."));
        assert_eq!(text_preview(&"x".repeat(200), 200), "x".repeat(200));
    }
}
