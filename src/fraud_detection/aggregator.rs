//! Channel aggregation
//!
//! Reduces per-message results into per-channel statistics.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use super::config::AggregationConfig;
use super::errors::{Result, ScoringError};
use super::patterns::SUSPICIOUS_REGISTRY;
use super::pipeline::{rank_most_anomalous, ScoringResult};
use super::rules::RiskLevel;

/// Per-channel statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSummary {
    pub channel: String,
    pub total_messages: usize,
    pub anomalous_messages: usize,
    pub high_risk_messages: usize,
    /// `anomalous_messages / total_messages`
    pub anomaly_rate: f64,
    pub avg_anomaly_score: f64,
    /// (category, count), descending count then registry order
    pub top_patterns: Vec<(String, usize)>,
    /// Lowest anomaly scores first
    pub most_anomalous: Vec<ScoringResult>,
}

/// Channel aggregator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelAggregator {
    min_messages: usize,
    top_patterns: usize,
    most_anomalous: usize,
}

impl ChannelAggregator {
    pub fn new(min_messages: usize) -> Self {
        Self {
            min_messages,
            ..Self::default()
        }
    }

    pub fn with_config(config: &AggregationConfig) -> Self {
        Self {
            min_messages: config.min_messages,
            top_patterns: config.top_patterns,
            most_anomalous: config.most_anomalous,
        }
    }

    pub fn min_messages(&self) -> usize {
        self.min_messages
    }

    /// Summarise every channel with at least `min_messages` results.
    /// Smaller channels are left out of the output entirely.
    pub fn aggregate(
        &self,
        grouped: &BTreeMap<String, Vec<ScoringResult>>,
    ) -> Result<BTreeMap<String, ChannelSummary>> {
        grouped
            .iter()
            .filter(|(_, results)| results.len() >= self.min_messages)
            .map(|(channel, results)| Ok((channel.clone(), self.summarize(channel, results)?)))
            .collect()
    }

    /// Summarise one channel. Every result must carry an anomaly score.
    pub fn summarize(&self, channel: &str, results: &[ScoringResult]) -> Result<ChannelSummary> {
        let scores = results
            .iter()
            .map(|r| r.anomaly_score)
            .collect::<Option<Vec<f64>>>()
            .ok_or(ScoringError::NotTrained)?;

        let total_messages = results.len();
        let anomalous_messages = results.iter().filter(|r| r.is_anomaly == Some(true)).count();
        let high_risk_messages = results
            .iter()
            .filter(|r| r.anomaly_risk_level == Some(RiskLevel::High))
            .count();
        let (anomaly_rate, avg_anomaly_score) = if total_messages == 0 {
            (0.0, 0.0)
        } else {
            (
                anomalous_messages as f64 / total_messages as f64,
                scores.iter().sum::<f64>() / total_messages as f64,
            )
        };

        let mut most_anomalous = rank_most_anomalous(results);
        most_anomalous.truncate(self.most_anomalous);

        Ok(ChannelSummary {
            channel: channel.to_string(),
            total_messages,
            anomalous_messages,
            high_risk_messages,
            anomaly_rate,
            avg_anomaly_score,
            top_patterns: self.top_patterns(results),
            most_anomalous,
        })
    }

    fn top_patterns(&self, results: &[ScoringResult]) -> Vec<(String, usize)> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for category in results.iter().flat_map(|r| r.matched_categories.iter()) {
            *counts.entry(category.as_str()).or_insert(0) += 1;
        }

        let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
        ranked.sort_by(|(name_a, count_a), (name_b, count_b)| {
            let pos_a = SUSPICIOUS_REGISTRY.position(name_a).unwrap_or(usize::MAX);
            let pos_b = SUSPICIOUS_REGISTRY.position(name_b).unwrap_or(usize::MAX);
            count_b
                .cmp(count_a)
                .then(pos_a.cmp(&pos_b))
                .then(name_a.cmp(name_b))
        });
        ranked
            .into_iter()
            .take(self.top_patterns)
            .map(|(name, count)| (name.to_string(), count))
            .collect()
    }
}

impl Default for ChannelAggregator {
    fn default() -> Self {
        Self::with_config(&AggregationConfig::default())
    }
}

/// Group results by channel, keeping each channel's results in input order
pub fn group_by_channel(results: impl IntoIterator<Item = ScoringResult>) -> BTreeMap<String, Vec<ScoringResult>> {
    let mut grouped: BTreeMap<String, Vec<ScoringResult>> = BTreeMap::new();
    for result in results {
        grouped.entry(result.channel.clone()).or_default().push(result);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn result(channel: &str, id: i64, score: f64, categories: &[&str]) -> ScoringResult {
        ScoringResult {
            message_id: id,
            channel: channel.to_string(),
            timestamp: None,
            text_preview: String::new(),
            rule_risk_score: 0.0,
            rule_risk_level: RiskLevel::Low,
            detected_products: vec![],
            risk_factors: vec![],
            confidence: 0.1,
            anomaly_score: Some(score),
            is_anomaly: Some(score < 0.0),
            anomaly_risk_level: Some(RiskLevel::from_anomaly_score(score)),
            matched_categories: categories.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[test]
    fn test_small_channels_excluded() {
        let mut grouped = BTreeMap::new();
        grouped.insert("@small".to_string(), (0..4).map(|i| result("@small", i, 0.1, &[])).collect());
        grouped.insert("@big".to_string(), (0..5).map(|i| result("@big", i, 0.1, &[])).collect());

        let summaries = ChannelAggregator::default().aggregate(&grouped).unwrap();
        assert_eq!(summaries.keys().collect::<Vec<_>>(), vec!["@big"]);
    }

    #[test]
    fn test_summary_statistics() {
        let results = vec![
            result("@c", 1, 0.10, &["discount"]),
            result("@c", 2, -0.30, &["urgency", "financial_promises"]),
            result("@c", 3, -0.05, &["financial_promises"]),
            result("@c", 4, 0.20, &["urgency"]),
            result("@c", 5, 0.05, &["price_manipulation", "contact_pressure"]),
        ];
        let summary = ChannelAggregator::default().summarize("@c", &results).unwrap();

        assert_eq!(summary.total_messages, 5);
        assert_eq!(summary.anomalous_messages, 2);
        assert_eq!(summary.high_risk_messages, 1);
        assert_eq!(summary.anomaly_rate, 2.0 / 5.0);
        assert!((summary.avg_anomaly_score - 0.0).abs() < 1e-12);
        assert_eq!(
            summary.top_patterns,
            vec![
                ("urgency".to_string(), 2),
                ("financial_promises".to_string(), 2),
                ("contact_pressure".to_string(), 1),
            ]
        );
        let ids: Vec<i64> = summary.most_anomalous.iter().map(|r| r.message_id).collect();
        assert_eq!(ids, vec![2, 3, 5]);
    }

    #[test]
    fn test_unscored_results_rejected() {
        let mut results: Vec<ScoringResult> = (0..5).map(|i| result("@c", i, 0.1, &[])).collect();
        results[3].anomaly_score = None;
        let err = ChannelAggregator::default().summarize("@c", &results).unwrap_err();
        assert!(matches!(err, ScoringError::NotTrained));
    }

    #[test]
    fn test_group_by_channel() {
        let grouped = group_by_channel(vec![
            result("@a", 1, 0.0, &[]),
            result("@b", 2, 0.0, &[]),
            result("@a", 3, 0.0, &[]),
        ]);
        assert_eq!(grouped["@a"].iter().map(|r| r.message_id).collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(grouped["@b"].len(), 1);
    }
}
