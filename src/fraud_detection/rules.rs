//! Pattern rule engine
//!
//! Deterministic weighted scoring of raw message text. No training needed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::patterns::{detect_products, CategoryRegistry, RISK_REGISTRY};

/// Risk level shared by the rule engine and the anomaly model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Rule score thresholds: `>= 0.7` High, `>= 0.4` Medium, else Low
    pub fn from_rule_score(score: f64) -> Self {
        if score >= 0.7 {
            Self::High
        } else if score >= 0.4 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    /// Anomaly score thresholds: `< -0.2` High, `< 0` Medium, else Low
    pub fn from_anomaly_score(score: f64) -> Self {
        if score < -0.2 {
            Self::High
        } else if score < 0.0 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full rule-engine verdict for one message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleAnalysis {
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub detected_products: Vec<String>,
    pub risk_factors: Vec<String>,
    /// `min(0.9, risk_score + 0.1)`
    pub confidence: f64,
    pub channel: Option<String>,
    pub analyzed_at: DateTime<Utc>,
}

/// Rule engine over the presence-weighted registry
#[derive(Debug, Clone, Copy)]
pub struct PatternRuleEngine {
    registry: &'static CategoryRegistry,
}

impl PatternRuleEngine {
    pub fn new() -> Self {
        Self {
            registry: &RISK_REGISTRY,
        }
    }

    pub fn registry(&self) -> &'static CategoryRegistry {
        self.registry
    }

    /// Returns `(risk_score, detected_products, risk_factors)`.
    ///
    /// Each category adds its weight once when any of its patterns match;
    /// the total is clipped to [0, 1].
    pub fn calculate_risk_score(&self, text: &str) -> (f64, Vec<String>, Vec<String>) {
        let matched = self.registry.matched(text);
        let risk_factors = matched.iter().map(|c| c.display_name()).collect();
        let risk_score = matched.iter().map(|c| c.weight).sum::<f64>().clamp(0.0, 1.0);

        (risk_score, detect_products(text), risk_factors)
    }

    pub fn get_risk_level(&self, risk_score: f64) -> RiskLevel {
        RiskLevel::from_rule_score(risk_score)
    }

    /// Confidence in a rule verdict, capped at 0.9
    pub fn confidence(&self, risk_score: f64) -> f64 {
        (risk_score + 0.1).min(0.9)
    }

    pub fn analyze_message(&self, text: &str, channel: Option<&str>) -> RuleAnalysis {
        let (risk_score, detected_products, risk_factors) = self.calculate_risk_score(text);

        RuleAnalysis {
            risk_score,
            risk_level: self.get_risk_level(risk_score),
            detected_products,
            risk_factors,
            confidence: self.confidence(risk_score),
            channel: channel.map(str::to_string),
            analyzed_at: Utc::now(),
        }
    }
}

impl Default for PatternRuleEngine {
    fn default() -> Self {
        Self::new()
    }
}
