//! Message feature extractor
//!
//! Converts channel posts into the fixed numeric schema consumed by the
//! anomaly model.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Timelike};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::patterns::SUSPICIOUS_REGISTRY;

/// Temporal defaults used when a timestamp is missing or unparsable
pub const DEFAULT_HOUR: f64 = 12.0;
pub const DEFAULT_DAY_OF_WEEK: f64 = 1.0;
pub const DEFAULT_IS_WEEKEND: f64 = 0.0;

/// Column names, in schema order
pub const COLUMNS: [&str; 18] = [
    "text_length",
    "word_count",
    "exclamation_count",
    "question_count",
    "caps_ratio",
    "digit_ratio",
    "url_count",
    "mention_count",
    "hashtag_count",
    "has_media",
    "urgency_score",
    "financial_promises_score",
    "contact_pressure_score",
    "medical_claims_score",
    "price_manipulation_score",
    "hour",
    "day_of_week",
    "is_weekend",
];

static URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"http[s]?://(?:[a-zA-Z]|[0-9]|[$-_@.&+]|[!*\(\),]|(?:%[0-9a-fA-F][0-9a-fA-F]))+")
        .expect("url pattern must compile")
});

/// Decimal digits in any script; fractions and letter numerals excluded
static DIGIT_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\p{Nd}").expect("digit pattern must compile"));

/// One channel post as supplied by ingestion
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawMessageRecord")]
pub struct MessageRecord {
    /// Defaults to the record's position in its batch
    pub id: Option<i64>,
    pub text: String,
    pub channel: String,
    /// ISO-8601 timestamp; read from `date` when `timestamp` is absent
    pub timestamp: Option<String>,
    pub has_media: bool,
    pub mentions: Vec<String>,
}

/// Wire form of a record. Scraped dumps name the timestamp `date`, newer
/// producers `timestamp`, and some carry both.
#[derive(Deserialize)]
struct RawMessageRecord {
    #[serde(default)]
    id: Option<i64>,
    #[serde(default)]
    text: String,
    #[serde(default = "default_channel")]
    channel: String,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    has_media: bool,
    #[serde(default)]
    mentions: Vec<String>,
}

impl From<RawMessageRecord> for MessageRecord {
    fn from(raw: RawMessageRecord) -> Self {
        Self {
            id: raw.id,
            text: raw.text,
            channel: raw.channel,
            timestamp: raw.timestamp.or(raw.date),
            has_media: raw.has_media,
            mentions: raw.mentions,
        }
    }
}

fn default_channel() -> String {
    "unknown".to_string()
}

impl MessageRecord {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            channel: default_channel(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    pub fn with_media(mut self, has_media: bool) -> Self {
        self.has_media = has_media;
        self
    }
}

/// Message feature vector
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    // === lexical ===
    pub text_length: f64,
    pub word_count: f64,
    pub exclamation_count: f64,
    pub question_count: f64,
    /// Uppercase chars / max(length, 1)
    pub caps_ratio: f64,
    /// Digit chars / max(length, 1)
    pub digit_ratio: f64,
    pub url_count: f64,
    /// Literal `@` count
    pub mention_count: f64,
    /// Literal `#` count
    pub hashtag_count: f64,
    pub has_media: f64, // 0.0 or 1.0

    // === pattern occurrences ===
    pub urgency_score: f64,
    pub financial_promises_score: f64,
    pub contact_pressure_score: f64,
    pub medical_claims_score: f64,
    pub price_manipulation_score: f64,

    // === temporal ===
    pub hour: f64,
    pub day_of_week: f64,
    pub is_weekend: f64,
}

impl FeatureVector {
    /// Values in `COLUMNS` order
    pub fn to_vector(&self) -> Vec<f64> {
        vec![
            self.text_length,
            self.word_count,
            self.exclamation_count,
            self.question_count,
            self.caps_ratio,
            self.digit_ratio,
            self.url_count,
            self.mention_count,
            self.hashtag_count,
            self.has_media,
            self.urgency_score,
            self.financial_promises_score,
            self.contact_pressure_score,
            self.medical_claims_score,
            self.price_manipulation_score,
            self.hour,
            self.day_of_week,
            self.is_weekend,
        ]
    }

    pub fn from_vector(vec: &[f64]) -> Option<Self> {
        if vec.len() != Self::dimension() {
            return None;
        }

        Some(Self {
            text_length: vec[0],
            word_count: vec[1],
            exclamation_count: vec[2],
            question_count: vec[3],
            caps_ratio: vec[4],
            digit_ratio: vec[5],
            url_count: vec[6],
            mention_count: vec[7],
            hashtag_count: vec[8],
            has_media: vec[9],
            urgency_score: vec[10],
            financial_promises_score: vec[11],
            contact_pressure_score: vec[12],
            medical_claims_score: vec[13],
            price_manipulation_score: vec[14],
            hour: vec[15],
            day_of_week: vec[16],
            is_weekend: vec[17],
        })
    }

    pub fn dimension() -> usize {
        COLUMNS.len()
    }

    pub fn columns() -> Vec<String> {
        COLUMNS.iter().map(|c| c.to_string()).collect()
    }
}

/// Rows of feature values under a named column schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

impl FeatureTable {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<f64>>) -> Self {
        Self { columns, rows }
    }

    pub fn from_vectors(vectors: &[FeatureVector]) -> Self {
        Self {
            columns: FeatureVector::columns(),
            rows: vectors.iter().map(FeatureVector::to_vector).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Values of one column, if it exists
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let idx = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().map(|row| row[idx]).collect())
    }
}

/// Feature extractor. Stateless: the same record always yields the same vector.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureExtractor;

impl FeatureExtractor {
    pub fn new() -> Self {
        Self
    }

    /// One row per message, in input order
    pub fn extract(&self, messages: &[MessageRecord]) -> FeatureTable {
        let vectors: Vec<FeatureVector> = messages.iter().map(|m| self.extract_one(m)).collect();
        FeatureTable::from_vectors(&vectors)
    }

    pub fn extract_one(&self, message: &MessageRecord) -> FeatureVector {
        let text = message.text.as_str();
        let length = text.chars().count();
        let denominator = length.max(1) as f64;

        let caps = text.chars().filter(|c| c.is_uppercase()).count();
        let digits = DIGIT_PATTERN.find_iter(text).count();

        let counts = SUSPICIOUS_REGISTRY.occurrence_counts(text);
        let count = |idx: usize| counts.get(idx).copied().unwrap_or(0) as f64;

        let (hour, day_of_week, is_weekend) = Self::temporal_features(message.timestamp.as_deref());

        FeatureVector {
            text_length: length as f64,
            word_count: text.split_whitespace().count() as f64,
            exclamation_count: text.matches('!').count() as f64,
            question_count: text.matches('?').count() as f64,
            caps_ratio: caps as f64 / denominator,
            digit_ratio: digits as f64 / denominator,
            url_count: URL_PATTERN.find_iter(text).count() as f64,
            mention_count: text.matches('@').count() as f64,
            hashtag_count: text.matches('#').count() as f64,
            has_media: if message.has_media { 1.0 } else { 0.0 },
            urgency_score: count(0),
            financial_promises_score: count(1),
            contact_pressure_score: count(2),
            medical_claims_score: count(3),
            price_manipulation_score: count(4),
            hour,
            day_of_week,
            is_weekend,
        }
    }

    /// (hour, day_of_week with Monday = 0, is_weekend); defaults when the
    /// timestamp is missing or unparsable
    pub fn temporal_features(timestamp: Option<&str>) -> (f64, f64, f64) {
        let parsed = timestamp.and_then(parse_timestamp);
        match parsed {
            Some(dt) => {
                let weekday = dt.weekday().num_days_from_monday();
                (
                    dt.hour() as f64,
                    weekday as f64,
                    if weekday >= 5 { 1.0 } else { 0.0 },
                )
            }
            None => {
                if let Some(raw) = timestamp {
                    debug!("unparsable timestamp {:?}, using temporal defaults", raw);
                }
                (DEFAULT_HOUR, DEFAULT_DAY_OF_WEEK, DEFAULT_IS_WEEKEND)
            }
        }
    }
}

/// Parse an ISO-8601 timestamp, keeping the wall-clock time of its own offset
fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }
    // %z takes `+03:00` and `+0300` alike
    for format in ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z", "%Y%m%dT%H%M%S%.f%z"] {
        if let Ok(dt) = DateTime::parse_from_str(raw, format) {
            return Some(dt.naive_local());
        }
    }
    for format in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y%m%dT%H%M%S%.f",
        "%Y%m%dT%H%M%S%.fZ",
        "%Y%m%dT%H%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}
