use channel_risk::fraud_detection::{FeatureExtractor, MessageRecord, PatternRuleEngine, RiskLevel};
use proptest::prelude::*;

proptest! {
    #[test]
    fn test_rule_score_is_bounded(text in ".{0,200}") {
        let analysis = PatternRuleEngine::new().analyze_message(&text, None);
        prop_assert!((0.0..=1.0).contains(&analysis.risk_score));
        prop_assert!(analysis.confidence <= 0.9);
        prop_assert_eq!(analysis.risk_level, RiskLevel::from_rule_score(analysis.risk_score));
    }

    #[test]
    fn test_feature_ratios_are_bounded(text in ".{0,200}", has_media in any::<bool>()) {
        let message = MessageRecord::new(text.clone()).with_media(has_media);
        let features = FeatureExtractor::new().extract_one(&message);
        prop_assert!((0.0..=1.0).contains(&features.caps_ratio));
        prop_assert!((0.0..=1.0).contains(&features.digit_ratio));
        prop_assert_eq!(features.text_length, text.chars().count() as f64);
        prop_assert_eq!(features.has_media, if has_media { 1.0 } else { 0.0 });
    }

    #[test]
    fn test_garbage_timestamps_use_defaults(raw in "[a-z ]{0,30}") {
        let message = MessageRecord::new("hi").with_timestamp(raw);
        let features = FeatureExtractor::new().extract_one(&message);
        prop_assert_eq!((features.hour, features.day_of_week, features.is_weekend), (12.0, 1.0, 0.0));
    }

    #[test]
    fn test_extraction_is_deterministic(text in ".{0,120}") {
        let message = MessageRecord::new(text);
        let extractor = FeatureExtractor::new();
        prop_assert_eq!(extractor.extract_one(&message), extractor.extract_one(&message));
    }
}
