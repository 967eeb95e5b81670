use channel_risk::fraud_detection::config::{ENV_CONTAMINATION, ENV_MIN_MESSAGES, ENV_SEED, ENV_TREES};
use channel_risk::fraud_detection::{MessageRecord, ScoringConfig, ScoringError, ScoringPipeline};
use serial_test::serial;
use std::env;
use tempfile::tempdir;

fn clear_env() {
    for key in [ENV_CONTAMINATION, ENV_SEED, ENV_TREES, ENV_MIN_MESSAGES] {
        env::remove_var(key);
    }
}

#[test]
#[serial]
fn test_from_env_defaults() {
    clear_env();
    let config = ScoringConfig::from_env().unwrap();
    assert_eq!(config, ScoringConfig::default());
}

#[test]
#[serial]
fn test_from_env_overrides() {
    clear_env();
    env::set_var(ENV_CONTAMINATION, "0.2");
    env::set_var(ENV_SEED, "7");
    env::set_var(ENV_TREES, "25");
    env::set_var(ENV_MIN_MESSAGES, "3");

    let config = ScoringConfig::from_env().unwrap();
    assert_eq!(config.model.contamination, 0.2);
    assert_eq!(config.model.seed, 7);
    assert_eq!(config.model.n_estimators, 25);
    assert_eq!(config.aggregation.min_messages, 3);

    let pipeline = ScoringPipeline::with_config(&config);
    assert_eq!(pipeline.params().n_estimators, 25);
    assert_eq!(pipeline.aggregator().min_messages(), 3);
    clear_env();
}

#[test]
#[serial]
fn test_from_env_rejects_garbage() {
    clear_env();
    env::set_var(ENV_SEED, "not-a-number");
    let err = ScoringConfig::from_env().unwrap_err();
    assert!(matches!(err, ScoringError::Configuration(_)));
    assert!(err.to_string().contains(ENV_SEED));
    clear_env();
}

#[test]
#[serial]
fn test_from_env_rejects_out_of_range_contamination() {
    clear_env();
    env::set_var(ENV_CONTAMINATION, "0.75");
    assert!(ScoringConfig::from_env().is_err());
    clear_env();
}

#[test]
fn test_config_file_roundtrip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("scoring.json");

    let mut config = ScoringConfig::default();
    config.model.seed = 1234;
    config.aggregation.top_patterns = 5;
    config.save_to_file(&path).unwrap();

    let loaded = ScoringConfig::from_file(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_invalid_config_file_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.json");
    std::fs::write(&path, r#"{"model": {"contamination": 2.0}}"#).unwrap();
    assert!(matches!(
        ScoringConfig::from_file(&path),
        Err(ScoringError::Configuration(_))
    ));

    std::fs::write(&path, "{ not json").unwrap();
    assert!(matches!(
        ScoringConfig::from_file(&path),
        Err(ScoringError::Serialization(_))
    ));
}

#[test]
fn test_lowered_training_minimum_never_fits() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("low_minimum.json");
    std::fs::write(&path, r#"{"model": {"min_training_samples": 3}}"#).unwrap();
    assert!(matches!(
        ScoringConfig::from_file(&path),
        Err(ScoringError::Configuration(_))
    ));

    // bypassing validation still cannot train on fewer than 10 rows
    let mut config = ScoringConfig::default();
    config.model.min_training_samples = 3;
    let pipeline = ScoringPipeline::with_config(&config);
    let messages: Vec<MessageRecord> = (0..4).map(|i| MessageRecord::new(format!("post {}", i))).collect();
    assert!(pipeline.fit(&messages).is_err());
    assert!(!pipeline.is_trained());
}
