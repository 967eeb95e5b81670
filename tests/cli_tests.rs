use assert_cmd::Command;
use tempfile::tempdir;

#[test]
fn test_analyze_prints_rule_analysis() {
    let output = Command::cargo_bin("channel-risk")
        .unwrap()
        .args([
            "analyze",
            "--text",
            "Guaranteed 100% profit! Act now! We sell aspirin.",
            "--channel",
            "@deals",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["risk_level"], "HIGH");
    assert_eq!(json["channel"], "@deals");
    assert_eq!(json["detected_products"][0], "aspirin");
}

#[test]
fn test_report_over_data_directory() {
    let dir = tempdir().unwrap();
    let normal: Vec<serde_json::Value> = (0..12)
        .map(|i| {
            serde_json::json!({
                "id": i,
                "text": format!("Clinic opening hours update {}", i),
                "channel": "@clinic",
                "date": "2024-03-04T10:00:00Z"
            })
        })
        .collect();
    let scam = serde_json::json!([
        {"id": 900, "text": "URGENT!!! MIRACLE CURE!!! DM ME NOW!!!", "channel": "@scam", "has_media": true}
    ]);
    std::fs::write(dir.path().join("clinic.json"), serde_json::to_string(&normal).unwrap()).unwrap();
    std::fs::write(dir.path().join("scam.json"), scam.to_string()).unwrap();
    let model_path = dir.path().join("model.out");

    let output = Command::cargo_bin("channel-risk")
        .unwrap()
        .arg("report")
        .arg("--data")
        .arg(dir.path())
        .args(["--top", "3"])
        .arg("--save-model")
        .arg(&model_path)
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["trained_on"], 13);
    assert_eq!(report["top_anomalies"].as_array().unwrap().len(), 3);
    assert_eq!(report["top_anomalies"][0]["message_id"], 900);
    assert!(report["channels"].get("@clinic").is_some());
    assert!(report["channels"].get("@scam").is_none());
    assert!(model_path.exists());
}

#[test]
fn test_report_with_too_little_data_fails() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("few.json"), r#"[{"text": "hello"}, {"text": "world"}]"#).unwrap();

    let output = Command::cargo_bin("channel-risk")
        .unwrap()
        .arg("report")
        .arg("--data")
        .arg(dir.path())
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Insufficient data"));
}
