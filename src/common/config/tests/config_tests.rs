//! Unit tests for common-config crate

use common_config::{OptimizerSettings, PlexusConfig, RuleKind};
use common_error::PlexusError;

#[test]
fn test_plexus_config_default() {
    let config = PlexusConfig::default();

    assert_eq!(config.optimizer.rules, RuleKind::default_order());
    assert_eq!(config.optimizer.max_passes, 16);
    assert!(!config.optimizer.enable_trace);
}

#[test]
fn test_default_rule_order() {
    let order = RuleKind::default_order();

    assert_eq!(order.len(), 5);
    assert_eq!(order[0], RuleKind::UnnestSubqueries);
    assert_eq!(order[4], RuleKind::IndexScans);
}

#[test]
fn test_plexus_config_serialization() {
    let mut config = PlexusConfig::default();
    config.optimizer.rules = vec![RuleKind::MergeProjections, RuleKind::PushdownSelections];
    config.optimizer.max_passes = 3;
    config.optimizer.enable_trace = true;

    // Serialize to JSON
    let json = config.to_json().unwrap();

    // Deserialize from JSON
    let deserialized = PlexusConfig::from_json(&json).unwrap();

    assert_eq!(deserialized, config);
}

#[test]
fn test_partial_json_takes_defaults() {
    let config = PlexusConfig::from_json(r#"{"optimizer": {"max_passes": 2}}"#).unwrap();

    assert_eq!(config.optimizer.max_passes, 2);
    assert_eq!(config.optimizer.rules, OptimizerSettings::default().rules);
}

#[test]
fn test_rule_kind_json_names() {
    let json = serde_json::to_string(&RuleKind::JoinIndices).unwrap();
    assert_eq!(json, "\"JoinIndices\"");
    assert_eq!(RuleKind::JoinIndices.to_string(), "JoinIndices");
}

#[test]
fn test_unknown_rule_is_an_error() {
    let err = PlexusConfig::from_json(r#"{"optimizer": {"rules": ["FoldConstants"]}}"#)
        .unwrap_err();
    assert!(matches!(err, PlexusError::SerdeJsonError(_)));
}

#[test]
fn test_missing_file_is_io_error() {
    let err = PlexusConfig::from_path("/nonexistent/plexus.json").unwrap_err();
    assert!(matches!(err, PlexusError::IoError(_)));
}

#[test]
fn test_invalid_settings_are_rejected() {
    let err = PlexusConfig::from_json(r#"{"optimizer": {"max_passes": 0}}"#).unwrap_err();
    assert!(matches!(err, PlexusError::ConfigError(_)));

    let err = PlexusConfig::from_json(
        r#"{"optimizer": {"rules": ["IndexScans", "PushdownSelections", "IndexScans"]}}"#,
    )
    .unwrap_err();
    assert_eq!(err.to_string(), "ConfigError: rule IndexScans is listed twice");
}
