mod common;

use common::{test_config, SALT};
use domainlock_license::{
    LicenseConfig, LicenseError, ProtectionGate, RecheckMode, DEFAULT_CHECK_INTERVAL_SECS,
    DEFAULT_GRACE_PERIOD_SECS,
};
use pretty_assertions::assert_eq;
use std::time::Duration;

#[test]
fn defaults() {
    let config = LicenseConfig::default();
    assert_eq!(config.check_interval(), Duration::from_secs(86_400));
    assert_eq!(config.grace_period(), Duration::from_secs(604_800));
    assert_eq!(config.default_term(), Duration::from_secs(365 * 86_400));
    assert_eq!(config.recheck_mode, RecheckMode::Inline);
    assert_eq!(config.license_key, None);
    assert!(config.verification_file.ends_with("domainlock/verification.json"));
}

#[test]
fn json_file_fills_missing_fields() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("license.json");
    std::fs::write(
        &path,
        r#"{
            "endpoint_url": "https://licensing.example.net/api.php",
            "salt": "s3cret",
            "license_key": "ABC123",
            "recheck_mode": "background"
        }"#,
    )
    .unwrap();

    let config = LicenseConfig::from_json_file(&path).unwrap();
    assert_eq!(config.endpoint_url, "https://licensing.example.net/api.php");
    assert_eq!(config.license_key.as_deref(), Some("ABC123"));
    assert_eq!(config.recheck_mode, RecheckMode::Background);
    assert_eq!(config.check_interval_secs, DEFAULT_CHECK_INTERVAL_SECS);
    assert_eq!(config.grace_period_secs, DEFAULT_GRACE_PERIOD_SECS);
    assert_eq!(config.product, "default");
    assert!(config.validate().is_ok());
}

#[test]
fn missing_json_file_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = LicenseConfig::from_json_file(&dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, LicenseError::Config(_)));
}

#[test]
fn invalid_json_is_serialization_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("license.json");
    std::fs::write(&path, "endpoint_url = 'x'").unwrap();
    let err = LicenseConfig::from_json_file(&path).unwrap_err();
    assert!(matches!(err, LicenseError::Serialization(_)));
}

#[test]
fn validate_rejects_incomplete_config() {
    let dir = tempfile::tempdir().unwrap();
    let base = test_config(dir.path(), "http://127.0.0.1:9");
    assert!(base.validate().is_ok());

    let cases = [
        LicenseConfig {
            endpoint_url: "  ".into(),
            ..base.clone()
        },
        LicenseConfig {
            salt: String::new(),
            ..base.clone()
        },
        LicenseConfig {
            check_interval_secs: 7200,
            grace_period_secs: 3600,
            ..base.clone()
        },
    ];
    for config in cases {
        assert!(matches!(config.validate(), Err(LicenseError::Config(_))));
        assert!(ProtectionGate::new(config).is_err());
    }
}

#[test]
fn debug_redacts_secrets() {
    let dir = tempfile::tempdir().unwrap();
    let config = LicenseConfig {
        license_key: Some("ABC123".into()),
        ..test_config(dir.path(), "http://127.0.0.1:9")
    };
    let debug = format!("{config:?}");
    assert!(!debug.contains(SALT));
    assert!(!debug.contains("test-api-key"));
    assert!(!debug.contains("ABC123"));
    assert!(debug.contains("http://127.0.0.1:9"));
}
