//! Tests for config functionality.

use crate::config::{LockConfig, LockOptions, RawLockOptions};
use crate::diagnostics::TraceFormat;
use crate::error::LockError;
use crate::locks::{LockMode, LockTimeout};
use std::path::PathBuf;

#[test]
fn test_default_config() {
    let config = LockConfig::default();

    assert_eq!(config.mode, LockMode::Exclusive);
    assert_eq!(config.timeout_millis, LockTimeout::Millis(0));
    assert!(!config.diagnostics_enabled);
    assert!(config.diagnostics_sink.is_none());
    assert_eq!(config.diagnostics_format, TraceFormat::Text);
    assert_eq!(config.principal, "public");
    assert!(!config.strict);
    assert!(config.coercions.is_empty());
}

#[test]
fn test_parse_empty_yaml() {
    let config = LockConfig::from_yaml("").unwrap();
    assert_eq!(config, LockConfig::default());
}

#[test]
fn test_parse_full_yaml() {
    let yaml = r#"
mode: Shared
timeout_millis: 60000
diagnostics_enabled: true
diagnostics_sink: /var/log/applock.log
diagnostics_format: ndjson
principal: dbo
"#;
    let config = LockConfig::from_yaml(yaml).unwrap();

    assert_eq!(config.mode, LockMode::Shared);
    assert_eq!(config.timeout_millis, LockTimeout::Millis(60_000));
    assert!(config.diagnostics_enabled);
    assert_eq!(
        config.diagnostics_sink,
        Some(PathBuf::from("/var/log/applock.log"))
    );
    assert_eq!(config.diagnostics_format, TraceFormat::Ndjson);
    assert_eq!(config.principal, "dbo");
    assert!(config.coercions.is_empty());
}

#[test]
fn test_parse_camel_case_aliases() {
    let yaml = r#"
mode: Update
timeoutMillis: 250
diagnosticsEnabled: true
diagnosticsSink: trace.log
"#;
    let config = LockConfig::from_yaml(yaml).unwrap();

    assert_eq!(config.mode, LockMode::Update);
    assert_eq!(config.timeout_millis, LockTimeout::Millis(250));
    assert!(config.diagnostics_enabled);
    assert_eq!(config.diagnostics_sink, Some(PathBuf::from("trace.log")));
}

#[test]
fn test_unknown_keys_are_ignored() {
    let yaml = r#"
mode: IntentShared
handle: something
debugFile: c:\temp\debug.log
"#;
    let config = LockConfig::from_yaml(yaml).unwrap();
    assert_eq!(config.mode, LockMode::IntentShared);
}

#[test]
fn test_every_mode_parses() {
    for mode in LockMode::ALL {
        let config = LockConfig::from_yaml(&format!("mode: {}", mode.as_str())).unwrap();
        assert_eq!(config.mode, mode);
    }
}

#[test]
fn test_invalid_mode_coerces_to_exclusive() {
    let config = LockConfig::from_yaml("mode: Sharedish").unwrap();

    assert_eq!(config.mode, LockMode::Exclusive);
    assert_eq!(config.coercions.len(), 1);
    assert_eq!(config.coercions[0].key, "mode");
    assert_eq!(config.coercions[0].rejected, "Sharedish");
    assert_eq!(config.coercions[0].applied, "Exclusive");
}

#[test]
fn test_mode_is_case_sensitive() {
    let config = LockConfig::from_yaml("mode: shared").unwrap();
    assert_eq!(config.mode, LockMode::Exclusive);
    assert_eq!(config.coercions.len(), 1);
}

#[test]
fn test_non_string_mode_coerces_to_exclusive() {
    let config = LockConfig::from_yaml("mode: 3").unwrap();
    assert_eq!(config.mode, LockMode::Exclusive);
    assert_eq!(config.coercions[0].rejected, "3");
}

#[test]
fn test_non_integer_timeout_coerces_to_zero() {
    for bad in ["\"60\"", "1.5", "[1, 2]", "soon", "-5", "99999999999"] {
        let config = LockConfig::from_yaml(&format!("timeout_millis: {}", bad)).unwrap();
        assert_eq!(
            config.timeout_millis,
            LockTimeout::Millis(0),
            "timeout {} should coerce to 0",
            bad
        );
        assert_eq!(config.coercions.len(), 1);
        assert_eq!(config.coercions[0].key, "timeout_millis");
    }
}

#[test]
fn test_forever_timeout_spellings() {
    for spelling in ["-1", "forever", "infinite"] {
        let config = LockConfig::from_yaml(&format!("timeout_millis: {}", spelling)).unwrap();
        assert_eq!(config.timeout_millis, LockTimeout::Forever);
        assert!(config.coercions.is_empty());
    }
}

#[test]
fn test_invalid_diagnostics_values_coerce() {
    let yaml = r#"
diagnostics_enabled: "yes please"
diagnostics_sink: 42
diagnostics_format: xml
principal: ""
"#;
    let config = LockConfig::from_yaml(yaml).unwrap();

    assert!(!config.diagnostics_enabled);
    assert!(config.diagnostics_sink.is_none());
    assert_eq!(config.diagnostics_format, TraceFormat::Text);
    assert_eq!(config.principal, "public");
    let keys: Vec<&str> = config.coercions.iter().map(|c| c.key.as_str()).collect();
    assert_eq!(
        keys,
        vec![
            "diagnostics_enabled",
            "diagnostics_sink",
            "diagnostics_format",
            "principal"
        ]
    );
}

#[test]
fn test_strict_mode_rejects_coercions() {
    let yaml = r#"
strict: true
mode: Sharedish
timeout_millis: soon
"#;
    let err = LockConfig::from_yaml(yaml).unwrap_err();

    assert!(matches!(err, LockError::Configuration(_)));
    let msg = err.to_string();
    assert!(msg.contains("invalid mode 'Sharedish', using Exclusive"));
    assert!(msg.contains("invalid timeout_millis 'soon', using 0"));
}

#[test]
fn test_strict_mode_accepts_valid_options() {
    let config = LockConfig::from_yaml("strict: true\nmode: Shared").unwrap();
    assert!(config.strict);
    assert_eq!(config.mode, LockMode::Shared);
}

#[test]
fn test_malformed_yaml_is_rejected() {
    let err = LockConfig::from_yaml("mode: [unclosed").unwrap_err();
    assert!(matches!(err, LockError::Configuration(_)));
}

#[test]
fn test_validate_rejects_long_principal() {
    let config = LockConfig {
        principal: "p".repeat(129),
        ..LockConfig::default()
    };
    assert!(config.validate().is_err());
}

#[test]
fn test_yaml_round_trip_of_configured_values() {
    let config = LockConfig::from_yaml("mode: Update\ntimeout_millis: forever").unwrap();
    let yaml = config.to_yaml().unwrap();

    assert!(yaml.contains("mode: Update"));
    assert!(yaml.contains("timeout_millis: -1"));

    let reparsed = LockConfig::from_yaml(&yaml).unwrap();
    assert_eq!(reparsed.mode, LockMode::Update);
    assert_eq!(reparsed.timeout_millis, LockTimeout::Forever);
}

#[test]
fn test_raw_set_recognizes_types() {
    let mut raw = RawLockOptions::default();
    assert!(raw.set("timeoutMillis", "500"));
    assert!(raw.set("mode", "Shared"));
    assert!(raw.set("diagnostics_enabled", "true"));
    assert!(!raw.set("handle", "x"));

    let config = LockConfig::from_raw(&raw).unwrap();
    assert_eq!(config.timeout_millis, LockTimeout::Millis(500));
    assert_eq!(config.mode, LockMode::Shared);
    assert!(config.diagnostics_enabled);
}

#[test]
fn test_options_builder() {
    let options = LockOptions::default()
        .mode(LockMode::IntentExclusive)
        .timeout(LockTimeout::Forever)
        .principal("dbo");

    assert_eq!(options.config.mode, LockMode::IntentExclusive);
    assert_eq!(options.config.timeout_millis, LockTimeout::Forever);
    assert_eq!(options.config.principal, "dbo");
    assert!(options.sink.is_none());
}
