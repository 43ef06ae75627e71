//! Integration tests for [`tess_lc_train::config`].

use tess_lc_train::config::{Activation, ArchitectureConfig, LossKind, OptimizerKind, Variant};
use tess_lc_train::ConfigError;

/// The default configuration must pass its own validation.
#[test]
fn default_config_is_valid() {
    ArchitectureConfig::default()
        .validate()
        .expect("default ArchitectureConfig must be valid");
}

/// A config written to disk and read back is unchanged.
#[test]
fn json_round_trip_through_a_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("nested").join("config.json");
    let cfg = ArchitectureConfig {
        num_conv_layers: 6,
        num_filters: vec![8, 16, 32, 32, 16, 8],
        kernel_size: vec![7, 5, 3, 3, 5, 7],
        activation: Activation::Relu,
        last_activation: Activation::Sigmoid,
        variant: Variant::Split { orbit_gap: Variant::DEFAULT_ORBIT_GAP },
        optimizer: OptimizerKind::Adadelta,
        losses: LossKind::BinaryCrossentropy,
        ..Default::default()
    };
    cfg.to_json(&path).expect("write");
    let back = ArchitectureConfig::from_json(&path).expect("read");
    assert_eq!(cfg, back);
}

/// Keys use the identifiers of the light-curve notebooks.
#[test]
fn json_uses_keras_style_identifiers() {
    let json = serde_json::to_value(ArchitectureConfig::default()).unwrap();
    assert_eq!(json["activation"], "elu");
    assert_eq!(json["optimizer"], "adam");
    assert_eq!(json["losses"], "mean_squared_error");
    assert_eq!(json["variant"]["kind"], "conv");
}

/// A file that leaves out a required key is rejected, naming the key.
#[test]
fn missing_required_key_fails_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("partial.json");
    std::fs::write(&path, r#"{ "latent_dim": 2 }"#).unwrap();
    let err = ArchitectureConfig::from_json(&path).unwrap_err();
    let ConfigError::ParseError { source, .. } = &err else {
        panic!("expected a parse error, got {err:?}");
    };
    let message = source.to_string();
    assert!(message.contains("missing field"), "{message}");
    assert!(message.contains("num_conv_layers"), "{message}");
}

/// Invalid values are caught when the file is loaded.
#[test]
fn from_json_validates() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.json");
    let mut json = serde_json::to_value(ArchitectureConfig::default()).unwrap();
    json["num_conv_layers"] = serde_json::json!(3);
    std::fs::write(&path, json.to_string()).unwrap();
    assert!(matches!(
        ArchitectureConfig::from_json(&path),
        Err(ConfigError::InvalidValue { field: "num_conv_layers", .. })
    ));
}

#[test]
fn unreadable_and_malformed_files() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.json");
    assert!(matches!(ArchitectureConfig::from_json(&missing), Err(ConfigError::FileRead { .. })));

    let garbage = dir.path().join("garbage.json");
    std::fs::write(&garbage, "not json").unwrap();
    assert!(matches!(ArchitectureConfig::from_json(&garbage), Err(ConfigError::ParseError { .. })));
}

#[test]
fn short_filter_list_rejected() {
    let cfg = ArchitectureConfig { num_filters: vec![16, 32], ..Default::default() };
    assert!(cfg.validate().is_err());
}
