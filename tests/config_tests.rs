// Integration tests for configuration loading and validation

mod common;

use boll_maker::config::SkewFormula;
use boll_maker::{Config, ConfigError};
use common::create_test_config;
use rust_decimal_macros::dec;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_example_config_matches_defaults() {
    let example = include_str!("../config.toml.example");
    let config = Config::from_toml_str(example).expect("example config should parse");
    assert_eq!(config, Config::default());
}

#[test]
fn test_config_file_round_trip() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config_path = temp_dir.path().join("config.toml");

    let mut config = create_test_config();
    config.market.symbol = "ETH_USDC".to_string();
    config.spread.skew_formula = SkewFormula::OneSided;
    config.to_file(&config_path).expect("Failed to write config");

    let loaded = Config::from_file(&config_path).expect("Failed to load config");
    assert_eq!(loaded, config);
}

#[test]
fn test_missing_file_reported() {
    let result = Config::from_file("definitely/not/here.toml");
    assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
}

#[test]
fn test_load_or_create_writes_defaults() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config_path = temp_dir.path().join("fresh.toml");

    let config = Config::load_or_create(&config_path).expect("Failed to create config");
    assert!(config_path.exists());
    assert_eq!(config, Config::default());

    // Second call reads the file back
    let again = Config::load_or_create(&config_path).expect("Failed to reload config");
    assert_eq!(again, config);
}

#[test]
fn test_invalid_file_is_rejected_at_load() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config_path = temp_dir.path().join("bad.toml");
    fs::write(
        &config_path,
        r#"
        [risk]
        stop_loss_activation = "0.05"
        stop_loss_ratio = "0.03"
        take_profit_ratio = "0.07"
        "#,
    )
    .expect("Failed to write config");

    let result = Config::from_file(&config_path);
    assert!(matches!(result, Err(ConfigError::Validation(_))));
}

#[test]
fn test_parse_error_reported() {
    let result = Config::from_toml_str("[market\nsymbol = ");
    assert!(matches!(result, Err(ConfigError::Parse(_))));
}

#[test]
fn test_zero_period_rejected() {
    let mut config = create_test_config();
    config.bands.short.period = 0;
    assert!(config.validate().is_err());

    let mut config = create_test_config();
    config.spread.uptrend_skew = dec!(2.5);
    assert!(config.validate().is_err());
}
