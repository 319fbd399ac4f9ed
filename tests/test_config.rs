//! Tests for configuration parsing
//!
//! This file tests the config module including:
//! - Loading the shipped config file
//! - Handling invalid JSON and missing files
//! - Rejecting unknown names and out-of-range values
//! - Turning a config into compile and fit options

use custom_models::config::{load_config, validate_config, TrainingConfig};
use custom_models::training::{Loss, Metric};
use custom_models::ModelError;
use std::fs;
use tempfile::TempDir;

fn write_config(dir: &TempDir, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join("config.json");
    fs::write(&path, contents).unwrap();
    path
}

// ============================================================================
// Valid Config Loading Tests
// ============================================================================

mod valid_config_tests {
    use super::*;

    #[test]
    fn test_load_shipped_config() {
        let config = load_config("config/simple_mlp.json").expect("Failed to load simple_mlp config");

        assert_eq!(config.loss, "categorical_crossentropy");
        assert_eq!(config.optimizer, "rmsprop");
        assert_eq!(config.metrics, vec!["accuracy"]);
        assert_eq!(config.epochs, 5);
        assert_eq!(config.batch_size, 32);
        assert_eq!(config.seed, 42);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, r#"{"optimizer": "sgd", "learning_rate": 0.1}"#);

        let config = load_config(&path).unwrap();
        assert_eq!(config.optimizer, "sgd");
        assert_eq!(config.loss, TrainingConfig::default().loss);
        assert_eq!(config.epochs, TrainingConfig::default().epochs);
        assert!(config.shuffle);
    }

    #[test]
    fn test_options_from_config() {
        let dir = TempDir::new().unwrap();
        let path = write_config(
            &dir,
            r#"{
                "loss": "mean_squared_error",
                "optimizer": "adam",
                "learning_rate": 0.005,
                "metrics": ["mean_absolute_error"],
                "epochs": 3,
                "batch_size": 8,
                "validation_split": 0.25,
                "shuffle": false
            }"#,
        );

        let config = load_config(&path).unwrap();
        let compile = config.compile_options().unwrap();
        assert_eq!(compile.loss, Loss::MeanSquaredError);
        assert_eq!(compile.metrics, vec![Metric::MeanAbsoluteError]);
        assert_eq!(compile.optimizer.name(), "adam");

        let fit = config.fit_options();
        assert_eq!(fit.epochs, 3);
        assert_eq!(fit.batch_size, 8);
        assert!(!fit.shuffle);
        assert!((fit.validation_split - 0.25).abs() < 1e-6);
    }
}

// ============================================================================
// Invalid Config Tests
// ============================================================================

mod invalid_config_tests {
    use super::*;

    #[test]
    fn test_missing_file() {
        let result = load_config("config/does_not_exist.json");
        assert!(matches!(result, Err(ModelError::Io(_))));
    }

    #[test]
    fn test_invalid_json() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "{ not json");
        assert!(matches!(load_config(&path), Err(ModelError::Json(_))));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, r#"{"scheduler_type": "step_decay"}"#);
        assert!(matches!(load_config(&path), Err(ModelError::Json(_))));
    }

    #[test]
    fn test_unknown_names_rejected() {
        for (field, value) in [("loss", "hinge"), ("optimizer", "adagrad")] {
            let config: TrainingConfig =
                serde_json::from_str(&format!(r#"{{"{}": "{}"}}"#, field, value)).unwrap();
            assert!(
                matches!(validate_config(&config), Err(ModelError::InvalidConfig(_))),
                "{} = {} was accepted",
                field,
                value
            );
        }

        let config = TrainingConfig {
            metrics: vec!["f1".to_string()],
            ..TrainingConfig::default()
        };
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_out_of_range_values_rejected() {
        let cases = [
            TrainingConfig {
                learning_rate: -0.1,
                ..TrainingConfig::default()
            },
            TrainingConfig {
                epochs: 0,
                ..TrainingConfig::default()
            },
            TrainingConfig {
                batch_size: 0,
                ..TrainingConfig::default()
            },
            TrainingConfig {
                validation_split: 1.0,
                ..TrainingConfig::default()
            },
        ];
        for config in &cases {
            assert!(matches!(
                validate_config(config),
                Err(ModelError::InvalidConfig(_))
            ));
        }
    }
}
