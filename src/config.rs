//! Configuration structures for training
//!
//! A JSON file selects the loss, the optimizer and the `fit` settings used by
//! the demo binary. Every field has a default, so `{}` is a valid file.
//!
//! ```json
//! {
//!   "loss": "categorical_crossentropy",
//!   "optimizer": "rmsprop",
//!   "learning_rate": 0.001,
//!   "metrics": ["accuracy"],
//!   "epochs": 5,
//!   "batch_size": 32,
//!   "validation_split": 0.0,
//!   "shuffle": true,
//!   "seed": 42
//! }
//! ```

use crate::error::{ModelError, Result};
use crate::optimizers::optimizer_from_name;
use crate::training::{CompileOptions, FitOptions, Loss, Metric};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrainingConfig {
    /// Loss name, e.g. "categorical_crossentropy" or "mean_squared_error"
    pub loss: String,

    /// Optimizer name: "sgd", "adam" or "rmsprop"
    pub optimizer: String,

    pub learning_rate: f32,

    pub metrics: Vec<String>,

    pub epochs: usize,

    pub batch_size: usize,

    /// Fraction of the samples, taken from the end, held out for validation
    pub validation_split: f32,

    pub shuffle: bool,

    /// Seed for parameter initialization, dropout masks and shuffling
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            loss: "categorical_crossentropy".to_string(),
            optimizer: "rmsprop".to_string(),
            learning_rate: 0.001,
            metrics: vec!["accuracy".to_string()],
            epochs: 5,
            batch_size: 32,
            validation_split: 0.0,
            shuffle: true,
            seed: 42,
        }
    }
}

impl TrainingConfig {
    pub fn loss(&self) -> Result<Loss> {
        self.loss.parse()
    }

    pub fn metrics(&self) -> Result<Vec<Metric>> {
        self.metrics.iter().map(|m| m.parse()).collect()
    }

    /// Loss, a freshly constructed optimizer and metrics.
    pub fn compile_options(&self) -> Result<CompileOptions> {
        let optimizer = optimizer_from_name(&self.optimizer, self.learning_rate)?;
        Ok(CompileOptions::new(self.loss()?, optimizer).with_metrics(self.metrics()?))
    }

    pub fn fit_options(&self) -> FitOptions {
        FitOptions {
            epochs: self.epochs,
            batch_size: self.batch_size,
            shuffle: self.shuffle,
            validation_split: self.validation_split,
        }
    }
}

/// Loads a training configuration from a JSON file.
///
/// Reads the file at `path`, deserializes it into a [`TrainingConfig`] and
/// validates it.
///
/// # Examples
///
/// ```no_run
/// use custom_models::config::load_config;
///
/// let cfg = load_config("config/simple_mlp.json").unwrap();
/// assert_eq!(cfg.optimizer, "rmsprop");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<TrainingConfig> {
    let contents = fs::read_to_string(path)?;
    let config: TrainingConfig = serde_json::from_str(&contents)?;
    validate_config(&config)?;
    Ok(config)
}

pub fn validate_config(config: &TrainingConfig) -> Result<()> {
    config.loss()?;
    config.metrics()?;
    optimizer_from_name(&config.optimizer, config.learning_rate)?;

    if !(config.learning_rate > 0.0) {
        return Err(ModelError::InvalidConfig(
            "learning_rate must be positive".to_string(),
        ));
    }
    if config.epochs == 0 {
        return Err(ModelError::InvalidConfig(
            "epochs must be greater than 0".to_string(),
        ));
    }
    if config.batch_size == 0 {
        return Err(ModelError::InvalidConfig(
            "batch_size must be greater than 0".to_string(),
        ));
    }
    if !(0.0..1.0).contains(&config.validation_split) {
        return Err(ModelError::InvalidConfig(format!(
            "validation_split must be in [0, 1), got {}",
            config.validation_split
        )));
    }

    Ok(())
}
