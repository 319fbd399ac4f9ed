//! Metrics reported alongside the loss.

use crate::error::{ModelError, Result};
use crate::tensor::Tensor;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Fraction of rows whose predicted class matches the target.
    ///
    /// One-hot targets are compared by argmax, a single target column holding
    /// class indices against the prediction argmax, and single-column
    /// predictions are thresholded at 0.5.
    Accuracy,
    MeanAbsoluteError,
}

pub const METRIC_NAMES: [&str; 2] = ["accuracy", "mean_absolute_error"];

impl Metric {
    pub fn name(&self) -> &'static str {
        match self {
            Metric::Accuracy => "accuracy",
            Metric::MeanAbsoluteError => "mean_absolute_error",
        }
    }

    pub fn compute(&self, predictions: &Tensor, targets: &Tensor) -> Result<f32> {
        if predictions.rows() == 0 {
            return Err(ModelError::EmptyBatch);
        }
        if targets.rows() != predictions.rows() {
            return Err(ModelError::shape(
                format!("{} target rows", self.name()),
                predictions.rows(),
                targets.rows(),
            ));
        }

        match self {
            Metric::Accuracy => accuracy(predictions, targets),
            Metric::MeanAbsoluteError => {
                if targets.cols() != predictions.cols() {
                    return Err(ModelError::shape(
                        "mean_absolute_error target columns",
                        predictions.cols(),
                        targets.cols(),
                    ));
                }
                let p = predictions.as_slice();
                let sum: f32 = p
                    .iter()
                    .zip(targets.as_slice())
                    .map(|(a, b)| (a - b).abs())
                    .sum();
                Ok(sum / p.len() as f32)
            }
        }
    }
}

fn accuracy(predictions: &Tensor, targets: &Tensor) -> Result<f32> {
    let rows = predictions.rows();
    let correct = match (predictions.cols(), targets.cols()) {
        (1, 1) => predictions
            .as_slice()
            .iter()
            .zip(targets.as_slice())
            .filter(|&(&p, &t)| (p >= 0.5) == (t >= 0.5))
            .count(),
        (_, 1) => predictions
            .argmax_rows()
            .into_iter()
            .zip(targets.as_slice())
            .filter(|&(p, &t)| p as f32 == t)
            .count(),
        (p_cols, t_cols) if p_cols == t_cols => predictions
            .argmax_rows()
            .into_iter()
            .zip(targets.argmax_rows())
            .filter(|(p, t)| p == t)
            .count(),
        (p_cols, t_cols) => {
            return Err(ModelError::shape("accuracy target columns", p_cols, t_cols));
        }
    };
    Ok(correct as f32 / rows as f32)
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Metric {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "accuracy" | "acc" => Ok(Metric::Accuracy),
            "mean_absolute_error" | "mae" => Ok(Metric::MeanAbsoluteError),
            other => Err(ModelError::InvalidConfig(format!(
                "Invalid metric '{}'. Must be one of: {}",
                other,
                METRIC_NAMES.join(", ")
            ))),
        }
    }
}
