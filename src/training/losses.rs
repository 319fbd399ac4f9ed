//! Loss functions: value and gradient with respect to the predictions.

use crate::error::{ModelError, Result};
use crate::tensor::Tensor;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

const EPSILON: f32 = 1e-7;

/// Training objective selected at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Loss {
    /// Targets are one-hot rows; predictions are probabilities.
    CategoricalCrossentropy,
    /// Targets are one column of class indices.
    SparseCategoricalCrossentropy,
    MeanSquaredError,
    BinaryCrossentropy,
}

/// Names accepted by [`Loss::from_str`].
pub const LOSS_NAMES: [&str; 4] = [
    "categorical_crossentropy",
    "sparse_categorical_crossentropy",
    "mean_squared_error",
    "binary_crossentropy",
];

fn clip(p: f32) -> f32 {
    p.clamp(EPSILON, 1.0 - EPSILON)
}

/// Class index stored in a sparse target cell.
fn class_index(value: f32, classes: usize) -> Result<usize> {
    if value < 0.0 || value.fract() != 0.0 || value as usize >= classes {
        return Err(ModelError::InvalidArgument(format!(
            "sparse target {} is not a class index below {}",
            value, classes
        )));
    }
    Ok(value as usize)
}

impl Loss {
    pub fn name(&self) -> &'static str {
        match self {
            Loss::CategoricalCrossentropy => "categorical_crossentropy",
            Loss::SparseCategoricalCrossentropy => "sparse_categorical_crossentropy",
            Loss::MeanSquaredError => "mean_squared_error",
            Loss::BinaryCrossentropy => "binary_crossentropy",
        }
    }

    fn check_shapes(&self, predictions: &Tensor, targets: &Tensor) -> Result<()> {
        if predictions.rows() == 0 {
            return Err(ModelError::EmptyBatch);
        }
        let expected = match self {
            Loss::SparseCategoricalCrossentropy => (predictions.rows(), 1),
            _ => predictions.shape(),
        };
        if targets.shape() != expected {
            return Err(ModelError::shape(
                format!("{} targets", self.name()),
                format!("{}x{}", expected.0, expected.1),
                format!("{}x{}", targets.rows(), targets.cols()),
            ));
        }
        Ok(())
    }

    /// Mean loss over the batch.
    pub fn compute(&self, predictions: &Tensor, targets: &Tensor) -> Result<f32> {
        self.check_shapes(predictions, targets)?;
        let rows = predictions.rows() as f32;
        let p = predictions.as_slice();
        let y = targets.as_slice();

        let value = match self {
            Loss::CategoricalCrossentropy => {
                -p.iter()
                    .zip(y)
                    .filter(|&(_, &t)| t != 0.0)
                    .map(|(&pi, &t)| t * clip(pi).ln())
                    .sum::<f32>()
                    / rows
            }
            Loss::SparseCategoricalCrossentropy => {
                let mut total = 0.0f32;
                for (row, &t) in predictions.iter_rows().zip(y) {
                    total -= clip(row[class_index(t, row.len())?]).ln();
                }
                total / rows
            }
            Loss::MeanSquaredError => {
                p.iter().zip(y).map(|(&pi, &t)| (pi - t) * (pi - t)).sum::<f32>() / p.len() as f32
            }
            Loss::BinaryCrossentropy => {
                -p.iter()
                    .zip(y)
                    .map(|(&pi, &t)| {
                        let pi = clip(pi);
                        t * pi.ln() + (1.0 - t) * (1.0 - pi).ln()
                    })
                    .sum::<f32>()
                    / p.len() as f32
            }
        };
        Ok(value)
    }

    /// Gradient of [`Loss::compute`] with respect to `predictions`.
    pub fn gradient(&self, predictions: &Tensor, targets: &Tensor) -> Result<Tensor> {
        self.check_shapes(predictions, targets)?;
        let rows = predictions.rows();
        let cols = predictions.cols();
        let mut grad = Tensor::zeros(rows, cols);
        let p = predictions.as_slice();
        let y = targets.as_slice();
        let g = grad.as_mut_slice();

        match self {
            Loss::CategoricalCrossentropy => {
                for ((gi, &pi), &t) in g.iter_mut().zip(p).zip(y) {
                    *gi = -t / clip(pi) / rows as f32;
                }
            }
            Loss::SparseCategoricalCrossentropy => {
                for (r, &t) in y.iter().enumerate() {
                    let c = class_index(t, cols)?;
                    g[r * cols + c] = -1.0 / clip(p[r * cols + c]) / rows as f32;
                }
            }
            Loss::MeanSquaredError => {
                let n = p.len() as f32;
                for ((gi, &pi), &t) in g.iter_mut().zip(p).zip(y) {
                    *gi = 2.0 * (pi - t) / n;
                }
            }
            Loss::BinaryCrossentropy => {
                let n = p.len() as f32;
                for ((gi, &pi), &t) in g.iter_mut().zip(p).zip(y) {
                    let pi = clip(pi);
                    *gi = (-(t / pi) + (1.0 - t) / (1.0 - pi)) / n;
                }
            }
        }
        Ok(grad)
    }
}

impl fmt::Display for Loss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Loss {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "categorical_crossentropy" => Ok(Loss::CategoricalCrossentropy),
            "sparse_categorical_crossentropy" => Ok(Loss::SparseCategoricalCrossentropy),
            "mean_squared_error" | "mse" => Ok(Loss::MeanSquaredError),
            "binary_crossentropy" => Ok(Loss::BinaryCrossentropy),
            other => Err(ModelError::InvalidConfig(format!(
                "Invalid loss '{}'. Must be one of: {}",
                other,
                LOSS_NAMES.join(", ")
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn tensor(data: &[f32], rows: usize, cols: usize) -> Tensor {
        Tensor::new(data.to_vec(), rows, cols).unwrap()
    }

    #[test]
    fn test_categorical_crossentropy_value() {
        let p = tensor(&[0.9, 0.1, 0.2, 0.8], 2, 2);
        let y = tensor(&[1.0, 0.0, 0.0, 1.0], 2, 2);
        let loss = Loss::CategoricalCrossentropy.compute(&p, &y).unwrap();
        let expected = -(0.9f32.ln() + 0.8f32.ln()) / 2.0;
        assert_relative_eq!(loss, expected, epsilon = 1e-6);
    }

    #[test]
    fn test_crossentropy_clips_zero_probability() {
        let p = tensor(&[0.0, 1.0], 1, 2);
        let y = tensor(&[1.0, 0.0], 1, 2);
        let loss = Loss::CategoricalCrossentropy.compute(&p, &y).unwrap();
        assert!(loss.is_finite());
        assert_relative_eq!(loss, -(1e-7f32).ln(), epsilon = 1e-3);
    }

    #[test]
    fn test_sparse_matches_categorical() {
        let p = tensor(&[0.7, 0.2, 0.1, 0.1, 0.3, 0.6], 2, 3);
        let one_hot = tensor(&[1.0, 0.0, 0.0, 0.0, 0.0, 1.0], 2, 3);
        let sparse = tensor(&[0.0, 2.0], 2, 1);

        let a = Loss::CategoricalCrossentropy.compute(&p, &one_hot).unwrap();
        let b = Loss::SparseCategoricalCrossentropy.compute(&p, &sparse).unwrap();
        assert_relative_eq!(a, b, epsilon = 1e-6);

        let ga = Loss::CategoricalCrossentropy.gradient(&p, &one_hot).unwrap();
        let gb = Loss::SparseCategoricalCrossentropy.gradient(&p, &sparse).unwrap();
        for (x, y) in ga.as_slice().iter().zip(gb.as_slice()) {
            assert_relative_eq!(x, y, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_sparse_rejects_bad_index() {
        let p = tensor(&[0.5, 0.5], 1, 2);
        let y = tensor(&[2.0], 1, 1);
        assert!(Loss::SparseCategoricalCrossentropy.compute(&p, &y).is_err());
    }

    #[test]
    fn test_mse_gradient_finite_difference() {
        let p = tensor(&[0.3, -0.2, 1.5, 0.0], 2, 2);
        let y = tensor(&[0.0, 0.0, 1.0, 1.0], 2, 2);
        let grad = Loss::MeanSquaredError.gradient(&p, &y).unwrap();

        let h = 1e-3;
        for i in 0..4 {
            let mut plus = p.clone();
            plus.as_mut_slice()[i] += h;
            let mut minus = p.clone();
            minus.as_mut_slice()[i] -= h;
            let numeric = (Loss::MeanSquaredError.compute(&plus, &y).unwrap()
                - Loss::MeanSquaredError.compute(&minus, &y).unwrap())
                / (2.0 * h);
            assert_relative_eq!(grad.as_slice()[i], numeric, epsilon = 1e-3);
        }
    }

    #[test]
    fn test_binary_crossentropy() {
        let p = tensor(&[0.8, 0.3], 2, 1);
        let y = tensor(&[1.0, 0.0], 2, 1);
        let loss = Loss::BinaryCrossentropy.compute(&p, &y).unwrap();
        let expected = -(0.8f32.ln() + 0.7f32.ln()) / 2.0;
        assert_relative_eq!(loss, expected, epsilon = 1e-6);

        let grad = Loss::BinaryCrossentropy.gradient(&p, &y).unwrap();
        assert!(grad.as_slice()[0] < 0.0);
        assert!(grad.as_slice()[1] > 0.0);
    }

    #[test]
    fn test_shape_mismatch() {
        let p = tensor(&[0.5, 0.5], 1, 2);
        let y = tensor(&[1.0, 0.0, 0.0], 1, 3);
        assert!(matches!(
            Loss::CategoricalCrossentropy.compute(&p, &y),
            Err(ModelError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_from_str() {
        assert_eq!("MSE".parse::<Loss>().unwrap(), Loss::MeanSquaredError);
        assert!("hinge".parse::<Loss>().is_err());
    }
}
