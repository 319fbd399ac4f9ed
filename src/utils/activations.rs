//! Activation functions for neural networks
//!
//! Kernels work in place on row-major `rows × cols` buffers. The backward
//! helpers take the *activated* output, which is what the layers cache.

use crate::error::{ModelError, Result};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// ReLU activation function applied in-place.
///
/// Sets all negative values to 0.0, keeps positive values unchanged.
pub fn relu_inplace(data: &mut [f32]) {
    for value in data.iter_mut() {
        if *value < 0.0 {
            *value = 0.0;
        }
    }
}

/// Logistic sigmoid applied in-place.
pub fn sigmoid_inplace(data: &mut [f32]) {
    for value in data.iter_mut() {
        *value = 1.0 / (1.0 + (-*value).exp());
    }
}

/// Hyperbolic tangent applied in-place.
pub fn tanh_inplace(data: &mut [f32]) {
    for value in data.iter_mut() {
        *value = value.tanh();
    }
}

/// Softmax activation function applied row-wise.
///
/// Converts logits to probabilities for each row. Uses the max-subtraction
/// trick for numerical stability to avoid overflow with large values.
///
/// # Arguments
/// * `outputs` - Flat array containing row-major matrix data
/// * `rows` - Number of rows in the matrix
/// * `cols` - Number of columns in the matrix
pub fn softmax_rows(outputs: &mut [f32], rows: usize, cols: usize) {
    if cols == 0 {
        return;
    }
    assert_eq!(outputs.len(), rows * cols, "outputs length mismatch in softmax_rows");

    for row in outputs.chunks_exact_mut(cols).take(rows) {
        let mut max_value = row[0];
        for &value in row.iter().skip(1) {
            if value > max_value {
                max_value = value;
            }
        }

        let mut sum = 0.0f32;
        for value in row.iter_mut() {
            *value = (*value - max_value).exp();
            sum += *value;
        }

        let inv_sum = 1.0f32 / sum;
        for value in row.iter_mut() {
            *value *= inv_sum;
        }
    }
}

/// Element-wise or row-wise activation attached to a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    #[default]
    Linear,
    Relu,
    Sigmoid,
    Tanh,
    Softmax,
}

impl Activation {
    /// Apply the activation in place.
    pub fn apply(self, data: &mut [f32], rows: usize, cols: usize) {
        match self {
            Activation::Linear => {}
            Activation::Relu => relu_inplace(data),
            Activation::Sigmoid => sigmoid_inplace(data),
            Activation::Tanh => tanh_inplace(data),
            Activation::Softmax => softmax_rows(data, rows, cols),
        }
    }

    /// Gradient with respect to the pre-activation, given the activated output.
    ///
    /// Softmax uses the full row Jacobian: `dz_i = y_i * (g_i - Σ_j g_j y_j)`.
    pub fn backward(
        self,
        output: &[f32],
        grad_output: &[f32],
        grad_input: &mut [f32],
        rows: usize,
        cols: usize,
    ) {
        assert_eq!(output.len(), rows * cols, "output length mismatch in activation backward");
        assert_eq!(grad_output.len(), output.len(), "grad_output length mismatch");
        assert_eq!(grad_input.len(), output.len(), "grad_input length mismatch");

        match self {
            Activation::Linear => grad_input.copy_from_slice(grad_output),
            Activation::Relu => {
                for ((gi, &go), &y) in grad_input.iter_mut().zip(grad_output).zip(output) {
                    *gi = if y > 0.0 { go } else { 0.0 };
                }
            }
            Activation::Sigmoid => {
                for ((gi, &go), &y) in grad_input.iter_mut().zip(grad_output).zip(output) {
                    *gi = go * y * (1.0 - y);
                }
            }
            Activation::Tanh => {
                for ((gi, &go), &y) in grad_input.iter_mut().zip(grad_output).zip(output) {
                    *gi = go * (1.0 - y * y);
                }
            }
            Activation::Softmax => {
                if cols == 0 {
                    return;
                }
                for r in 0..rows {
                    let span = r * cols..(r + 1) * cols;
                    let y = &output[span.clone()];
                    let g = &grad_output[span.clone()];
                    let dot: f32 = y.iter().zip(g).map(|(a, b)| a * b).sum();
                    for ((gi, &yi), &gv) in grad_input[span].iter_mut().zip(y).zip(g) {
                        *gi = yi * (gv - dot);
                    }
                }
            }
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Activation::Linear => "linear",
            Activation::Relu => "relu",
            Activation::Sigmoid => "sigmoid",
            Activation::Tanh => "tanh",
            Activation::Softmax => "softmax",
        }
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Activation {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "linear" | "none" => Ok(Activation::Linear),
            "relu" => Ok(Activation::Relu),
            "sigmoid" => Ok(Activation::Sigmoid),
            "tanh" => Ok(Activation::Tanh),
            "softmax" => Ok(Activation::Softmax),
            other => Err(ModelError::InvalidArgument(format!(
                "Invalid activation '{}'. Must be one of: linear, relu, sigmoid, tanh, softmax",
                other
            ))),
        }
    }
}
