//! Optimizer abstractions for neural network parameter updates
//!
//! Optimizers define how gradients turn into parameter updates. Every update
//! carries the parameter's tracking path (for example `"dense1/kernel"`), so
//! stateful optimizers keep one set of moment estimates per parameter buffer
//! instead of sharing state between unrelated tensors.
//!
//! # Available Optimizers
//!
//! - SGD: Vanilla stochastic gradient descent
//! - Adam: Adaptive moment estimation with bias correction
//! - RMSprop: Moving average of squared gradients
//!
//! # Example
//!
//! ```
//! use custom_models::optimizers::{Optimizer, SGD};
//!
//! let mut optimizer = SGD::new(0.1);
//! let mut weights = vec![1.0, 2.0];
//! optimizer.update("dense/kernel", &mut weights, &[1.0, -1.0]);
//! assert!((weights[0] - 0.9).abs() < 1e-6);
//! ```

pub mod adam;
pub mod rmsprop;
pub mod sgd;

pub use adam::Adam;
pub use rmsprop::RMSprop;
pub use sgd::SGD;

use crate::error::{ModelError, Result};

/// Core trait for neural network optimizers.
///
/// Layers hand each of their tracked parameter buffers to the optimizer
/// together with the accumulated gradient. The `key` identifies the buffer
/// across steps.
pub trait Optimizer {
    /// Update parameters in place using gradients.
    ///
    /// # Panics
    ///
    /// Implementations panic if `parameters` and `gradients` have different lengths.
    fn update(&mut self, key: &str, parameters: &mut [f32], gradients: &[f32]);

    /// Clear any accumulated state (moments, step counters).
    fn reset(&mut self);

    /// Base learning rate.
    fn learning_rate(&self) -> f32;

    /// Replace the base learning rate.
    fn set_learning_rate(&mut self, lr: f32);

    /// Short lowercase name used in logs and summaries.
    fn name(&self) -> &'static str;
}

/// Names accepted by [`optimizer_from_name`].
pub const OPTIMIZER_NAMES: [&str; 3] = ["sgd", "adam", "rmsprop"];

/// Build an optimizer with default hyperparameters from its name.
pub fn optimizer_from_name(name: &str, learning_rate: f32) -> Result<Box<dyn Optimizer>> {
    match name.to_lowercase().as_str() {
        "sgd" => Ok(Box::new(SGD::new(learning_rate))),
        "adam" => Ok(Box::new(Adam::new(learning_rate, 0.9, 0.999, 1e-7))),
        "rmsprop" => Ok(Box::new(RMSprop::new(learning_rate, 0.9, 1e-7))),
        other => Err(ModelError::InvalidConfig(format!(
            "Invalid optimizer '{}'. Must be one of: {}",
            other,
            OPTIMIZER_NAMES.join(", ")
        ))),
    }
}
