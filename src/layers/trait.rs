//! Layer trait definition for neural network layers
//!
//! This module defines the core Layer trait that all layer types implement.
//! Layers are created without knowing their input width; the model builds
//! them on first use from the width of the tensor that reaches them.

use crate::error::Result;
use crate::optimizers::Optimizer;
use crate::utils::rng::SimpleRng;

/// Core trait for neural network layers.
///
/// Data is passed as flat row-major `f32` buffers (`batch_size × features`).
/// Forward and backward take `&self`; layers keep their caches and gradient
/// accumulators behind `RefCell`.
///
/// # Example
///
/// ```
/// use custom_models::layers::{DenseLayer, Layer};
/// use custom_models::utils::SimpleRng;
///
/// let mut rng = SimpleRng::new(42);
/// let mut layer = DenseLayer::new(4);
/// layer.build(3, &mut rng).unwrap();
///
/// let input = vec![1.0f32; 2 * 3];
/// let mut output = vec![0.0f32; 2 * 4];
/// layer.forward(&input, &mut output, 2);
/// assert_eq!(layer.parameter_count(), 3 * 4 + 4);
/// ```
pub trait Layer {
    /// Short type name used in summaries and logs (e.g. `"dense"`).
    fn kind(&self) -> &'static str;

    /// Allocate parameters for the given input width.
    ///
    /// Called once, before the first forward pass. Building twice with a
    /// different width is an error.
    fn build(&mut self, input_size: usize, rng: &mut SimpleRng) -> Result<()>;

    fn is_built(&self) -> bool;

    /// Expected input width, once built.
    fn input_size(&self) -> Option<usize>;

    /// Output width, once built.
    fn output_size(&self) -> Option<usize>;

    /// Switch between training and inference behavior.
    ///
    /// Layers without mode-dependent behavior ignore this.
    fn set_training(&mut self, _training: bool) {}

    /// Forward propagation through the layer.
    ///
    /// # Panics
    ///
    /// Implementations panic if the layer is not built or if buffer lengths
    /// don't match `batch_size` times the layer widths.
    fn forward(&self, input: &[f32], output: &mut [f32], batch_size: usize);

    /// Backward propagation through the layer.
    ///
    /// Writes the gradient with respect to `input` into `grad_input` and adds
    /// the parameter gradients to the layer's internal accumulators. `input`
    /// must be the data used in the matching forward pass, and no other
    /// forward pass may run in between.
    fn backward(
        &self,
        input: &[f32],
        grad_output: &[f32],
        grad_input: &mut [f32],
        batch_size: usize,
    );

    /// Apply accumulated gradients through `optimizer`, then clear them.
    ///
    /// Each parameter buffer is passed with the key `"{scope}/{parameter}"`.
    fn update_with_optimizer(&mut self, scope: &str, optimizer: &mut dyn Optimizer);

    /// Discard accumulated gradients without applying them.
    fn zero_grad(&mut self);

    /// Named views of the trainable parameter buffers (empty until built).
    fn parameters(&self) -> Vec<(&'static str, &[f32])>;

    /// Total number of trainable values.
    fn parameter_count(&self) -> usize {
        self.parameters().iter().map(|(_, p)| p.len()).sum()
    }
}
