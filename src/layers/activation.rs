//! Stand-alone activation layer.

use crate::error::{ModelError, Result};
use crate::layers::Layer;
use crate::optimizers::Optimizer;
use crate::utils::activations::Activation;
use crate::utils::rng::SimpleRng;
use std::cell::RefCell;

/// Applies an [`Activation`] without any parameters of its own.
pub struct ActivationLayer {
    activation: Activation,
    size: Option<usize>,
    cached_output: RefCell<Vec<f32>>,
}

impl ActivationLayer {
    pub fn new(activation: Activation) -> Self {
        Self {
            activation,
            size: None,
            cached_output: RefCell::new(Vec::new()),
        }
    }

    pub fn activation(&self) -> Activation {
        self.activation
    }

    fn built_size(&self) -> usize {
        self.size.expect("ActivationLayer used before build")
    }
}

impl Layer for ActivationLayer {
    fn kind(&self) -> &'static str {
        "activation"
    }

    fn build(&mut self, input_size: usize, _rng: &mut SimpleRng) -> Result<()> {
        match self.size {
            Some(existing) if existing != input_size => {
                Err(ModelError::shape("ActivationLayer::build", existing, input_size))
            }
            _ => {
                self.size = Some(input_size);
                Ok(())
            }
        }
    }

    fn is_built(&self) -> bool {
        self.size.is_some()
    }

    fn input_size(&self) -> Option<usize> {
        self.size
    }

    fn output_size(&self) -> Option<usize> {
        self.size
    }

    fn forward(&self, input: &[f32], output: &mut [f32], batch_size: usize) {
        let size = self.built_size();
        assert_eq!(input.len(), batch_size * size, "input len mismatch");
        assert_eq!(output.len(), input.len(), "output len mismatch");

        output.copy_from_slice(input);
        self.activation.apply(output, batch_size, size);

        let mut cache = self.cached_output.borrow_mut();
        cache.clear();
        cache.extend_from_slice(output);
    }

    fn backward(
        &self,
        _input: &[f32],
        grad_output: &[f32],
        grad_input: &mut [f32],
        batch_size: usize,
    ) {
        let size = self.built_size();
        let cached = self.cached_output.borrow();
        self.activation
            .backward(&cached, grad_output, grad_input, batch_size, size);
    }

    fn update_with_optimizer(&mut self, _scope: &str, _optimizer: &mut dyn Optimizer) {}

    fn zero_grad(&mut self) {}

    fn parameters(&self) -> Vec<(&'static str, &[f32])> {
        Vec::new()
    }
}
