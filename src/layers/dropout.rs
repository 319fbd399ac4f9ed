//! Dropout layer implementation for regularization
//!
//! During training a fraction of input units is set to zero and the survivors
//! are scaled by 1/(1-rate). During inference inputs pass through unchanged.

use crate::error::{ModelError, Result};
use crate::layers::Layer;
use crate::optimizers::Optimizer;
use crate::utils::rng::SimpleRng;
use std::cell::RefCell;

/// Inverted dropout.
///
/// The mask stream is forked from the model's initialization RNG at build
/// time, so a seeded model drops the same units on every run.
///
/// # Example
///
/// ```
/// use custom_models::layers::{DropoutLayer, Layer};
/// use custom_models::utils::SimpleRng;
///
/// let mut layer = DropoutLayer::new(0.5);
/// layer.build(4, &mut SimpleRng::new(42)).unwrap();
/// layer.set_training(false);
///
/// let input = vec![1.0, 2.0, 3.0, 4.0];
/// let mut output = vec![0.0; 4];
/// layer.forward(&input, &mut output, 1);
/// assert_eq!(output, input);
/// ```
pub struct DropoutLayer {
    rate: f32,
    size: Option<usize>,
    training: bool,
    mask: RefCell<Vec<f32>>,
    rng: RefCell<SimpleRng>,
}

impl DropoutLayer {
    /// # Panics
    ///
    /// Panics if `rate` is outside `[0.0, 1.0)`.
    pub fn new(rate: f32) -> Self {
        assert!((0.0..1.0).contains(&rate), "rate must be in range [0.0, 1.0)");

        Self {
            rate,
            size: None,
            training: true,
            mask: RefCell::new(Vec::new()),
            rng: RefCell::new(SimpleRng::new(0)),
        }
    }

    pub fn rate(&self) -> f32 {
        self.rate
    }

    pub fn is_training(&self) -> bool {
        self.training
    }

    fn built_size(&self) -> usize {
        self.size.expect("DropoutLayer used before build")
    }
}

impl Layer for DropoutLayer {
    fn kind(&self) -> &'static str {
        "dropout"
    }

    fn build(&mut self, input_size: usize, rng: &mut SimpleRng) -> Result<()> {
        match self.size {
            Some(existing) if existing == input_size => Ok(()),
            Some(existing) => Err(ModelError::shape("DropoutLayer::build", existing, input_size)),
            None => {
                self.size = Some(input_size);
                *self.rng.get_mut() = rng.fork();
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

    fn set_training(&mut self, training: bool) {
        self.training = training;
    }

    fn forward(&self, input: &[f32], output: &mut [f32], batch_size: usize) {
        let total_size = batch_size * self.built_size();
        assert_eq!(input.len(), total_size, "input len mismatch");
        assert_eq!(output.len(), total_size, "output len mismatch");

        if !self.training || self.rate == 0.0 {
            output.copy_from_slice(input);
            let mut mask = self.mask.borrow_mut();
            mask.clear();
            mask.resize(total_size, 1.0);
            return;
        }

        let scale = 1.0 / (1.0 - self.rate);
        let mut mask = self.mask.borrow_mut();
        let mut rng = self.rng.borrow_mut();
        mask.resize(total_size, 0.0);

        for i in 0..total_size {
            if rng.next_f32() >= self.rate {
                mask[i] = scale;
                output[i] = input[i] * scale;
            } else {
                mask[i] = 0.0;
                output[i] = 0.0;
            }
        }
    }

    fn backward(
        &self,
        _input: &[f32],
        grad_output: &[f32],
        grad_input: &mut [f32],
        batch_size: usize,
    ) {
        let total_size = batch_size * self.built_size();
        assert_eq!(grad_output.len(), total_size, "grad_output len mismatch");
        assert_eq!(grad_input.len(), total_size, "grad_input len mismatch");

        let mask = self.mask.borrow();
        for ((gi, &go), &m) in grad_input.iter_mut().zip(grad_output).zip(mask.iter()) {
            *gi = go * m;
        }
    }

    fn update_with_optimizer(&mut self, _scope: &str, _optimizer: &mut dyn Optimizer) {}

    fn zero_grad(&mut self) {}

    fn parameters(&self) -> Vec<(&'static str, &[f32])> {
        Vec::new()
    }
}
