//! Batch normalization layer implementation
//!
//! Normalizes each feature over the batch dimension, then applies a learnable
//! scale (gamma) and shift (beta):
//!
//! 1. Compute batch statistics: mean μ and variance σ² across the batch
//! 2. Normalize: x_norm = (x - μ) / sqrt(σ² + ε)
//! 3. Scale and shift: y = γ * x_norm + β
//!
//! Training mode uses batch statistics and folds them into running statistics
//! with an exponential moving average; inference mode uses the running
//! statistics only, which makes inference deterministic.
//!
//! # References
//!
//! Ioffe, S., & Szegedy, C. (2015). Batch Normalization: Accelerating Deep Network Training
//! by Reducing Internal Covariate Shift. ICML.

use crate::error::{ModelError, Result};
use crate::layers::Layer;
use crate::optimizers::Optimizer;
use crate::utils::rng::SimpleRng;
use std::cell::RefCell;

/// Batch normalization over the last (feature) axis.
///
/// # Example
///
/// ```
/// use custom_models::layers::{BatchNormLayer, Layer};
/// use custom_models::utils::SimpleRng;
///
/// let mut layer = BatchNormLayer::new(1e-5, 0.9);
/// layer.build(64, &mut SimpleRng::new(1)).unwrap();
/// assert_eq!(layer.parameter_count(), 128); // 64 gamma + 64 beta
/// ```
pub struct BatchNormLayer {
    size: Option<usize>,
    epsilon: f32,
    momentum: f32,
    training: bool,

    gamma: Vec<f32>,
    beta: Vec<f32>,

    grad_gamma: RefCell<Vec<f32>>,
    grad_beta: RefCell<Vec<f32>>,

    // Updated during training forward passes, read during inference
    running_mean: RefCell<Vec<f32>>,
    running_var: RefCell<Vec<f32>>,

    cached_normalized: RefCell<Vec<f32>>,
    cached_inv_std: RefCell<Vec<f32>>,
}

impl BatchNormLayer {
    /// # Panics
    ///
    /// Panics if `epsilon <= 0` or `momentum` is outside `[0, 1]`.
    pub fn new(epsilon: f32, momentum: f32) -> Self {
        assert!(epsilon > 0.0, "epsilon must be positive");
        assert!(
            (0.0..=1.0).contains(&momentum),
            "momentum must be in range [0.0, 1.0]"
        );

        Self {
            size: None,
            epsilon,
            momentum,
            training: true,
            gamma: Vec::new(),
            beta: Vec::new(),
            grad_gamma: RefCell::new(Vec::new()),
            grad_beta: RefCell::new(Vec::new()),
            running_mean: RefCell::new(Vec::new()),
            running_var: RefCell::new(Vec::new()),
            cached_normalized: RefCell::new(Vec::new()),
            cached_inv_std: RefCell::new(Vec::new()),
        }
    }

    pub fn is_training(&self) -> bool {
        self.training
    }

    pub fn epsilon(&self) -> f32 {
        self.epsilon
    }

    pub fn momentum(&self) -> f32 {
        self.momentum
    }

    pub fn gamma(&self) -> &[f32] {
        &self.gamma
    }

    pub fn beta(&self) -> &[f32] {
        &self.beta
    }

    pub fn running_mean(&self) -> Vec<f32> {
        self.running_mean.borrow().clone()
    }

    pub fn running_var(&self) -> Vec<f32> {
        self.running_var.borrow().clone()
    }

    fn built_size(&self) -> usize {
        self.size.expect("BatchNormLayer used before build")
    }

    fn clear_gradients(&mut self) {
        self.grad_gamma.get_mut().iter_mut().for_each(|g| *g = 0.0);
        self.grad_beta.get_mut().iter_mut().for_each(|g| *g = 0.0);
    }
}

impl Default for BatchNormLayer {
    /// `epsilon = 1e-3`, `momentum = 0.99`.
    fn default() -> Self {
        Self::new(1e-3, 0.99)
    }
}

impl Layer for BatchNormLayer {
    fn kind(&self) -> &'static str {
        "batch_normalization"
    }

    fn build(&mut self, input_size: usize, _rng: &mut SimpleRng) -> Result<()> {
        match self.size {
            Some(existing) if existing == input_size => return Ok(()),
            Some(existing) => {
                return Err(ModelError::shape("BatchNormLayer::build", existing, input_size))
            }
            None => {}
        }
        if input_size == 0 {
            return Err(ModelError::InvalidArgument(
                "BatchNormLayer input size must be greater than 0".to_string(),
            ));
        }

        self.size = Some(input_size);
        self.gamma = vec![1.0f32; input_size];
        self.beta = vec![0.0f32; input_size];
        *self.grad_gamma.get_mut() = vec![0.0f32; input_size];
        *self.grad_beta.get_mut() = vec![0.0f32; input_size];
        *self.running_mean.get_mut() = vec![0.0f32; input_size];
        *self.running_var.get_mut() = vec![1.0f32; input_size];
        Ok(())
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
        let size = self.built_size();
        let total_size = batch_size * size;
        assert_eq!(input.len(), total_size, "input len mismatch");
        assert_eq!(output.len(), total_size, "output len mismatch");

        if !self.training {
            let running_mean = self.running_mean.borrow();
            let running_var = self.running_var.borrow();
            for i in 0..batch_size {
                for j in 0..size {
                    let idx = i * size + j;
                    let normalized =
                        (input[idx] - running_mean[j]) / (running_var[j] + self.epsilon).sqrt();
                    output[idx] = self.gamma[j] * normalized + self.beta[j];
                }
            }
            return;
        }

        let mut batch_mean = vec![0.0f32; size];
        let mut batch_var = vec![0.0f32; size];

        for i in 0..batch_size {
            for j in 0..size {
                batch_mean[j] += input[i * size + j];
            }
        }
        for mean in &mut batch_mean {
            *mean /= batch_size as f32;
        }

        for i in 0..batch_size {
            for j in 0..size {
                let diff = input[i * size + j] - batch_mean[j];
                batch_var[j] += diff * diff;
            }
        }
        for var in &mut batch_var {
            *var /= batch_size as f32;
        }

        let inv_std: Vec<f32> = batch_var
            .iter()
            .map(|&v| 1.0 / (v + self.epsilon).sqrt())
            .collect();

        let mut normalized = vec![0.0f32; total_size];
        for i in 0..batch_size {
            for j in 0..size {
                let idx = i * size + j;
                normalized[idx] = (input[idx] - batch_mean[j]) * inv_std[j];
                output[idx] = self.gamma[j] * normalized[idx] + self.beta[j];
            }
        }

        // running = momentum * running + (1 - momentum) * batch
        let mut running_mean = self.running_mean.borrow_mut();
        let mut running_var = self.running_var.borrow_mut();
        for j in 0..size {
            running_mean[j] = self.momentum * running_mean[j] + (1.0 - self.momentum) * batch_mean[j];
            running_var[j] = self.momentum * running_var[j] + (1.0 - self.momentum) * batch_var[j];
        }

        *self.cached_normalized.borrow_mut() = normalized;
        *self.cached_inv_std.borrow_mut() = inv_std;
    }

    fn backward(
        &self,
        _input: &[f32],
        grad_output: &[f32],
        grad_input: &mut [f32],
        batch_size: usize,
    ) {
        let size = self.built_size();
        let total_size = batch_size * size;
        assert_eq!(grad_output.len(), total_size, "grad_output len mismatch");
        assert_eq!(grad_input.len(), total_size, "grad_input len mismatch");

        if !self.training {
            // Running statistics are constants here, so the layer is affine
            let running_var = self.running_var.borrow();
            for i in 0..batch_size {
                for j in 0..size {
                    let idx = i * size + j;
                    grad_input[idx] =
                        grad_output[idx] * self.gamma[j] / (running_var[j] + self.epsilon).sqrt();
                }
            }
            return;
        }

        let normalized = self.cached_normalized.borrow();
        let inv_std = self.cached_inv_std.borrow();
        let mut grad_gamma = self.grad_gamma.borrow_mut();
        let mut grad_beta = self.grad_beta.borrow_mut();

        let n = batch_size as f32;
        for j in 0..size {
            let mut sum_g = 0.0f32;
            let mut sum_g_xhat = 0.0f32;
            for i in 0..batch_size {
                let idx = i * size + j;
                sum_g += grad_output[idx];
                sum_g_xhat += grad_output[idx] * normalized[idx];
            }
            grad_beta[j] += sum_g;
            grad_gamma[j] += sum_g_xhat;

            // dx = γ / (N σ) * (N g - Σg - x̂ Σ(g x̂))
            let coeff = self.gamma[j] * inv_std[j] / n;
            for i in 0..batch_size {
                let idx = i * size + j;
                grad_input[idx] =
                    coeff * (n * grad_output[idx] - sum_g - normalized[idx] * sum_g_xhat);
            }
        }
    }

    fn update_with_optimizer(&mut self, scope: &str, optimizer: &mut dyn Optimizer) {
        if !self.is_built() {
            return;
        }
        optimizer.update(&format!("{}/gamma", scope), &mut self.gamma, self.grad_gamma.get_mut());
        optimizer.update(&format!("{}/beta", scope), &mut self.beta, self.grad_beta.get_mut());
        self.clear_gradients();
    }

    fn zero_grad(&mut self) {
        self.clear_gradients();
    }

    fn parameters(&self) -> Vec<(&'static str, &[f32])> {
        if !self.is_built() {
            return Vec::new();
        }
        vec![("gamma", &self.gamma), ("beta", &self.beta)]
    }
}
