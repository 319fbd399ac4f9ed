//! Dense (fully connected) layer implementation
//!
//! This module provides a DenseLayer (also known as Linear or Fully Connected layer)
//! that performs the transformation: output = activation(input × kernel + bias)

use crate::error::{ModelError, Result};
use crate::layers::Layer;
use crate::optimizers::Optimizer;
use crate::utils::activations::Activation;
use crate::utils::rng::SimpleRng;
use std::cell::RefCell;

/// Dense (fully connected) layer with a kernel, a bias and an activation.
///
/// Performs `y = f(xW + b)` where x is the input (batch_size × input_size),
/// W is the kernel stored row-major (input_size × units) and b is the bias (units).
///
/// The input width is not known at construction time; the kernel is allocated
/// by [`Layer::build`] the first time the layer is applied.
///
/// # Example
///
/// ```
/// use custom_models::layers::{DenseLayer, Layer};
/// use custom_models::utils::{Activation, SimpleRng};
///
/// let mut layer = DenseLayer::new(32).with_activation(Activation::Relu);
/// assert!(!layer.is_built());
/// assert_eq!(layer.parameter_count(), 0);
///
/// layer.build(100, &mut SimpleRng::new(42)).unwrap();
/// assert_eq!(layer.parameter_count(), 100 * 32 + 32);
/// ```
pub struct DenseLayer {
    units: usize,
    activation: Activation,
    input_size: Option<usize>,
    kernel: Vec<f32>,
    bias: Vec<f32>,
    grad_kernel: RefCell<Vec<f32>>,
    grad_bias: RefCell<Vec<f32>>,
    // Activated output of the last forward pass, needed for the activation derivative
    cached_output: RefCell<Vec<f32>>,
}

impl DenseLayer {
    /// Create an unbuilt dense layer with `units` outputs and linear activation.
    ///
    /// # Panics
    ///
    /// Panics if `units` is zero.
    pub fn new(units: usize) -> Self {
        assert!(units > 0, "units must be greater than 0");
        Self {
            units,
            activation: Activation::Linear,
            input_size: None,
            kernel: Vec::new(),
            bias: Vec::new(),
            grad_kernel: RefCell::new(Vec::new()),
            grad_bias: RefCell::new(Vec::new()),
            cached_output: RefCell::new(Vec::new()),
        }
    }

    pub fn with_activation(mut self, activation: Activation) -> Self {
        self.activation = activation;
        self
    }

    pub fn units(&self) -> usize {
        self.units
    }

    pub fn activation(&self) -> Activation {
        self.activation
    }

    /// Kernel in row-major (input_size × units) order. Empty until built.
    pub fn kernel(&self) -> &[f32] {
        &self.kernel
    }

    pub fn bias(&self) -> &[f32] {
        &self.bias
    }

    /// Overwrite the parameters of a built layer.
    pub fn set_parameters(&mut self, kernel: &[f32], bias: &[f32]) -> Result<()> {
        if kernel.len() != self.kernel.len() || !self.is_built() {
            return Err(ModelError::shape("DenseLayer kernel", self.kernel.len(), kernel.len()));
        }
        if bias.len() != self.units {
            return Err(ModelError::shape("DenseLayer bias", self.units, bias.len()));
        }
        self.kernel.copy_from_slice(kernel);
        self.bias.copy_from_slice(bias);
        Ok(())
    }

    fn built_input_size(&self) -> usize {
        self.input_size.expect("DenseLayer used before build")
    }

    fn clear_gradients(&mut self) {
        self.grad_kernel.get_mut().iter_mut().for_each(|g| *g = 0.0);
        self.grad_bias.get_mut().iter_mut().for_each(|g| *g = 0.0);
    }
}

impl Layer for DenseLayer {
    fn kind(&self) -> &'static str {
        "dense"
    }

    /// Xavier-uniform kernel, `limit = sqrt(6 / (fan_in + fan_out))`, zero bias.
    fn build(&mut self, input_size: usize, rng: &mut SimpleRng) -> Result<()> {
        if input_size == 0 {
            return Err(ModelError::InvalidArgument(
                "DenseLayer input size must be greater than 0".to_string(),
            ));
        }
        if let Some(existing) = self.input_size {
            if existing == input_size {
                return Ok(());
            }
            return Err(ModelError::shape("DenseLayer::build", existing, input_size));
        }

        let limit = (6.0f32 / (input_size + self.units) as f32).sqrt();
        self.kernel = (0..input_size * self.units)
            .map(|_| rng.gen_range_f32(-limit, limit))
            .collect();
        self.bias = vec![0.0f32; self.units];
        *self.grad_kernel.get_mut() = vec![0.0f32; input_size * self.units];
        *self.grad_bias.get_mut() = vec![0.0f32; self.units];
        self.input_size = Some(input_size);
        Ok(())
    }

    fn is_built(&self) -> bool {
        self.input_size.is_some()
    }

    fn input_size(&self) -> Option<usize> {
        self.input_size
    }

    fn output_size(&self) -> Option<usize> {
        Some(self.units)
    }

    fn forward(&self, input: &[f32], output: &mut [f32], batch_size: usize) {
        let input_size = self.built_input_size();
        assert_eq!(input.len(), batch_size * input_size, "input len mismatch");
        assert_eq!(output.len(), batch_size * self.units, "output len mismatch");

        for b in 0..batch_size {
            let x = &input[b * input_size..(b + 1) * input_size];
            let y = &mut output[b * self.units..(b + 1) * self.units];
            y.copy_from_slice(&self.bias);
            for (i, &xi) in x.iter().enumerate() {
                if xi == 0.0 {
                    continue;
                }
                let w_row = &self.kernel[i * self.units..(i + 1) * self.units];
                for (yo, &w) in y.iter_mut().zip(w_row) {
                    *yo += xi * w;
                }
            }
        }

        self.activation.apply(output, batch_size, self.units);

        let mut cache = self.cached_output.borrow_mut();
        cache.clear();
        cache.extend_from_slice(output);
    }

    fn backward(
        &self,
        input: &[f32],
        grad_output: &[f32],
        grad_input: &mut [f32],
        batch_size: usize,
    ) {
        let input_size = self.built_input_size();
        assert_eq!(input.len(), batch_size * input_size, "input len mismatch");
        assert_eq!(grad_output.len(), batch_size * self.units, "grad_output len mismatch");
        assert_eq!(grad_input.len(), batch_size * input_size, "grad_input len mismatch");

        let cached = self.cached_output.borrow();
        let mut grad_pre = vec![0.0f32; grad_output.len()];
        self.activation
            .backward(&cached, grad_output, &mut grad_pre, batch_size, self.units);

        let mut grad_kernel = self.grad_kernel.borrow_mut();
        let mut grad_bias = self.grad_bias.borrow_mut();

        for b in 0..batch_size {
            let x = &input[b * input_size..(b + 1) * input_size];
            let g = &grad_pre[b * self.units..(b + 1) * self.units];
            let gx = &mut grad_input[b * input_size..(b + 1) * input_size];

            for (gb, &gv) in grad_bias.iter_mut().zip(g) {
                *gb += gv;
            }
            for i in 0..input_size {
                let w_row = &self.kernel[i * self.units..(i + 1) * self.units];
                let gk_row = &mut grad_kernel[i * self.units..(i + 1) * self.units];
                let mut acc = 0.0f32;
                for o in 0..self.units {
                    gk_row[o] += x[i] * g[o];
                    acc += g[o] * w_row[o];
                }
                gx[i] = acc;
            }
        }
    }

    fn update_with_optimizer(&mut self, scope: &str, optimizer: &mut dyn Optimizer) {
        if !self.is_built() {
            return;
        }
        optimizer.update(
            &format!("{}/kernel", scope),
            &mut self.kernel,
            self.grad_kernel.get_mut(),
        );
        optimizer.update(&format!("{}/bias", scope), &mut self.bias, self.grad_bias.get_mut());
        self.clear_gradients();
    }

    fn zero_grad(&mut self) {
        self.clear_gradients();
    }

    fn parameters(&self) -> Vec<(&'static str, &[f32])> {
        if !self.is_built() {
            return Vec::new();
        }
        vec![("kernel", &self.kernel), ("bias", &self.bias)]
    }
}
