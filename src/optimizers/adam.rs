//! Adam (Adaptive Moment Estimation) optimizer implementation
//!
//! Combines momentum and adaptive learning rates with bias correction.

use crate::optimizers::Optimizer;
use std::collections::HashMap;

/// Moment estimates for a single parameter buffer.
#[derive(Debug, Clone, Default)]
struct MomentState {
    m: Vec<f32>,
    v: Vec<f32>,
    t: u32,
}

/// Adam optimizer.
///
/// ```text
/// m_t = β1 * m_{t-1} + (1 - β1) * gradient
/// v_t = β2 * v_{t-1} + (1 - β2) * gradient²
/// m_hat = m_t / (1 - β1^t)
/// v_hat = v_t / (1 - β2^t)
/// parameter = parameter - α * m_hat / (√v_hat + ε)
/// ```
///
/// `m`, `v` and the step counter `t` are kept per parameter key, so two
/// layers never share moment estimates.
///
/// # Reference
///
/// Kingma, D. P., & Ba, J. (2014). Adam: A method for stochastic optimization.
/// arXiv preprint arXiv:1412.6980.
#[derive(Debug, Clone)]
pub struct Adam {
    learning_rate: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    state: HashMap<String, MomentState>,
}

impl Adam {
    /// Creates a new Adam optimizer.
    ///
    /// # Examples
    ///
    /// ```
    /// use custom_models::optimizers::{Adam, Optimizer};
    ///
    /// let optimizer = Adam::new(0.001, 0.9, 0.999, 1e-8);
    /// assert_eq!(optimizer.learning_rate(), 0.001);
    /// ```
    pub fn new(learning_rate: f32, beta1: f32, beta2: f32, epsilon: f32) -> Self {
        Self {
            learning_rate,
            beta1,
            beta2,
            epsilon,
            state: HashMap::new(),
        }
    }

    /// Number of update steps applied to `key` so far.
    pub fn steps(&self, key: &str) -> u32 {
        self.state.get(key).map_or(0, |s| s.t)
    }
}

impl Optimizer for Adam {
    fn update(&mut self, key: &str, parameters: &mut [f32], gradients: &[f32]) {
        assert_eq!(
            parameters.len(),
            gradients.len(),
            "Parameters and gradients must have the same length"
        );

        let state = self.state.entry(key.to_string()).or_default();
        if state.m.len() != parameters.len() {
            state.m = vec![0.0; parameters.len()];
            state.v = vec![0.0; parameters.len()];
            state.t = 0;
        }

        state.t += 1;
        let bias_correction1 = 1.0 - self.beta1.powi(state.t as i32);
        let bias_correction2 = 1.0 - self.beta2.powi(state.t as i32);

        for i in 0..parameters.len() {
            let g = gradients[i];
            state.m[i] = self.beta1 * state.m[i] + (1.0 - self.beta1) * g;
            state.v[i] = self.beta2 * state.v[i] + (1.0 - self.beta2) * g * g;

            let m_hat = state.m[i] / bias_correction1;
            let v_hat = state.v[i] / bias_correction2;

            parameters[i] -= self.learning_rate * m_hat / (v_hat.sqrt() + self.epsilon);
        }
    }

    fn reset(&mut self) {
        self.state.clear();
    }

    fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    fn set_learning_rate(&mut self, lr: f32) {
        self.learning_rate = lr;
    }

    fn name(&self) -> &'static str {
        "adam"
    }
}
