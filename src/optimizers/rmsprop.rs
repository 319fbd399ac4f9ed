//! RMSprop optimizer implementation

use crate::optimizers::Optimizer;
use std::collections::HashMap;

/// RMSprop optimizer.
///
/// ```text
/// s_t = ρ * s_{t-1} + (1 - ρ) * gradient²
/// parameter = parameter - α * gradient / (√s_t + ε)
/// ```
///
/// The running average `s` is kept per parameter key.
#[derive(Debug, Clone)]
pub struct RMSprop {
    learning_rate: f32,
    rho: f32,
    epsilon: f32,
    mean_square: HashMap<String, Vec<f32>>,
}

impl RMSprop {
    /// # Examples
    ///
    /// ```
    /// use custom_models::optimizers::{Optimizer, RMSprop};
    ///
    /// let optimizer = RMSprop::new(0.001, 0.9, 1e-7);
    /// assert_eq!(optimizer.learning_rate(), 0.001);
    /// ```
    pub fn new(learning_rate: f32, rho: f32, epsilon: f32) -> Self {
        Self {
            learning_rate,
            rho,
            epsilon,
            mean_square: HashMap::new(),
        }
    }

    pub fn rho(&self) -> f32 {
        self.rho
    }
}

impl Optimizer for RMSprop {
    fn update(&mut self, key: &str, parameters: &mut [f32], gradients: &[f32]) {
        assert_eq!(
            parameters.len(),
            gradients.len(),
            "Parameters and gradients must have the same length"
        );

        let s = self.mean_square.entry(key.to_string()).or_default();
        if s.len() != parameters.len() {
            *s = vec![0.0; parameters.len()];
        }

        for ((param, &g), s_i) in parameters.iter_mut().zip(gradients).zip(s.iter_mut()) {
            *s_i = self.rho * *s_i + (1.0 - self.rho) * g * g;
            *param -= self.learning_rate * g / (s_i.sqrt() + self.epsilon);
        }
    }

    fn reset(&mut self) {
        self.mean_square.clear();
    }

    fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    fn set_learning_rate(&mut self, lr: f32) {
        self.learning_rate = lr;
    }

    fn name(&self) -> &'static str {
        "rmsprop"
    }
}
