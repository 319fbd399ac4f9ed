//! Shared utilities for neural network implementations
//!
//! Random number generation, activation kernels and small data helpers used
//! by the layers, the training driver and the demos.

pub mod activations;
pub mod data;
pub mod rng;

pub use activations::{relu_inplace, softmax_rows, Activation};
pub use data::{random_labels, random_normal, to_categorical};
pub use rng::SimpleRng;
