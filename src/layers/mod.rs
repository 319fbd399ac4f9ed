//! Layer abstractions for neural networks
//!
//! This module provides the Layer trait and the primitive layers a custom
//! model attaches during setup.

mod r#trait;
pub mod activation;
pub mod batchnorm;
pub mod dense;
pub mod dropout;

pub use activation::ActivationLayer;
pub use batchnorm::BatchNormLayer;
pub use dense::DenseLayer;
pub use dropout::DropoutLayer;
pub use r#trait::Layer;
