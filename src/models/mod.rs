//! Ready-made custom models.

pub mod simple_mlp;

pub use simple_mlp::{simple_mlp, MlpConfig};
