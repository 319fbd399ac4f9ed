//! Custom models on a small neural network library
//!
//! A custom model is defined by a builder and a forward procedure. The builder
//! runs once and attaches the layers the model owns to its
//! [`ModelContext`](model::ModelContext); the forward procedure composes those
//! layers on every invocation. Attached layers are tracked: their parameters
//! are enumerated by the model and updated by the training driver. A layer
//! created inside the forward procedure without being attached still runs, but
//! is never trained.
//!
//! # Modules
//!
//! - `model`: execution context, layer registry, forward pass and `CustomModel`
//! - `layers`: Layer trait and implementations (Dense, Dropout, BatchNorm, Activation)
//! - `training`: losses, metrics, `compile`, `fit`, `evaluate`
//! - `optimizers`: Optimizer trait and implementations (SGD, Adam, RMSprop)
//! - `models`: the two-layer MLP with optional dropout and batch normalization
//! - `config`: JSON training configuration
//! - `tensor`: row-major 2-D `f32` tensor
//! - `utils`: RNG, activation kernels and data helpers
//!
//! # Example
//!
//! ```
//! use custom_models::model::ExecutionContext;
//! use custom_models::models::{simple_mlp, MlpConfig};
//! use custom_models::optimizers::RMSprop;
//! use custom_models::training::{CompileOptions, FitOptions, Loss, Metric};
//! use custom_models::utils::{random_labels, random_normal, to_categorical, SimpleRng};
//!
//! let exec = ExecutionContext::training(42);
//! let mut rng = SimpleRng::new(7);
//! let x = random_normal(64, 20, &mut rng);
//! let y = to_categorical(&random_labels(64, 4, &mut rng), 4).unwrap();
//!
//! let mut model = simple_mlp(MlpConfig::new(4).with_dropout(true), None, &exec).unwrap();
//! model.compile(
//!     CompileOptions::new(Loss::CategoricalCrossentropy, Box::new(RMSprop::new(0.001, 0.9, 1e-7)))
//!         .with_metrics(vec![Metric::Accuracy]),
//! );
//! let history = model
//!     .fit(&exec, &x, &y, FitOptions { epochs: 2, batch_size: 16, ..FitOptions::default() })
//!     .unwrap();
//! assert_eq!(history.len(), 2);
//! ```

pub mod config;
pub mod error;
pub mod layers;
pub mod model;
pub mod models;
pub mod optimizers;
pub mod tensor;
pub mod training;
pub mod utils;

pub use error::{ModelError, Result};
