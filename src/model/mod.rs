//! Custom models: explicit execution context, layer registry, forward pass.
//!
//! A model is built in two steps. A builder receives a [`ModelContext`] and
//! attaches the layers the model owns; it returns a [`ForwardFn`] that the
//! model runs on every invocation through a [`ForwardPass`].

pub mod context;
pub mod custom;
pub mod exec;
pub mod forward;

pub use context::ModelContext;
pub use custom::{CustomModel, ParameterInfo, DEFAULT_MODEL_NAME};
pub use exec::{ExecutionContext, Mode};
pub use forward::{AuxLoss, ForwardFn, ForwardPass, Tape};
