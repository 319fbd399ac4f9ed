//! Error type shared by the model, training and configuration layers.

use thiserror::Error;

/// Errors raised while building, invoking or training a custom model.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid layer name '{0}': names must be non-empty and must not contain '/'")]
    InvalidLayerName(String),
    #[error("A layer named '{0}' is already attached")]
    DuplicateLayer(String),
    #[error("No layer named '{0}' was attached during setup")]
    UnknownLayer(String),
    #[error("Layer '{0}' has not been built yet")]
    LayerNotBuilt(String),
    #[error("Shape mismatch in {context}: expected {expected}, actual {actual}")]
    ShapeMismatch {
        context: String,
        expected: String,
        actual: String,
    },
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Model '{0}' must be compiled before training or evaluation")]
    NotCompiled(String),
    #[error("Forward pass is not a chain: {0}")]
    NonSequentialGraph(String),
    #[error("Empty batch")]
    EmptyBatch,
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ModelError {
    pub(crate) fn shape(
        context: impl Into<String>,
        expected: impl std::fmt::Display,
        actual: impl std::fmt::Display,
    ) -> Self {
        ModelError::ShapeMismatch {
            context: context.into(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ModelError>;
