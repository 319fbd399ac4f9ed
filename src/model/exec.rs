//! Explicit execution context.
//!
//! Everything that would otherwise be ambient framework state (training vs.
//! inference behavior, the random seed) lives here and is passed to model
//! construction and to every invocation.

/// Whether layers behave as during training or as during inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Training,
    Inference,
}

/// Execution settings threaded through construction and invocation.
///
/// # Example
///
/// ```
/// use custom_models::model::{ExecutionContext, Mode};
///
/// let exec = ExecutionContext::inference(7);
/// assert!(!exec.is_training());
/// assert_eq!(exec.as_training().mode(), Mode::Training);
/// assert_eq!(exec.as_training().seed(), 7);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionContext {
    mode: Mode,
    seed: u64,
}

impl ExecutionContext {
    pub fn new(mode: Mode, seed: u64) -> Self {
        Self { mode, seed }
    }

    pub fn training(seed: u64) -> Self {
        Self::new(Mode::Training, seed)
    }

    pub fn inference(seed: u64) -> Self {
        Self::new(Mode::Inference, seed)
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn is_training(&self) -> bool {
        self.mode == Mode::Training
    }

    /// Same seed, training mode.
    pub fn as_training(&self) -> Self {
        Self::training(self.seed)
    }

    /// Same seed, inference mode.
    pub fn as_inference(&self) -> Self {
        Self::inference(self.seed)
    }
}

impl Default for ExecutionContext {
    /// Inference mode with seed 42.
    fn default() -> Self {
        Self::inference(42)
    }
}
