//! User-defined models: a builder attaches layers, a forward procedure uses them.

use crate::error::{ModelError, Result};
use crate::model::context::ModelContext;
use crate::model::exec::ExecutionContext;
use crate::model::forward::{AuxLoss, ForwardFn, ForwardPass, Tape, INPUT_ORIGIN};
use crate::tensor::Tensor;
use crate::training::Compiled;
use serde::Serialize;
use std::fmt::Write;
use tracing::debug;

/// Name given to a model constructed without one.
pub const DEFAULT_MODEL_NAME: &str = "custom_model";

/// One tracked parameter buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParameterInfo {
    pub layer: String,
    /// `"{layer}/{parameter}"`, the key optimizers see.
    pub path: String,
    pub len: usize,
}

/// A model defined by a builder and a forward procedure.
///
/// The builder runs once at construction. It receives the model's
/// [`ModelContext`], attaches every layer the model owns and returns the
/// forward procedure. Only attached layers are tracked: they appear in
/// [`CustomModel::tracked_parameters`] and are updated by training.
///
/// # Example
///
/// ```
/// use custom_models::layers::DenseLayer;
/// use custom_models::model::{CustomModel, ExecutionContext, ForwardFn};
/// use custom_models::tensor::Tensor;
/// use custom_models::utils::Activation;
///
/// let exec = ExecutionContext::inference(0);
/// let mut model = CustomModel::new(None, (), &exec, |ctx| {
///     ctx.attach("out", DenseLayer::new(2).with_activation(Activation::Softmax))?;
///     Ok(ForwardFn::<()>::new(|pass, x, _mask| pass.call("out", x)))
/// })
/// .unwrap();
///
/// let y = model.call(&exec, &Tensor::zeros(3, 4), None).unwrap();
/// assert_eq!(y.shape(), (3, 2));
/// assert_eq!(model.name(), "custom_model");
/// assert_eq!(model.count_params(), 4 * 2 + 2);
/// ```
pub struct CustomModel<C> {
    name: String,
    context: ModelContext<C>,
    forward: ForwardFn<C>,
    losses: Vec<AuxLoss>,
    pub(crate) compiled: Option<Compiled>,
}

impl<C> CustomModel<C> {
    /// Construct a model. A missing or empty `name` becomes
    /// [`DEFAULT_MODEL_NAME`].
    ///
    /// Errors raised by `builder` (an invalid or duplicate layer name, for
    /// instance) are returned unchanged and no model is produced.
    pub fn new<B>(name: Option<&str>, config: C, exec: &ExecutionContext, builder: B) -> Result<Self>
    where
        B: FnOnce(&mut ModelContext<C>) -> Result<ForwardFn<C>>,
    {
        let name = match name {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => DEFAULT_MODEL_NAME.to_string(),
        };
        let mut context = ModelContext::new(config, exec);
        let forward = builder(&mut context)?;
        debug!(model = %name, layers = context.len(), "constructed model");

        Ok(Self {
            name,
            context,
            forward,
            losses: Vec::new(),
            compiled: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke the forward procedure on `inputs`.
    ///
    /// `mask`, when given, must have one row per input row; it is handed to
    /// the forward procedure as-is.
    pub fn call(&mut self, exec: &ExecutionContext, inputs: &Tensor, mask: Option<&Tensor>) -> Result<Tensor> {
        let (outputs, _) = self.run(exec, inputs, mask, false)?;
        Ok(outputs)
    }

    /// Run the forward procedure, optionally recording a tape for backward.
    ///
    /// Clears the losses of the previous invocation first.
    pub(crate) fn run(
        &mut self,
        exec: &ExecutionContext,
        inputs: &Tensor,
        mask: Option<&Tensor>,
        record: bool,
    ) -> Result<(Tensor, Tape)> {
        if inputs.is_empty() {
            return Err(ModelError::EmptyBatch);
        }
        if let Some(mask) = mask {
            if mask.rows() != inputs.rows() {
                return Err(ModelError::shape("mask rows", inputs.rows(), mask.rows()));
            }
        }

        self.losses.clear();
        let mut pass = ForwardPass::new(&mut self.context, exec, record);
        let result = self
            .forward
            .invoke(&mut pass, inputs.clone().with_origin(INPUT_ORIGIN), mask);
        let (mut tape, losses) = pass.finish();
        self.losses = losses;
        let outputs = result?;
        tape.set_output(&outputs);
        Ok((outputs, tape))
    }

    /// Inference-mode forward pass over `inputs` in batches of `batch_size`.
    pub fn predict(&mut self, exec: &ExecutionContext, inputs: &Tensor, batch_size: usize) -> Result<Tensor> {
        if batch_size == 0 {
            return Err(ModelError::InvalidArgument(
                "batch_size must be greater than 0".to_string(),
            ));
        }
        let exec = exec.as_inference();
        let mut data = Vec::new();
        let mut cols = 0;
        let mut start = 0;
        while start < inputs.rows() {
            let end = (start + batch_size).min(inputs.rows());
            let batch = inputs.slice_rows(start, end)?;
            let out = self.call(&exec, &batch, None)?;
            cols = out.cols();
            data.extend_from_slice(out.as_slice());
            start = end;
        }
        Tensor::new(data, inputs.rows(), cols)
    }

    /// Names of the tracked layers, in attachment order.
    pub fn layer_names(&self) -> Vec<&str> {
        self.context.layer_names()
    }

    /// Every tracked parameter buffer, in attachment order.
    ///
    /// Layers that have not been built yet contribute nothing.
    pub fn tracked_parameters(&self) -> Vec<ParameterInfo> {
        self.context
            .iter()
            .flat_map(|(name, layer)| {
                layer.parameters().into_iter().map(move |(param, values)| ParameterInfo {
                    layer: name.to_string(),
                    path: format!("{}/{}", name, param),
                    len: values.len(),
                })
            })
            .collect()
    }

    pub fn count_params(&self) -> usize {
        self.context.iter().map(|(_, layer)| layer.parameter_count()).sum()
    }

    /// Losses registered by the most recent invocation, in registration order.
    pub fn losses(&self) -> &[AuxLoss] {
        &self.losses
    }

    pub fn context(&self) -> &ModelContext<C> {
        &self.context
    }

    pub(crate) fn context_mut(&mut self) -> &mut ModelContext<C> {
        &mut self.context
    }

    pub fn config(&self) -> &C {
        self.context.config()
    }

    /// Plain-text table of the tracked layers.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Model: \"{}\"", self.name);
        let _ = writeln!(out, "{:<20} {:<22} {:>10} {:>10}", "Layer", "Type", "Output", "Params");
        let _ = writeln!(out, "{}", "-".repeat(65));
        for (name, layer) in self.context.iter() {
            let output = match (layer.is_built(), layer.output_size()) {
                (true, Some(width)) => width.to_string(),
                _ => "?".to_string(),
            };
            let _ = writeln!(
                out,
                "{:<20} {:<22} {:>10} {:>10}",
                name,
                layer.kind(),
                output,
                layer.parameter_count()
            );
        }
        let _ = writeln!(out, "{}", "-".repeat(65));
        let _ = writeln!(out, "Total params: {}", self.count_params());
        out
    }
}
