//! One invocation of a model's forward procedure.
//!
//! The forward procedure receives a [`ForwardPass`] and applies layers through
//! it. When the invocation is a training step, every applied layer is recorded
//! on a [`Tape`] together with its input so the step can be replayed backwards.
//! Each tensor a layer returns carries the id of the step that produced it,
//! which is how the tape tells a chain from a branch.

use crate::error::{ModelError, Result};
use crate::layers::Layer;
use crate::model::context::ModelContext;
use crate::model::exec::ExecutionContext;
use crate::tensor::Tensor;
use serde::Serialize;
use std::collections::HashSet;
use tracing::warn;

/// Loss term registered by the forward procedure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuxLoss {
    pub name: String,
    pub value: f32,
}

type ForwardBody<C> =
    dyn for<'p, 'm, 'k> Fn(&'p mut ForwardPass<'m, C>, Tensor, Option<&'k Tensor>) -> Result<Tensor>;

/// The forward procedure returned by a model builder.
///
/// Wraps a closure `(pass, inputs, mask) -> outputs`. Name the configuration
/// type when constructing it so the closure arguments are inferred:
///
/// ```
/// use custom_models::model::ForwardFn;
///
/// struct Config {
///     use_dp: bool,
/// }
///
/// let forward = ForwardFn::<Config>::new(|pass, inputs, _mask| {
///     let x = pass.call("dense1", inputs)?;
///     if pass.config().use_dp {
///         return pass.call("dp", x);
///     }
///     Ok(x)
/// });
/// # drop(forward);
/// ```
pub struct ForwardFn<C> {
    body: Box<ForwardBody<C>>,
}

impl<C> ForwardFn<C> {
    pub fn new<F>(f: F) -> Self
    where
        F: for<'p, 'm, 'k> Fn(&'p mut ForwardPass<'m, C>, Tensor, Option<&'k Tensor>) -> Result<Tensor>
            + 'static,
    {
        Self { body: Box::new(f) }
    }

    pub(crate) fn invoke(
        &self,
        pass: &mut ForwardPass<'_, C>,
        inputs: Tensor,
        mask: Option<&Tensor>,
    ) -> Result<Tensor> {
        (self.body)(pass, inputs, mask)
    }
}

/// Id of the model input within a pass.
pub(crate) const INPUT_ORIGIN: u64 = 0;

enum TapeOp {
    Attached {
        name: String,
        input: Tensor,
        output: u64,
    },
    Transient {
        layer: Box<dyn Layer>,
        input: Tensor,
        output: u64,
    },
    ActivityL2 {
        factor: f32,
        activations: Tensor,
    },
}

impl TapeOp {
    fn consumed(&self) -> Option<u64> {
        match self {
            TapeOp::Attached { input, .. } | TapeOp::Transient { input, .. } => input.origin(),
            TapeOp::ActivityL2 { activations, .. } => activations.origin(),
        }
    }

    fn produced(&self) -> Option<u64> {
        match self {
            TapeOp::Attached { output, .. } | TapeOp::Transient { output, .. } => Some(*output),
            TapeOp::ActivityL2 { activations, .. } => activations.origin(),
        }
    }

    fn label(&self) -> String {
        match self {
            TapeOp::Attached { name, .. } => format!("layer '{}'", name),
            TapeOp::Transient { layer, .. } => format!("transient {} layer", layer.kind()),
            TapeOp::ActivityL2 { .. } => "activity regularizer".to_string(),
        }
    }
}

/// Operations recorded during one training-mode invocation.
#[derive(Default)]
pub struct Tape {
    ops: Vec<TapeOp>,
    output: Option<u64>,
}

impl Tape {
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub(crate) fn set_output(&mut self, output: &Tensor) {
        self.output = output.origin();
    }

    /// Check that the recorded operations form a chain from the model input
    /// to the returned tensor, each consuming exactly the tensor the previous
    /// one produced.
    fn validate_chain(&self) -> Result<()> {
        let mut expected = Some(INPUT_ORIGIN);
        let mut seen = HashSet::new();
        for op in &self.ops {
            if op.consumed() != expected {
                return Err(ModelError::NonSequentialGraph(format!(
                    "{} did not consume the output of the previous step",
                    op.label()
                )));
            }
            if let TapeOp::Attached { name, .. } = op {
                if !seen.insert(name.as_str()) {
                    return Err(ModelError::NonSequentialGraph(format!(
                        "layer '{}' was applied more than once",
                        name
                    )));
                }
            }
            expected = op.produced();
        }
        if self.output != expected {
            return Err(ModelError::NonSequentialGraph(
                "forward returned a tensor other than the output of the last recorded step".to_string(),
            ));
        }
        Ok(())
    }

    /// Propagate `grad_output` (gradient of the loss with respect to the model
    /// output) back through the recorded chain, accumulating parameter
    /// gradients in the layers.
    pub(crate) fn backward<C>(self, context: &ModelContext<C>, grad_output: Tensor) -> Result<()> {
        self.validate_chain()?;

        let mut grad = grad_output;
        for op in self.ops.into_iter().rev() {
            grad = match op {
                TapeOp::Attached { name, input, .. } => {
                    let layer = context.layer(&name)?;
                    layer_backward(layer, &input, &grad)
                }
                TapeOp::Transient { layer, input, .. } => layer_backward(layer.as_ref(), &input, &grad),
                TapeOp::ActivityL2 {
                    factor,
                    activations,
                } => {
                    let scale = 2.0 * factor / activations.rows() as f32;
                    for (g, &a) in grad.as_mut_slice().iter_mut().zip(activations.as_slice()) {
                        *g += scale * a;
                    }
                    grad
                }
            };
        }
        Ok(())
    }
}

fn layer_backward(layer: &dyn Layer, input: &Tensor, grad_output: &Tensor) -> Tensor {
    let mut grad_input = Tensor::zeros(input.rows(), input.cols());
    layer.backward(
        input.as_slice(),
        grad_output.as_slice(),
        grad_input.as_mut_slice(),
        input.rows(),
    );
    grad_input
}

fn run_layer(layer: &dyn Layer, input: &Tensor, label: &str) -> Result<Tensor> {
    if input.rows() == 0 {
        return Err(ModelError::EmptyBatch);
    }
    let output_size = layer
        .output_size()
        .ok_or_else(|| ModelError::LayerNotBuilt(label.to_string()))?;
    let mut output = Tensor::zeros(input.rows(), output_size);
    layer.forward(input.as_slice(), output.as_mut_slice(), input.rows());
    Ok(output)
}

/// Handle given to the forward procedure for one invocation.
///
/// Gives access to the attached layers, the model configuration and the
/// execution context, and collects auxiliary losses.
pub struct ForwardPass<'m, C> {
    context: &'m mut ModelContext<C>,
    exec: &'m ExecutionContext,
    record: bool,
    tape: Tape,
    losses: Vec<AuxLoss>,
    next_origin: u64,
}

impl<'m, C> ForwardPass<'m, C> {
    pub(crate) fn new(
        context: &'m mut ModelContext<C>,
        exec: &'m ExecutionContext,
        record: bool,
    ) -> Self {
        Self {
            context,
            exec,
            record,
            tape: Tape::default(),
            losses: Vec::new(),
            next_origin: INPUT_ORIGIN + 1,
        }
    }

    fn tag(&mut self, output: Tensor) -> (Tensor, u64) {
        let origin = self.next_origin;
        self.next_origin += 1;
        (output.with_origin(origin), origin)
    }

    /// The model's configuration value.
    pub fn config(&self) -> &C {
        self.context.config()
    }

    pub fn exec(&self) -> &ExecutionContext {
        self.exec
    }

    pub fn is_training(&self) -> bool {
        self.exec.is_training()
    }

    /// Apply the layer attached as `name`.
    ///
    /// The layer is built from `input.cols()` the first time it is applied.
    pub fn call(&mut self, name: &str, input: Tensor) -> Result<Tensor> {
        let training = self.exec.is_training();
        let layer = self.context.prepare(name, input.cols(), training)?;
        let output = run_layer(layer, &input, name)?;
        let (output, origin) = self.tag(output);
        if self.record {
            self.tape.ops.push(TapeOp::Attached {
                name: name.to_string(),
                input,
                output: origin,
            });
        }
        Ok(output)
    }

    /// Apply a layer that was never attached to the model.
    ///
    /// The layer is built and run like an attached one and gradients flow
    /// through it, but the model does not track it: its parameters are not
    /// enumerated, never updated, and it is dropped when the invocation ends.
    pub fn call_transient<L: Layer + 'static>(&mut self, layer: L, input: Tensor) -> Result<Tensor> {
        let mut layer: Box<dyn Layer> = Box::new(layer);
        let training = self.exec.is_training();
        let first_warning = self
            .context
            .prepare_transient(layer.as_mut(), input.cols(), training)?;
        if first_warning {
            warn!(
                kind = layer.kind(),
                params = layer.parameter_count(),
                "layer applied in the forward pass without being attached; its parameters are not tracked or trained"
            );
        }

        let output = run_layer(layer.as_ref(), &input, layer.kind())?;
        let (output, origin) = self.tag(output);
        if self.record {
            self.tape.ops.push(TapeOp::Transient {
                layer,
                input,
                output: origin,
            });
        }
        Ok(output)
    }

    /// Register a value-only loss term.
    ///
    /// It is added to the reported loss but contributes no gradient.
    pub fn add_loss(&mut self, name: impl Into<String>, value: f32) {
        self.losses.push(AuxLoss {
            name: name.into(),
            value,
        });
    }

    /// Register `factor * Σx² / rows` as a loss and return `x` unchanged.
    ///
    /// Unlike [`ForwardPass::add_loss`], this term is differentiated during
    /// training.
    pub fn activity_l2(&mut self, name: impl Into<String>, x: Tensor, factor: f32) -> Result<Tensor> {
        if x.rows() == 0 {
            return Err(ModelError::EmptyBatch);
        }
        let sum_sq: f32 = x.as_slice().iter().map(|v| v * v).sum();
        self.add_loss(name, factor * sum_sq / x.rows() as f32);
        if self.record {
            self.tape.ops.push(TapeOp::ActivityL2 {
                factor,
                activations: x.clone(),
            });
        }
        Ok(x)
    }

    /// Losses registered so far in this invocation, in registration order.
    pub fn losses(&self) -> &[AuxLoss] {
        &self.losses
    }

    pub(crate) fn finish(self) -> (Tape, Vec<AuxLoss>) {
        (self.tape, self.losses)
    }
}
