//! Two dense layers with optional dropout and batch normalization in between.

use crate::error::{ModelError, Result};
use crate::layers::{BatchNormLayer, DenseLayer, DropoutLayer};
use crate::model::{CustomModel, ExecutionContext, ForwardFn};
use crate::utils::Activation;

/// Build-time options of [`simple_mlp`].
///
/// Stored in the model's context; the forward procedure reads `use_dp` and
/// `use_bn` from there on every invocation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MlpConfig {
    pub num_classes: usize,
    pub hidden_units: usize,
    pub use_dp: bool,
    pub use_bn: bool,
    pub dropout_rate: f32,
}

impl MlpConfig {
    pub fn new(num_classes: usize) -> Self {
        Self {
            num_classes,
            hidden_units: 32,
            use_dp: false,
            use_bn: false,
            dropout_rate: 0.5,
        }
    }

    pub fn with_dropout(mut self, use_dp: bool) -> Self {
        self.use_dp = use_dp;
        self
    }

    pub fn with_batch_norm(mut self, use_bn: bool) -> Self {
        self.use_bn = use_bn;
        self
    }
}

/// `dense1 (relu) -> [dropout] -> [batch norm] -> dense2 (softmax)`.
///
/// `dp` and `bn` are attached only when their flag is set, so the tracked
/// layers are exactly the ones the forward procedure applies.
///
/// # Example
///
/// ```
/// use custom_models::model::ExecutionContext;
/// use custom_models::models::{simple_mlp, MlpConfig};
/// use custom_models::tensor::Tensor;
///
/// let exec = ExecutionContext::inference(42);
/// let mut model = simple_mlp(MlpConfig::new(10).with_dropout(true), None, &exec).unwrap();
///
/// let y = model.call(&exec, &Tensor::zeros(4, 100), None).unwrap();
/// assert_eq!(y.shape(), (4, 10));
/// assert_eq!(model.layer_names(), vec!["dense1", "dense2", "dp"]);
/// ```
pub fn simple_mlp(
    config: MlpConfig,
    name: Option<&str>,
    exec: &ExecutionContext,
) -> Result<CustomModel<MlpConfig>> {
    if config.num_classes == 0 || config.hidden_units == 0 {
        return Err(ModelError::InvalidArgument(
            "num_classes and hidden_units must be greater than 0".to_string(),
        ));
    }
    if !(0.0..1.0).contains(&config.dropout_rate) {
        return Err(ModelError::InvalidArgument(format!(
            "dropout_rate must be in [0, 1), got {}",
            config.dropout_rate
        )));
    }

    CustomModel::new(name, config, exec, |ctx| {
        let cfg = *ctx.config();
        ctx.attach(
            "dense1",
            DenseLayer::new(cfg.hidden_units).with_activation(Activation::Relu),
        )?;
        ctx.attach(
            "dense2",
            DenseLayer::new(cfg.num_classes).with_activation(Activation::Softmax),
        )?;
        if cfg.use_dp {
            ctx.attach("dp", DropoutLayer::new(cfg.dropout_rate))?;
        }
        if cfg.use_bn {
            ctx.attach("bn", BatchNormLayer::default())?;
        }

        Ok(ForwardFn::<MlpConfig>::new(|pass, inputs, _mask| {
            let mut x = pass.call("dense1", inputs)?;
            if pass.config().use_dp {
                x = pass.call("dp", x)?;
            }
            if pass.config().use_bn {
                x = pass.call("bn", x)?;
            }
            pass.call("dense2", x)
        }))
    })
}
