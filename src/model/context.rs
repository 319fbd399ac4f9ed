//! Per-model registry of attached sub-layers.

use crate::error::{ModelError, Result};
use crate::layers::Layer;
use crate::model::exec::ExecutionContext;
use crate::optimizers::Optimizer;
use crate::utils::rng::SimpleRng;
use std::collections::HashMap;
use tracing::debug;

struct Attached {
    name: String,
    layer: Box<dyn Layer>,
}

/// Mutable record owned by one model: its attached layers and configuration.
///
/// Layers are registered during setup with [`ModelContext::attach`] and are
/// the only ones the model tracks: they show up in parameter enumeration and
/// receive optimizer updates. Attachment order is preserved.
///
/// The configuration value `C` is stored here so the forward procedure reads
/// it explicitly instead of capturing it.
pub struct ModelContext<C> {
    config: C,
    layers: Vec<Attached>,
    index: HashMap<String, usize>,
    rng: SimpleRng,
    warned_transient: bool,
}

impl<C> ModelContext<C> {
    pub(crate) fn new(config: C, exec: &ExecutionContext) -> Self {
        Self {
            config,
            layers: Vec::new(),
            index: HashMap::new(),
            rng: SimpleRng::new(exec.seed()),
            warned_transient: false,
        }
    }

    /// Register a layer under `name`.
    ///
    /// Fails if the name is empty, contains `/` (reserved for parameter
    /// paths) or is already taken; the context is unchanged on failure.
    pub fn attach<L: Layer + 'static>(&mut self, name: &str, layer: L) -> Result<()> {
        self.attach_boxed(name, Box::new(layer))
    }

    pub fn attach_boxed(&mut self, name: &str, layer: Box<dyn Layer>) -> Result<()> {
        if name.is_empty() || name.contains('/') {
            return Err(ModelError::InvalidLayerName(name.to_string()));
        }
        if self.index.contains_key(name) {
            return Err(ModelError::DuplicateLayer(name.to_string()));
        }

        debug!(layer = name, kind = layer.kind(), "attached layer");
        self.index.insert(name.to_string(), self.layers.len());
        self.layers.push(Attached {
            name: name.to_string(),
            layer,
        });
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn layer(&self, name: &str) -> Result<&dyn Layer> {
        let idx = self.position(name)?;
        Ok(&*self.layers[idx].layer)
    }

    /// Attached layer names in attachment order.
    pub fn layer_names(&self) -> Vec<&str> {
        self.layers.iter().map(|a| a.name.as_str()).collect()
    }

    /// Attached layers with their names, in attachment order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &(dyn Layer + 'static))> {
        self.layers.iter().map(|a| (a.name.as_str(), &*a.layer))
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn config(&self) -> &C {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut C {
        &mut self.config
    }

    /// RNG used to initialize layer parameters.
    pub fn rng_mut(&mut self) -> &mut SimpleRng {
        &mut self.rng
    }

    fn position(&self, name: &str) -> Result<usize> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| ModelError::UnknownLayer(name.to_string()))
    }

    /// Build (on first use) and switch mode of an attached layer before a forward call.
    pub(crate) fn prepare(
        &mut self,
        name: &str,
        input_size: usize,
        training: bool,
    ) -> Result<&dyn Layer> {
        let idx = self.position(name)?;
        let Self { layers, rng, .. } = self;
        let layer = &mut layers[idx].layer;
        prepare_layer(&mut **layer, name, input_size, training, rng)?;
        Ok(&**layer)
    }

    /// Build and switch mode of a layer that is not attached.
    ///
    /// Returns `true` the first time a transient layer with parameters is seen.
    pub(crate) fn prepare_transient(
        &mut self,
        layer: &mut dyn Layer,
        input_size: usize,
        training: bool,
    ) -> Result<bool> {
        prepare_layer(layer, "<transient>", input_size, training, &mut self.rng)?;
        let first = layer.parameter_count() > 0 && !self.warned_transient;
        if first {
            self.warned_transient = true;
        }
        Ok(first)
    }

    /// Hand every attached layer's gradients to `optimizer`.
    pub(crate) fn apply_gradients(&mut self, optimizer: &mut dyn Optimizer) {
        for attached in &mut self.layers {
            attached.layer.update_with_optimizer(&attached.name, optimizer);
        }
    }

    pub(crate) fn zero_grad(&mut self) {
        for attached in &mut self.layers {
            attached.layer.zero_grad();
        }
    }
}

fn prepare_layer(
    layer: &mut dyn Layer,
    name: &str,
    input_size: usize,
    training: bool,
    rng: &mut SimpleRng,
) -> Result<()> {
    match layer.input_size() {
        Some(expected) if expected != input_size => {
            return Err(ModelError::shape(
                format!("input of layer '{}'", name),
                expected,
                input_size,
            ));
        }
        Some(_) => {}
        None => {
            layer.build(input_size, rng)?;
            debug!(
                layer = name,
                kind = layer.kind(),
                input_size,
                params = layer.parameter_count(),
                "built layer"
            );
        }
    }
    layer.set_training(training);
    Ok(())
}
