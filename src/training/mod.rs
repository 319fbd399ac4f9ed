//! Training driver for custom models.
//!
//! A model is compiled with a loss, an optimizer and metrics, then trained
//! with [`CustomModel::train_on_batch`] or [`CustomModel::fit`]. Each training
//! step runs the forward procedure in training mode with the tape enabled,
//! back-propagates the loss and the differentiable auxiliary losses, and hands
//! the gradients of the tracked layers to the optimizer.

pub mod history;
pub mod losses;
pub mod metrics;

pub use history::{EpochLogs, History};
pub use losses::{Loss, LOSS_NAMES};
pub use metrics::{Metric, METRIC_NAMES};

use crate::error::{ModelError, Result};
use crate::model::{CustomModel, ExecutionContext};
use crate::optimizers::Optimizer;
use crate::tensor::Tensor;
use crate::utils::rng::SimpleRng;
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info};

/// Settings passed to [`CustomModel::compile`].
pub struct CompileOptions {
    pub loss: Loss,
    pub optimizer: Box<dyn Optimizer>,
    pub metrics: Vec<Metric>,
}

impl CompileOptions {
    pub fn new(loss: Loss, optimizer: Box<dyn Optimizer>) -> Self {
        Self {
            loss,
            optimizer,
            metrics: Vec::new(),
        }
    }

    pub fn with_metrics(mut self, metrics: Vec<Metric>) -> Self {
        self.metrics = metrics;
        self
    }
}

/// Training state held by a compiled model.
pub(crate) struct Compiled {
    loss: Loss,
    optimizer: Box<dyn Optimizer>,
    metrics: Vec<Metric>,
}

/// Settings for [`CustomModel::fit`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitOptions {
    pub epochs: usize,
    pub batch_size: usize,
    pub shuffle: bool,
    /// Fraction of the rows, taken from the end, held out for validation.
    pub validation_split: f32,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            epochs: 1,
            batch_size: 32,
            shuffle: true,
            validation_split: 0.0,
        }
    }
}

impl FitOptions {
    fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(ModelError::InvalidArgument("epochs must be greater than 0".to_string()));
        }
        if self.batch_size == 0 {
            return Err(ModelError::InvalidArgument(
                "batch_size must be greater than 0".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.validation_split) {
            return Err(ModelError::InvalidArgument(format!(
                "validation_split must be in [0, 1), got {}",
                self.validation_split
            )));
        }
        Ok(())
    }
}

/// Result of [`CustomModel::evaluate`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub loss: f32,
    pub metrics: BTreeMap<String, f32>,
}

/// Running sums weighted by batch size.
#[derive(Default)]
struct Averages {
    rows: usize,
    loss: f32,
    metrics: BTreeMap<String, f32>,
}

impl Averages {
    fn add(&mut self, rows: usize, loss: f32, metrics: &[(Metric, f32)]) {
        self.rows += rows;
        self.loss += loss * rows as f32;
        for (metric, value) in metrics {
            *self.metrics.entry(metric.name().to_string()).or_insert(0.0) += value * rows as f32;
        }
    }

    fn finish(self) -> Evaluation {
        let n = self.rows.max(1) as f32;
        Evaluation {
            loss: self.loss / n,
            metrics: self.metrics.into_iter().map(|(k, v)| (k, v / n)).collect(),
        }
    }
}

fn check_rows(x: &Tensor, y: &Tensor) -> Result<()> {
    if x.rows() == 0 {
        return Err(ModelError::EmptyBatch);
    }
    if x.rows() != y.rows() {
        return Err(ModelError::shape("target rows", x.rows(), y.rows()));
    }
    Ok(())
}

fn compute_metrics(metrics: &[Metric], outputs: &Tensor, y: &Tensor) -> Result<Vec<(Metric, f32)>> {
    metrics
        .iter()
        .map(|&m| Ok((m, m.compute(outputs, y)?)))
        .collect()
}

impl<C> CustomModel<C> {
    /// Attach a loss, an optimizer and metrics. Compiling again replaces them.
    pub fn compile(&mut self, options: CompileOptions) {
        debug!(
            model = %self.name(),
            loss = options.loss.name(),
            optimizer = options.optimizer.name(),
            "compiled model"
        );
        self.compiled = Some(Compiled {
            loss: options.loss,
            optimizer: options.optimizer,
            metrics: options.metrics,
        });
    }

    pub fn is_compiled(&self) -> bool {
        self.compiled.is_some()
    }

    fn take_compiled(&mut self) -> Result<Compiled> {
        self.compiled
            .take()
            .ok_or_else(|| ModelError::NotCompiled(self.name().to_string()))
    }

    /// One gradient step on a single batch. Returns the batch loss, auxiliary
    /// losses included.
    pub fn train_on_batch(&mut self, exec: &ExecutionContext, x: &Tensor, y: &Tensor) -> Result<f32> {
        let mut compiled = self.take_compiled()?;
        let result = self.train_step(&mut compiled, exec, x, y);
        self.compiled = Some(compiled);
        result.map(|(loss, _)| loss)
    }

    fn train_step(
        &mut self,
        compiled: &mut Compiled,
        exec: &ExecutionContext,
        x: &Tensor,
        y: &Tensor,
    ) -> Result<(f32, Tensor)> {
        check_rows(x, y)?;
        let exec = exec.as_training();

        self.context_mut().zero_grad();
        let (outputs, tape) = self.run(&exec, x, None, true)?;

        let aux: f32 = self.losses().iter().map(|l| l.value).sum();
        let loss = compiled.loss.compute(&outputs, y)? + aux;
        let grad = compiled.loss.gradient(&outputs, y)?;

        tape.backward(self.context(), grad)?;
        self.context_mut().apply_gradients(compiled.optimizer.as_mut());
        Ok((loss, outputs))
    }

    /// Train for `options.epochs` passes over `x`/`y`.
    ///
    /// Rows are shuffled each epoch with an RNG seeded from `exec`. When
    /// `validation_split > 0` the last rows are held out and evaluated after
    /// every epoch. Metrics are computed on the outputs of the training steps.
    pub fn fit(
        &mut self,
        exec: &ExecutionContext,
        x: &Tensor,
        y: &Tensor,
        options: FitOptions,
    ) -> Result<History> {
        options.validate()?;
        check_rows(x, y)?;
        let mut compiled = self.take_compiled()?;
        let result = self.fit_compiled(&mut compiled, exec, x, y, options);
        self.compiled = Some(compiled);
        result
    }

    fn fit_compiled(
        &mut self,
        compiled: &mut Compiled,
        exec: &ExecutionContext,
        x: &Tensor,
        y: &Tensor,
        options: FitOptions,
    ) -> Result<History> {
        let total = x.rows();
        let split_at = (total as f64 * (1.0 - options.validation_split as f64)) as usize;
        if split_at == 0 {
            return Err(ModelError::InvalidArgument(format!(
                "validation_split {} leaves no training rows out of {}",
                options.validation_split, total
            )));
        }
        let (train_x, train_y) = (x.slice_rows(0, split_at)?, y.slice_rows(0, split_at)?);
        let validation = if split_at < total {
            Some((x.slice_rows(split_at, total)?, y.slice_rows(split_at, total)?))
        } else {
            None
        };

        let mut rng = SimpleRng::new(exec.seed());
        let mut indices: Vec<usize> = (0..split_at).collect();
        let mut history = History::default();

        for epoch in 0..options.epochs {
            let start_time = Instant::now();
            if options.shuffle {
                rng.shuffle_usize(&mut indices);
            }

            let mut averages = Averages::default();
            for batch in indices.chunks(options.batch_size) {
                let batch_x = train_x.select_rows(batch)?;
                let batch_y = train_y.select_rows(batch)?;
                let (loss, outputs) = self.train_step(compiled, exec, &batch_x, &batch_y)?;
                let metrics = compute_metrics(&compiled.metrics, &outputs, &batch_y)?;
                averages.add(batch.len(), loss, &metrics);
            }
            let train = averages.finish();

            let val = match &validation {
                Some((vx, vy)) => Some(self.evaluate_compiled(compiled, exec, vx, vy, options.batch_size)?),
                None => None,
            };

            info!(
                model = %self.name(),
                epoch = epoch + 1,
                epochs = options.epochs,
                loss = train.loss,
                val_loss = val.as_ref().map(|v| v.loss),
                elapsed_ms = start_time.elapsed().as_millis() as u64,
                "epoch finished"
            );

            history.epochs.push(EpochLogs {
                epoch,
                loss: train.loss,
                metrics: train.metrics,
                val_loss: val.as_ref().map(|v| v.loss),
                val_metrics: val.map(|v| v.metrics).unwrap_or_default(),
            });
        }
        Ok(history)
    }

    /// Loss and metrics over `x`/`y` in inference mode.
    pub fn evaluate(
        &mut self,
        exec: &ExecutionContext,
        x: &Tensor,
        y: &Tensor,
        batch_size: usize,
    ) -> Result<Evaluation> {
        if batch_size == 0 {
            return Err(ModelError::InvalidArgument(
                "batch_size must be greater than 0".to_string(),
            ));
        }
        check_rows(x, y)?;
        let compiled = self.take_compiled()?;
        let result = self.evaluate_compiled(&compiled, exec, x, y, batch_size);
        self.compiled = Some(compiled);
        result
    }

    fn evaluate_compiled(
        &mut self,
        compiled: &Compiled,
        exec: &ExecutionContext,
        x: &Tensor,
        y: &Tensor,
        batch_size: usize,
    ) -> Result<Evaluation> {
        let exec = exec.as_inference();
        let mut averages = Averages::default();
        let mut start = 0;
        while start < x.rows() {
            let end = (start + batch_size).min(x.rows());
            let batch_x = x.slice_rows(start, end)?;
            let batch_y = y.slice_rows(start, end)?;
            let outputs = self.call(&exec, &batch_x, None)?;
            let aux: f32 = self.losses().iter().map(|l| l.value).sum();
            let loss = compiled.loss.compute(&outputs, &batch_y)? + aux;
            let metrics = compute_metrics(&compiled.metrics, &outputs, &batch_y)?;
            averages.add(end - start, loss, &metrics);
            start = end;
        }
        Ok(averages.finish())
    }
}
