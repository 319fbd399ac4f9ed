//! Tests for the training driver
//!
//! This file covers compile/fit/evaluate/predict on custom models:
//! - Loss reduction on a separable problem
//! - Validation split and history contents
//! - Reproducibility from the execution context seed
//! - Optimizer keys follow the tracked parameter paths

use custom_models::model::ExecutionContext;
use custom_models::models::{simple_mlp, MlpConfig};
use custom_models::optimizers::{optimizer_from_name, Adam, Optimizer, SGD};
use custom_models::tensor::Tensor;
use custom_models::training::{CompileOptions, FitOptions, Loss, Metric};
use custom_models::utils::{random_normal, to_categorical, SimpleRng};
use custom_models::ModelError;
use std::cell::RefCell;
use std::rc::Rc;

/// Two Gaussian blobs centred at -1 and +1 in every feature.
fn blobs(samples: usize, features: usize, seed: u64) -> (Tensor, Tensor) {
    let mut rng = SimpleRng::new(seed);
    let noise = random_normal(samples, features, &mut rng);
    let labels: Vec<usize> = (0..samples).map(|i| i % 2).collect();

    let mut data = noise.into_vec();
    for (i, row) in data.chunks_mut(features).enumerate() {
        let centre = if labels[i] == 0 { -1.0 } else { 1.0 };
        for v in row.iter_mut() {
            *v = centre + 0.5 * *v;
        }
    }
    let x = Tensor::new(data, samples, features).unwrap();
    let y = to_categorical(&labels, 2).unwrap();
    (x, y)
}

fn compiled_mlp(exec: &ExecutionContext, config: MlpConfig) -> custom_models::model::CustomModel<MlpConfig> {
    let mut model = simple_mlp(config, None, exec).unwrap();
    model.compile(
        CompileOptions::new(Loss::CategoricalCrossentropy, Box::new(Adam::new(0.01, 0.9, 0.999, 1e-7)))
            .with_metrics(vec![Metric::Accuracy]),
    );
    model
}

// ============================================================================
// fit
// ============================================================================

#[test]
fn test_fit_reduces_loss_on_separable_data() {
    let exec = ExecutionContext::training(42);
    let (x, y) = blobs(200, 4, 1);
    let mut model = compiled_mlp(&exec, MlpConfig::new(2));

    let options = FitOptions {
        epochs: 15,
        batch_size: 16,
        ..FitOptions::default()
    };
    let history = model.fit(&exec, &x, &y, options).unwrap();
    assert_eq!(history.len(), 15);

    let losses = history.losses();
    assert!(
        losses[losses.len() - 1] < losses[0],
        "loss did not decrease: {:?}",
        losses
    );

    let last = history.last().unwrap();
    assert!(last.metrics["accuracy"] > 0.9, "accuracy {}", last.metrics["accuracy"]);
    assert!(last.val_loss.is_none());

    let evaluation = model.evaluate(&exec, &x, &y, 64).unwrap();
    assert!(evaluation.metrics["accuracy"] > 0.9);
}

#[test]
fn test_fit_with_dropout_and_batch_norm_trains() {
    let exec = ExecutionContext::training(3);
    let (x, y) = blobs(160, 6, 2);
    let config = MlpConfig::new(2).with_dropout(true).with_batch_norm(true);
    let mut model = compiled_mlp(&exec, config);

    let history = model
        .fit(&exec, &x, &y, FitOptions { epochs: 10, batch_size: 16, ..FitOptions::default() })
        .unwrap();
    let losses = history.losses();
    assert!(losses[9] < losses[0], "loss did not decrease: {:?}", losses);

    let paths: Vec<String> = model.tracked_parameters().into_iter().map(|p| p.path).collect();
    assert!(paths.contains(&"bn/gamma".to_string()));
}

#[test]
fn test_validation_split_reported() {
    let exec = ExecutionContext::training(0);
    let (x, y) = blobs(100, 3, 5);
    let mut model = compiled_mlp(&exec, MlpConfig::new(2));

    let options = FitOptions {
        epochs: 2,
        batch_size: 10,
        shuffle: false,
        validation_split: 0.2,
    };
    let history = model.fit(&exec, &x, &y, options).unwrap();
    for logs in &history.epochs {
        assert!(logs.val_loss.is_some());
        assert!(logs.val_metrics.contains_key("accuracy"));
    }

    let json = serde_json::to_string(&history).unwrap();
    assert!(json.contains("\"val_loss\""));
    assert!(json.contains("\"accuracy\""));
}

#[test]
fn test_fit_is_reproducible() {
    let exec = ExecutionContext::training(11);
    let (x, y) = blobs(64, 5, 8);
    let options = FitOptions {
        epochs: 3,
        batch_size: 8,
        ..FitOptions::default()
    };

    let config = MlpConfig::new(2).with_dropout(true);
    let first = compiled_mlp(&exec, config).fit(&exec, &x, &y, options).unwrap();
    let second = compiled_mlp(&exec, config).fit(&exec, &x, &y, options).unwrap();
    assert_eq!(first.losses(), second.losses());
}

#[test]
fn test_fit_rejects_mismatched_rows() {
    let exec = ExecutionContext::training(0);
    let mut model = compiled_mlp(&exec, MlpConfig::new(2));
    let x = Tensor::zeros(10, 3);
    let y = Tensor::zeros(9, 2);
    assert!(matches!(
        model.fit(&exec, &x, &y, FitOptions::default()),
        Err(ModelError::ShapeMismatch { .. })
    ));
}

#[test]
fn test_not_compiled() {
    let exec = ExecutionContext::training(0);
    let mut model = simple_mlp(MlpConfig::new(2), Some("plain"), &exec).unwrap();
    let (x, y) = blobs(8, 3, 0);
    let err = model.fit(&exec, &x, &y, FitOptions::default()).unwrap_err();
    assert!(matches!(err, ModelError::NotCompiled(name) if name == "plain"));
}

// ============================================================================
// predict / evaluate
// ============================================================================

#[test]
fn test_predict_matches_single_call() {
    let exec = ExecutionContext::inference(4);
    let (x, _) = blobs(23, 4, 3);
    let mut model = simple_mlp(MlpConfig::new(3).with_batch_norm(true), None, &exec).unwrap();

    let batched = model.predict(&exec, &x, 7).unwrap();
    let whole = model.call(&exec, &x, None).unwrap();
    assert_eq!(batched.shape(), (23, 3));
    for (a, b) in batched.as_slice().iter().zip(whole.as_slice()) {
        assert!((a - b).abs() < 1e-6);
    }
}

#[test]
fn test_predict_uses_inference_mode() {
    let exec = ExecutionContext::training(4);
    let (x, _) = blobs(10, 4, 3);
    let mut model = simple_mlp(MlpConfig::new(3).with_dropout(true), None, &exec).unwrap();

    let a = model.predict(&exec, &x, 4).unwrap();
    let b = model.predict(&exec, &x, 4).unwrap();
    assert_eq!(a.as_slice(), b.as_slice());
}

#[test]
fn test_sparse_targets() {
    let exec = ExecutionContext::training(21);
    let (x, y) = blobs(120, 4, 6);
    let sparse: Vec<f32> = y.argmax_rows().into_iter().map(|c| c as f32).collect();
    let sparse = Tensor::new(sparse, 120, 1).unwrap();

    let mut model = simple_mlp(MlpConfig::new(2), None, &exec).unwrap();
    model.compile(
        CompileOptions::new(
            Loss::SparseCategoricalCrossentropy,
            optimizer_from_name("adam", 0.01).unwrap(),
        )
        .with_metrics(vec![Metric::Accuracy]),
    );
    let history = model
        .fit(&exec, &x, &sparse, FitOptions { epochs: 10, batch_size: 12, ..FitOptions::default() })
        .unwrap();
    let losses = history.losses();
    assert!(losses[9] < losses[0]);
}

// ============================================================================
// Optimizer keys
// ============================================================================

struct RecordingOptimizer {
    keys: Rc<RefCell<Vec<String>>>,
    inner: SGD,
}

impl Optimizer for RecordingOptimizer {
    fn update(&mut self, key: &str, parameters: &mut [f32], gradients: &[f32]) {
        self.keys.borrow_mut().push(key.to_string());
        self.inner.update(key, parameters, gradients);
    }

    fn reset(&mut self) {}

    fn learning_rate(&self) -> f32 {
        self.inner.learning_rate()
    }

    fn set_learning_rate(&mut self, lr: f32) {
        self.inner.set_learning_rate(lr);
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

#[test]
fn test_optimizer_sees_tracked_parameter_paths() {
    let exec = ExecutionContext::training(0);
    let keys = Rc::new(RefCell::new(Vec::new()));
    let mut model = simple_mlp(MlpConfig::new(2).with_batch_norm(true), None, &exec).unwrap();
    model.compile(CompileOptions::new(
        Loss::CategoricalCrossentropy,
        Box::new(RecordingOptimizer {
            keys: keys.clone(),
            inner: SGD::new(0.01),
        }),
    ));

    let (x, y) = blobs(4, 3, 0);
    model.train_on_batch(&exec, &x, &y).unwrap();

    let expected: Vec<String> = model.tracked_parameters().into_iter().map(|p| p.path).collect();
    assert_eq!(*keys.borrow(), expected);
}
