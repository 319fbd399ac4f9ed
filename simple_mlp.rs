use clap::Parser;
use custom_models::config::{load_config, TrainingConfig};
use custom_models::model::ExecutionContext;
use custom_models::models::{simple_mlp, MlpConfig};
use custom_models::utils::{random_labels, random_normal, to_categorical, SimpleRng};
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Train the two-layer custom MLP on random data.
#[derive(Parser, Debug)]
#[command(name = "simple_mlp", version, about)]
struct Args {
    /// JSON training configuration; built-in defaults when absent
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value_t = 10)]
    num_classes: usize,

    #[arg(long, default_value_t = 1000)]
    samples: usize,

    #[arg(long, default_value_t = 100)]
    features: usize,

    /// Apply dropout after the first dense layer
    #[arg(long)]
    use_dp: bool,

    /// Apply batch normalization after the first dense layer
    #[arg(long)]
    use_bn: bool,

    /// Overrides the configured epoch count
    #[arg(long)]
    epochs: Option<usize>,

    /// Overrides the configured seed
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> custom_models::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("simple_mlp=info,custom_models=info")),
        )
        .init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => TrainingConfig::default(),
    };
    if let Some(epochs) = args.epochs {
        config.epochs = epochs;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    custom_models::config::validate_config(&config)?;

    let exec = ExecutionContext::training(config.seed);
    let mut rng = SimpleRng::new(config.seed.wrapping_add(1));
    let x = random_normal(args.samples, args.features, &mut rng);
    let labels = random_labels(args.samples, args.num_classes, &mut rng);
    let y = to_categorical(&labels, args.num_classes)?;

    let mlp_config = MlpConfig::new(args.num_classes)
        .with_dropout(args.use_dp)
        .with_batch_norm(args.use_bn);
    let mut model = simple_mlp(mlp_config, None, &exec)?;
    model.compile(config.compile_options()?);

    info!(
        samples = args.samples,
        features = args.features,
        classes = args.num_classes,
        optimizer = %config.optimizer,
        "training"
    );
    let train_start = Instant::now();
    let history = model.fit(&exec, &x, &y, config.fit_options())?;
    info!(seconds = train_start.elapsed().as_secs_f64(), "training finished");

    println!("{}", model.summary());

    let predictions = model.predict(&exec, &x, config.batch_size)?;
    let max_deviation = predictions
        .row_sums()
        .into_iter()
        .map(|s| (s - 1.0).abs())
        .fold(0.0f32, f32::max);
    println!(
        "Predictions: {}x{} (max |row sum - 1| = {:.2e})",
        predictions.rows(),
        predictions.cols(),
        max_deviation
    );

    let evaluation = model.evaluate(&exec, &x, &y, config.batch_size)?;
    println!("Evaluation: {}", serde_json::to_string(&evaluation)?);
    println!("History:\n{}", serde_json::to_string_pretty(&history)?);
    Ok(())
}
