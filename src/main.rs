// External crates
use anyhow::{Context, Result};
use burn_autodiff::Autodiff;
use burn_ndarray::{NdArray, NdArrayDevice};
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

// Local modules
use quant_brain::constants;
use quant_brain::util::{file_utils, model_logger};
use quant_brain::{ForecasterConfig, PricePredictor, TrainingConfig};

type BurnBackend = Autodiff<NdArray<f32>>;

/// Train a price forecaster on a CSV of daily bars and print the forecast
#[derive(Parser, Debug)]
#[command(name = "quant-brain", version, about)]
struct Cli {
    /// CSV file with a close (or adjusted close) column
    #[arg(long)]
    csv: PathBuf,

    /// Symbol used to label output and reports
    #[arg(long, default_value = "AAPL")]
    symbol: String,

    /// JSON file with forecaster settings; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    sequence_length: Option<usize>,

    #[arg(long)]
    seed: Option<u64>,

    #[arg(long, default_value_t = constants::EPOCHS)]
    epochs: usize,

    #[arg(long, default_value_t = constants::BATCH_SIZE)]
    batch_size: usize,

    #[arg(long, default_value_t = constants::LEARNING_RATE)]
    learning_rate: f64,

    /// Number of future values to forecast
    #[arg(long, default_value_t = constants::FORECAST_STEPS)]
    steps: usize,

    /// Write a JSON training report into this directory
    #[arg(long)]
    report_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let mut forecaster = match &cli.config {
        Some(path) => ForecasterConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ForecasterConfig::default(),
    };
    if let Some(sequence_length) = cli.sequence_length {
        forecaster = forecaster.with_sequence_length(sequence_length);
    }
    if let Some(seed) = cli.seed {
        forecaster = forecaster.with_seed(seed);
    }
    let training = TrainingConfig::new(cli.epochs, cli.batch_size, cli.learning_rate);

    let series = file_utils::load_price_series(&cli.csv)
        .with_context(|| format!("Failed to load prices from {}", cli.csv.display()))?;
    println!("Using symbol: {} | observations: {}", cli.symbol, series.closes.len());

    let device = NdArrayDevice::default();
    let mut predictor = PricePredictor::<BurnBackend>::new(forecaster.clone(), device)
        .context("Invalid forecaster configuration")?;

    let started = Instant::now();
    let losses = predictor
        .train(&series.closes, &training)
        .context("Training failed")?;
    let elapsed = started.elapsed().as_secs_f64();

    let forecast = predictor
        .predict(&series.closes, cli.steps)
        .context("Forecast failed")?;

    match series.last_date {
        Some(date) => println!(
            "Predictions for the next {} days after {}:",
            cli.steps,
            date.format(constants::DATE_FORMAT)
        ),
        None => println!("Predictions for the next {} steps:", cli.steps),
    }
    for (i, value) in forecast.iter().enumerate() {
        println!("Day {}: ${:.2}", i + 1, value);
    }

    if let Some(root) = &cli.report_dir {
        let mut report = model_logger::TrainingReport::new(
            &cli.symbol,
            &forecaster,
            &training,
            series.closes.len(),
        );
        report.set_losses(losses);
        report.set_forecast(forecast);
        report.set_training_time(elapsed);
        if let Some(improvement) = report.loss_improvement() {
            report.add_note(&format!("Loss improved by {:.1}%", improvement * 100.0));
        }

        let dir = model_logger::create_experiment_dir(Some(root.as_path()))?;
        let path = report.save(&dir).context("Failed to write training report")?;
        println!("Report saved at: {}", path.display());
    }

    Ok(())
}
