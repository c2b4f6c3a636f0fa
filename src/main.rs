use anyhow::Result;
use clap::{Parser, Subcommand};
use nox_forecast::{config, pipeline, telemetry};
use config::Config;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use telemetry::init_tracing;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "nox-forecast")]
#[command(about = "NOx emission forecasting, alerting and what-if analysis", long_about = None)]
struct Cli {
    /// Configuration file (defaults to config/default.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Join the monthly report with daily measurements
    Merge,

    /// Descriptive statistics of the daily export
    Describe,

    /// Train the daily NOx sequence model
    TrainSequence,

    /// Forecast daily NOx past the training data
    Forecast {
        /// Days to forecast (config default when omitted)
        #[arg(long)]
        horizon: Option<usize>,
    },

    /// Grid-search and train the monthly NOx regressor
    TrainRegressor,

    /// Flag rows whose predicted NOx exceeds the regulation limit
    Alert,

    /// Feature importance and a per-sample explanation
    Explain {
        /// Row of the merged dataset to explain
        #[arg(long)]
        sample: Option<usize>,
    },

    /// Vary one input of a random sample and record the predictions
    Simulate {
        /// Feature to vary (e.g. flow, oxygen)
        #[arg(long)]
        feature: Option<String>,
    },
}

fn run(cli: Cli, cfg: Config) -> Result<()> {
    let mut rng = StdRng::seed_from_u64(cfg.seed);

    match cli.command {
        Commands::Merge => {
            let rows = pipeline::merge(&cfg)?;
            info!(rows, "merge complete");
        }
        Commands::Describe => {
            let report = pipeline::describe(&cfg)?;
            info!(
                count = report.nox.count,
                mean = report.nox.mean,
                std = report.nox.std,
                outliers = report.outliers.len(),
                "describe complete"
            );
        }
        Commands::TrainSequence => {
            let summary = pipeline::train_sequence(&cfg, &mut rng)?;
            info!(
                days = summary.days,
                train_pairs = summary.train_pairs,
                test_pairs = summary.test_pairs,
                "sequence training complete"
            );
        }
        Commands::Forecast { horizon } => {
            let points = pipeline::forecast(&cfg, horizon)?;
            for p in &points {
                info!(date = %p.date, predicted_nox = p.predicted_nox, "forecast");
            }
        }
        Commands::TrainRegressor => {
            let summary = pipeline::train_regressor(&cfg, &mut rng)?;
            info!(
                candidates = summary.cv_results.len(),
                rmse = summary.test_metrics.rmse,
                r2 = summary.test_metrics.r2,
                "regressor training complete"
            );
        }
        Commands::Alert => {
            let alerts = pipeline::alert(&cfg)?;
            info!(alerts = alerts.len(), "alert check complete");
        }
        Commands::Explain { sample } => {
            let report = pipeline::explain(&cfg, sample, &mut rng)?;
            info!(
                sample = report.local.sample_index,
                prediction = report.local.prediction,
                base_value = report.local.base_value,
                "explanation complete"
            );
        }
        Commands::Simulate { feature } => {
            let points = pipeline::simulate(&cfg, feature.as_deref(), &mut rng)?;
            for p in &points {
                info!(
                    delta_percent = p.delta_percent,
                    predicted = p.predicted_nox_ppm,
                    exceeds = p.exceeds_limit,
                    "what-if"
                );
            }
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let cfg = Config::load(cli.config.as_deref())?;
    init_tracing(cfg.logging.format);

    if let Err(e) = run(cli, cfg) {
        error!(error = ?e, "stage failed");
        return Err(e);
    }
    Ok(())
}
