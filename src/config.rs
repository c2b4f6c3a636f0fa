use anyhow::{Context, Result};
use chrono::NaiveDate;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use validator::Validate;

use crate::analysis::{VariationRange, DEFAULT_NOX_LIMIT};
use crate::domain::DateRange;
use crate::ml::{ParamGrid, TrainingConfig};
use crate::telemetry::LogFormat;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";
pub const ENV_PREFIX: &str = "NOXF__";

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Config {
    /// Seeds the one generator every random step draws from
    pub seed: u64,
    #[validate(nested)]
    pub paths: PathsConfig,
    #[validate(nested)]
    pub analysis: AnalysisConfig,
    #[validate(nested)]
    pub sequence: SequenceConfig,
    #[validate(nested)]
    pub regressor: RegressorConfig,
    #[validate(nested)]
    pub alert: AlertConfig,
    #[validate(nested)]
    pub explain: ExplainConfig,
    #[validate(nested)]
    pub simulation: SimulationConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PathsConfig {
    pub daily_csv: PathBuf,
    pub monthly_csv: PathBuf,
    pub merged_csv: PathBuf,
    pub sequence_bundle: PathBuf,
    pub regressor_bundle: PathBuf,
    pub forecast_csv: PathBuf,
    pub grid_report_csv: PathBuf,
    pub alerts_csv: PathBuf,
    pub describe_report: PathBuf,
    pub explain_report: PathBuf,
    pub simulation_csv: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AnalysisConfig {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Daily NOx above this is listed as an outlier
    #[validate(range(min = 0.0))]
    pub outlier_nox: f64,
}

impl AnalysisConfig {
    pub fn date_range(&self) -> Result<DateRange> {
        DateRange::new(self.start, self.end)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SequenceConfig {
    #[validate(range(min = 1))]
    pub window_len: usize,
    #[validate(range(exclusive_min = 0.0, exclusive_max = 1.0))]
    pub train_ratio: f64,
    #[validate(range(min = 1))]
    pub epochs: usize,
    #[validate(range(min = 1))]
    pub batch_size: usize,
    #[validate(range(exclusive_min = 0.0))]
    pub learning_rate: f64,
    #[validate(range(min = 0.0, exclusive_max = 1.0))]
    pub validation_split: f64,
    #[validate(range(min = 0.0))]
    pub init_std: f64,
    #[validate(range(min = 1))]
    pub horizon: usize,
}

impl SequenceConfig {
    pub fn training_config(&self) -> TrainingConfig {
        TrainingConfig {
            epochs: self.epochs,
            batch_size: self.batch_size,
            learning_rate: self.learning_rate,
            validation_split: self.validation_split,
            init_std: self.init_std,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RegressorConfig {
    #[validate(range(exclusive_min = 0.0, exclusive_max = 1.0))]
    pub test_ratio: f64,
    #[validate(range(min = 2))]
    pub cv_folds: usize,
    #[validate(length(min = 1))]
    pub n_trees: Vec<usize>,
    /// 0 means unlimited depth
    #[validate(length(min = 1))]
    pub max_depth: Vec<u16>,
    #[validate(length(min = 1))]
    pub min_samples_split: Vec<usize>,
}

impl RegressorConfig {
    pub fn grid(&self) -> ParamGrid {
        ParamGrid {
            n_trees: self.n_trees.clone(),
            max_depth: self.max_depth.iter().map(|&d| (d > 0).then_some(d)).collect(),
            min_samples_split: self.min_samples_split.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AlertConfig {
    /// Regulation limit in ppm; predictions strictly above it raise an alert
    #[validate(range(min = 0.0))]
    pub nox_limit: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ExplainConfig {
    #[validate(range(min = 1))]
    pub repeats: usize,
    pub sample: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SimulationConfig {
    #[validate(length(min = 1))]
    pub feature: String,
    pub start_percent: i32,
    pub end_percent: i32,
    #[validate(range(min = 1))]
    pub step_percent: i32,
}

impl SimulationConfig {
    pub fn variation(&self) -> VariationRange {
        VariationRange {
            start: self.start_percent,
            end: self.end_percent,
            step: self.step_percent,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        let training = TrainingConfig::default();
        let grid = ParamGrid::default();
        let variation = VariationRange::default();
        Self {
            seed: 42,
            paths: PathsConfig {
                daily_csv: "data/daily_emissions.csv".into(),
                monthly_csv: "data/monthly_emissions.csv".into(),
                merged_csv: "data/merged_nox.csv".into(),
                sequence_bundle: "models/nox_sequence.json".into(),
                regressor_bundle: "models/nox_regressor.json".into(),
                forecast_csv: "results/nox_forecast.csv".into(),
                grid_report_csv: "results/grid_search.csv".into(),
                alerts_csv: "alerts/nox_limit_exceeded.csv".into(),
                describe_report: "results/describe.json".into(),
                explain_report: "results/explanation.json".into(),
                simulation_csv: "results/whatif.csv".into(),
            },
            analysis: AnalysisConfig {
                start: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap_or_default(),
                end: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap_or_default(),
                outlier_nox: 200.0,
            },
            sequence: SequenceConfig {
                window_len: crate::forecast::DEFAULT_WINDOW_LEN,
                train_ratio: 0.8,
                epochs: training.epochs,
                batch_size: training.batch_size,
                learning_rate: training.learning_rate,
                validation_split: training.validation_split,
                init_std: training.init_std,
                horizon: 30,
            },
            regressor: RegressorConfig {
                test_ratio: 0.2,
                cv_folds: 3,
                n_trees: grid.n_trees,
                max_depth: grid.max_depth.iter().map(|d| d.unwrap_or(0)).collect(),
                min_samples_split: grid.min_samples_split,
            },
            alert: AlertConfig {
                nox_limit: DEFAULT_NOX_LIMIT,
            },
            explain: ExplainConfig {
                repeats: 5,
                sample: 0,
            },
            simulation: SimulationConfig {
                feature: "flow".to_string(),
                start_percent: variation.start,
                end_percent: variation.end,
                step_percent: variation.step,
            },
            logging: LoggingConfig {
                format: LogFormat::Pretty,
            },
        }
    }
}

impl Config {
    /// Defaults, then the TOML file, then `NOXF__`-prefixed environment variables.
    ///
    /// An explicitly given file must exist; the default path is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(p) => {
                anyhow::ensure!(p.exists(), "config file {} not found", p.display());
                p.to_path_buf()
            }
            None => PathBuf::from(DEFAULT_CONFIG_PATH),
        };

        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(&file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));
        let cfg: Config = figment
            .extract()
            .with_context(|| format!("invalid configuration ({})", file.display()))?;

        cfg.validate().context("configuration out of range")?;
        cfg.analysis.date_range()?;
        Ok(cfg)
    }
}
