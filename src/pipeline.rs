//! Pipeline stages
//!
//! Each stage reads its inputs from the paths in `Config`, computes, writes
//! its output file and returns a summary. Stages that need randomness take
//! the caller's generator; none of them seed their own.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

use crate::analysis::{
    self, detect_exceedances, explain_sample, feature_index, permutation_importance, pick_sample,
    simulate_variation, AlertRecord, DescriptiveReport, ExplanationReport, WhatIfPoint,
};
use crate::config::Config;
use crate::forecast::{
    exceedance_rate, forecast_recursive, ForecastMetrics, Log1pMinMaxScaler, WindowedDataset,
};
use crate::ingest::{self, DailySeries};
use crate::ml::{
    Bundle, CategoryEncoding, CvResult, EpochLoss, GridSearch, LinearSequenceModel, ModelMetadata,
    ModelType, RandomForestModel, RegressorBundle, SequenceBundle, TabularModel, TrainingDataset,
    ValidationMetrics,
};

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}

/// Join the monthly report with the daily export and write the merged dataset
pub fn merge(cfg: &Config) -> Result<usize> {
    let range = cfg.analysis.date_range()?;
    let daily = ingest::read_daily_csv(&cfg.paths.daily_csv)?;
    let monthly = ingest::read_monthly_csv(&cfg.paths.monthly_csv)?;

    let merged = ingest::merge_exports(&daily, &monthly, &range);
    if merged.is_empty() {
        warn!("merge produced no rows; check station and unit labels");
    }
    ingest::write_merged_csv(&cfg.paths.merged_csv, &merged)?;

    info!(rows = merged.len(), path = %cfg.paths.merged_csv.display(), "merged dataset written");
    Ok(merged.len())
}

pub fn describe(cfg: &Config) -> Result<DescriptiveReport> {
    let range = cfg.analysis.date_range()?;
    let daily = ingest::read_daily_csv(&cfg.paths.daily_csv)?;
    let report = analysis::describe(&daily, &range, cfg.analysis.outlier_nox)?;

    for group in report.groups.iter().take(5) {
        info!(group = %group.group, mean = group.mean, count = group.count, "top NOx group");
    }
    write_json(&cfg.paths.describe_report, &report)?;
    Ok(report)
}

#[derive(Debug, Clone)]
pub struct SequenceTrainingSummary {
    pub days: usize,
    pub train_pairs: usize,
    pub test_pairs: usize,
    /// Test-split metrics in ppm; `None` when the split left no test pairs
    pub test_metrics: Option<ForecastMetrics>,
    pub history: Vec<EpochLoss>,
}

/// Fit the sequence model on the daily NOx series and save its bundle
pub fn train_sequence<R: Rng + ?Sized>(cfg: &Config, rng: &mut R) -> Result<SequenceTrainingSummary> {
    let seq = &cfg.sequence;
    let range = cfg.analysis.date_range()?;
    let daily = ingest::read_daily_csv(&cfg.paths.daily_csv)?;
    let series = DailySeries::from_daily_records(&daily, &range)?;

    let scaler = Log1pMinMaxScaler::fit(series.values())?;
    let scaled = scaler.transform(series.values())?;

    let windows = WindowedDataset::from_series(&scaled, seq.window_len);
    if windows.is_empty() {
        anyhow::bail!(
            "series of {} days is too short for a window of {}",
            series.len(),
            seq.window_len
        );
    }
    let (train, test) = windows.split(seq.train_ratio);
    anyhow::ensure!(!train.is_empty(), "train ratio {} leaves no training pairs", seq.train_ratio);

    let (model, history) = LinearSequenceModel::train(&train, seq.training_config(), rng)?;

    let test_metrics = if test.is_empty() {
        warn!("no test pairs; skipping evaluation");
        None
    } else {
        let predicted = scaler.inverse(&model.predict_pairs(&test)?);
        let actual = scaler.inverse(&test.targets());
        let metrics = ForecastMetrics::calculate(&actual, &predicted)?;
        info!(mae = metrics.mae, rmse = metrics.rmse, r2 = metrics.r2, "sequence model evaluated");
        Some(metrics)
    };

    let last_window = scaled[scaled.len() - seq.window_len..].to_vec();
    let last_date = series
        .last_date()
        .ok_or_else(|| anyhow::anyhow!("daily series is empty"))?;

    let lag_names = (1..=seq.window_len).rev().map(|k| format!("lag_{k}")).collect();
    let mut metadata = ModelMetadata::new(ModelType::LinearAutoregressive, train.len(), cfg.seed)
        .with_feature_names(lag_names);
    if let Some(m) = &test_metrics {
        metadata = metadata.with_metrics(ValidationMetrics::from(m));
    }

    SequenceBundle::new(model, scaler, last_window, last_date, metadata)?
        .save(&cfg.paths.sequence_bundle)?;

    Ok(SequenceTrainingSummary {
        days: series.len(),
        train_pairs: train.len(),
        test_pairs: test.len(),
        test_metrics,
        history,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub predicted_nox: f64,
}

/// Forecast `horizon` days (config default when `None`) past the training data
pub fn forecast(cfg: &Config, horizon: Option<usize>) -> Result<Vec<ForecastPoint>> {
    let horizon = horizon.unwrap_or(cfg.sequence.horizon);
    let bundle = SequenceBundle::load(&cfg.paths.sequence_bundle)?;

    let scaled = forecast_recursive(&bundle.model, &bundle.last_window, horizon)?;
    let values = bundle.scaler.inverse(&scaled);
    let dates = ingest::dates_after(bundle.last_date, horizon);

    let points: Vec<ForecastPoint> = dates
        .into_iter()
        .zip(values)
        .map(|(date, predicted_nox)| ForecastPoint { date, predicted_nox })
        .collect();

    ingest::write_csv(&cfg.paths.forecast_csv, &points)?;
    info!(
        horizon,
        from = %bundle.last_date,
        model_id = %bundle.metadata.model_id,
        "forecast written"
    );
    Ok(points)
}

#[derive(Debug, Clone)]
pub struct RegressorTrainingSummary {
    pub train_rows: usize,
    pub test_rows: usize,
    pub cv_results: Vec<CvResult>,
    pub test_metrics: ForecastMetrics,
    pub test_exceedance_rate: f64,
}

/// Grid-search, refit and save the random-forest regressor
pub fn train_regressor<R: Rng + ?Sized>(cfg: &Config, rng: &mut R) -> Result<RegressorTrainingSummary> {
    let reg = &cfg.regressor;
    let records = ingest::read_merged_csv(&cfg.paths.merged_csv)?;
    anyhow::ensure!(!records.is_empty(), "merged dataset is empty");

    let encoding = CategoryEncoding::fit(&records);
    let dataset = TrainingDataset::new(
        encoding.encode_all(&records),
        records.iter().map(|r| r.nox_ppm).collect(),
    )?;
    let (train, test) = dataset.shuffled_split(reg.test_ratio, rng)?;
    info!(train = train.len(), test = test.len(), features = encoding.width(), "regressor data split");

    let cv_results = GridSearch::new(reg.grid(), reg.cv_folds).run(&train, rng)?;
    let best = cv_results
        .first()
        .map(CvResult::params)
        .ok_or_else(|| anyhow::anyhow!("grid search returned no candidates"))?;
    ingest::write_csv(&cfg.paths.grid_report_csv, &cv_results)?;

    let model = RandomForestModel::train(&train, best, rng)?;
    let predicted = model.predict_rows(&test.features)?;
    let test_metrics = ForecastMetrics::calculate(&test.targets, &predicted)?;
    let test_exceedance_rate = exceedance_rate(&predicted, cfg.alert.nox_limit);
    info!(
        params = %best,
        rmse = test_metrics.rmse,
        r2 = test_metrics.r2,
        exceedance_rate = test_exceedance_rate,
        "regressor evaluated"
    );

    let metadata = ModelMetadata::new(ModelType::RandomForest, train.len(), cfg.seed)
        .with_feature_names(encoding.feature_names())
        .with_metrics(ValidationMetrics::from(&test_metrics));
    RegressorBundle::new(&model, encoding, cv_results.clone(), test_exceedance_rate, metadata)?
        .save(&cfg.paths.regressor_bundle)?;

    Ok(RegressorTrainingSummary {
        train_rows: train.len(),
        test_rows: test.len(),
        cv_results,
        test_metrics,
        test_exceedance_rate,
    })
}

/// Flag merged rows whose predicted NOx is above the regulation limit
pub fn alert(cfg: &Config) -> Result<Vec<AlertRecord>> {
    let bundle = RegressorBundle::load(&cfg.paths.regressor_bundle)?;
    let model = bundle.model()?;
    let records = ingest::read_merged_csv(&cfg.paths.merged_csv)?;

    let alerts = detect_exceedances(&model, &bundle.encoding, &records, cfg.alert.nox_limit)?;
    if alerts.is_empty() {
        info!(limit = cfg.alert.nox_limit, "all predictions within the regulation limit");
    } else {
        ingest::write_csv(&cfg.paths.alerts_csv, &alerts)?;
        warn!(
            alerts = alerts.len(),
            path = %cfg.paths.alerts_csv.display(),
            "predicted NOx above the regulation limit"
        );
    }
    Ok(alerts)
}

/// Global importance plus a local explanation of one merged row
pub fn explain<R: Rng + ?Sized>(cfg: &Config, sample: Option<usize>, rng: &mut R) -> Result<ExplanationReport> {
    let bundle = RegressorBundle::load(&cfg.paths.regressor_bundle)?;
    let model = bundle.model()?;
    let records = ingest::read_merged_csv(&cfg.paths.merged_csv)?;

    let rows = bundle.encoding.encode_all(&records);
    let targets: Vec<f64> = records.iter().map(|r| r.nox_ppm).collect();
    let names = bundle.feature_names();
    let repeats = cfg.explain.repeats;

    let global = permutation_importance(&model, &rows, &targets, &names, repeats, rng)?;
    let local = explain_sample(&model, &rows, sample.unwrap_or(cfg.explain.sample), &names)?;

    let report = ExplanationReport {
        model_id: bundle.metadata.model_id.clone(),
        rows: rows.len(),
        repeats,
        global,
        local,
    };
    for item in report.global.iter().take(5) {
        info!(feature = %item.feature, importance = item.importance, "feature importance");
    }
    write_json(&cfg.paths.explain_report, &report)?;
    Ok(report)
}

/// Vary one input of a randomly chosen merged row and record the predictions
pub fn simulate<R: Rng + ?Sized>(cfg: &Config, feature: Option<&str>, rng: &mut R) -> Result<Vec<WhatIfPoint>> {
    let bundle = RegressorBundle::load(&cfg.paths.regressor_bundle)?;
    let model = bundle.model()?;
    let records = ingest::read_merged_csv(&cfg.paths.merged_csv)?;

    let feature = feature.unwrap_or(&cfg.simulation.feature);
    let column = feature_index(&bundle.feature_names(), feature)?;
    let index = pick_sample(records.len(), rng)
        .ok_or_else(|| anyhow::anyhow!("merged dataset is empty"))?;
    let record = &records[index];
    info!(
        sample = index,
        station = %record.station,
        unit = %record.unit,
        month = %record.month,
        feature,
        "what-if sample chosen"
    );

    let points = simulate_variation(
        &model,
        &bundle.encoding.encode(record),
        column,
        &cfg.simulation.variation(),
        cfg.alert.nox_limit,
    )?;
    ingest::write_csv(&cfg.paths.simulation_csv, &points)?;
    Ok(points)
}
