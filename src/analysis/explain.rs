//! Model explanation
//!
//! Two model-agnostic views of a fitted regressor:
//! - global permutation importance: how much the mean squared error grows
//!   when one column is shuffled
//! - local occlusion attribution: how much one prediction moves when a single
//!   feature is replaced by its dataset mean

use anyhow::Result;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::ml::TabularModel;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    /// Mean increase in MSE over the repeats
    pub importance: f64,
    pub std: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribution {
    pub feature: String,
    pub value: f64,
    pub contribution: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalExplanation {
    pub sample_index: usize,
    /// Mean prediction over the dataset
    pub base_value: f64,
    pub prediction: f64,
    /// Largest absolute contribution first
    pub contributions: Vec<Attribution>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplanationReport {
    pub model_id: String,
    pub rows: usize,
    pub repeats: usize,
    pub global: Vec<FeatureImportance>,
    pub local: LocalExplanation,
}

fn mse(predicted: &[f64], targets: &[f64]) -> f64 {
    predicted
        .iter()
        .zip(targets)
        .map(|(p, t)| (p - t).powi(2))
        .sum::<f64>()
        / targets.len() as f64
}

fn check_shape(rows: &[Vec<f64>], feature_names: &[String]) -> Result<()> {
    anyhow::ensure!(!rows.is_empty(), "cannot explain an empty dataset");
    if let Some(i) = rows.iter().position(|r| r.len() != feature_names.len()) {
        anyhow::bail!(
            "row {} has {} features, expected {}",
            i,
            rows[i].len(),
            feature_names.len()
        );
    }
    Ok(())
}

fn column_means(rows: &[Vec<f64>], width: usize) -> Vec<f64> {
    let mut means = vec![0.0; width];
    for row in rows {
        for (m, v) in means.iter_mut().zip(row) {
            *m += v;
        }
    }
    means.iter_mut().for_each(|m| *m /= rows.len() as f64);
    means
}

/// Permutation importance of every column, sorted by importance descending
pub fn permutation_importance<M, R>(
    model: &M,
    rows: &[Vec<f64>],
    targets: &[f64],
    feature_names: &[String],
    repeats: usize,
    rng: &mut R,
) -> Result<Vec<FeatureImportance>>
where
    M: TabularModel + ?Sized,
    R: Rng + ?Sized,
{
    check_shape(rows, feature_names)?;
    anyhow::ensure!(rows.len() == targets.len(), "row and target counts differ");
    anyhow::ensure!(repeats > 0, "need at least one repeat");

    let baseline = mse(&model.predict_rows(rows)?, targets);
    let mut permuted = rows.to_vec();
    let mut out = Vec::with_capacity(feature_names.len());

    for (j, name) in feature_names.iter().enumerate() {
        let mut column: Vec<f64> = rows.iter().map(|r| r[j]).collect();
        let mut increases = Vec::with_capacity(repeats);

        for _ in 0..repeats {
            column.shuffle(rng);
            for (row, v) in permuted.iter_mut().zip(&column) {
                row[j] = *v;
            }
            increases.push(mse(&model.predict_rows(&permuted)?, targets) - baseline);
        }
        for (row, original) in permuted.iter_mut().zip(rows) {
            row[j] = original[j];
        }

        let importance = increases.iter().sum::<f64>() / repeats as f64;
        let std = (increases.iter().map(|x| (x - importance).powi(2)).sum::<f64>()
            / repeats as f64)
            .sqrt();
        debug!(feature = %name, importance, "permutation importance");

        out.push(FeatureImportance {
            feature: name.clone(),
            importance,
            std,
        });
    }

    out.sort_by(|a, b| b.importance.total_cmp(&a.importance));
    Ok(out)
}

/// Attribute the prediction for `rows[index]` to its features
pub fn explain_sample<M: TabularModel + ?Sized>(
    model: &M,
    rows: &[Vec<f64>],
    index: usize,
    feature_names: &[String],
) -> Result<LocalExplanation> {
    check_shape(rows, feature_names)?;
    let sample = rows.get(index).ok_or_else(|| {
        anyhow::anyhow!("sample index {} out of range for {} rows", index, rows.len())
    })?;

    let predictions = model.predict_rows(rows)?;
    let base_value = predictions.iter().sum::<f64>() / predictions.len() as f64;
    let prediction = predictions[index];
    let means = column_means(rows, feature_names.len());

    let occluded: Vec<Vec<f64>> = (0..feature_names.len())
        .map(|j| {
            let mut row = sample.clone();
            row[j] = means[j];
            row
        })
        .collect();
    let occluded_predictions = model.predict_rows(&occluded)?;

    let mut contributions: Vec<Attribution> = feature_names
        .iter()
        .zip(occluded_predictions)
        .enumerate()
        .map(|(j, (name, without))| Attribution {
            feature: name.clone(),
            value: sample[j],
            contribution: prediction - without,
        })
        .collect();
    contributions.sort_by(|a, b| b.contribution.abs().total_cmp(&a.contribution.abs()));

    info!(sample = index, prediction, base_value, "local explanation computed");
    Ok(LocalExplanation {
        sample_index: index,
        base_value,
        prediction,
        contributions,
    })
}
