//! ML Model Definitions
//!
//! The `TabularModel` seam is what alerting, explanation and what-if
//! simulation run against; the random forest and the linear model both sit
//! behind it.

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// A fitted model over fixed-width numeric rows
pub trait TabularModel {
    /// Number of columns every row must have
    fn n_features(&self) -> usize;

    /// Predict one value per row
    fn predict_rows(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>>;

    fn predict_row(&self, row: &[f64]) -> Result<f64> {
        let predictions = self.predict_rows(&[row.to_vec()])?;
        predictions
            .first()
            .copied()
            .ok_or_else(|| anyhow::anyhow!("model returned no prediction"))
    }
}

/// Linear model `y = w·x + b`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl LinearModel {
    pub fn new(coefficients: Vec<f64>, intercept: f64) -> Self {
        Self {
            coefficients,
            intercept,
        }
    }

    pub fn zeros(n_features: usize) -> Self {
        Self::new(vec![0.0; n_features], 0.0)
    }

    /// Dot product plus intercept; the caller guarantees the width
    pub(crate) fn eval(&self, features: &[f64]) -> f64 {
        features
            .iter()
            .zip(self.coefficients.iter())
            .map(|(f, c)| f * c)
            .sum::<f64>()
            + self.intercept
    }

    pub fn predict(&self, features: &[f64]) -> Result<f64> {
        if features.len() != self.coefficients.len() {
            anyhow::bail!(
                "Feature count mismatch: expected {}, got {}",
                self.coefficients.len(),
                features.len()
            );
        }
        Ok(self.eval(features))
    }
}

impl TabularModel for LinearModel {
    fn n_features(&self) -> usize {
        self.coefficients.len()
    }

    fn predict_rows(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        rows.iter().map(|row| self.predict(row)).collect()
    }
}
