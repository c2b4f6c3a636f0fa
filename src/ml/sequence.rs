//! Linear autoregressive sequence model
//!
//! Maps the last `window_len` scaled daily values to the next one. It plugs
//! into the recursive forecaster through `PointPredictor`.

use anyhow::Result;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::models::LinearModel;
use super::training::{EpochLoss, ModelTrainer, TrainingConfig, TrainingDataset};
use crate::forecast::{PointPredictor, WindowedDataset};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearSequenceModel {
    pub window_len: usize,
    pub linear: LinearModel,
}

impl LinearSequenceModel {
    pub fn new(window_len: usize, linear: LinearModel) -> Result<Self> {
        anyhow::ensure!(
            linear.coefficients.len() == window_len,
            "model has {} coefficients for a window of {}",
            linear.coefficients.len(),
            window_len
        );
        Ok(Self { window_len, linear })
    }

    /// Fit on the training pairs of `windows`
    pub fn train<R: Rng + ?Sized>(
        windows: &WindowedDataset,
        config: TrainingConfig,
        rng: &mut R,
    ) -> Result<(Self, Vec<EpochLoss>)> {
        anyhow::ensure!(!windows.is_empty(), "no training windows");

        let dataset = TrainingDataset::from_windows(windows);
        let (linear, history) = ModelTrainer::new(config).train_linear(&dataset, rng)?;
        Ok((Self::new(windows.window_len, linear)?, history))
    }

    /// One-step-ahead predictions for every pair, each from its true window
    pub fn predict_pairs(&self, windows: &WindowedDataset) -> Result<Vec<f64>> {
        windows
            .pairs
            .iter()
            .map(|pair| self.predict_next(&pair.window))
            .collect()
    }
}

impl PointPredictor for LinearSequenceModel {
    fn predict_next(&self, window: &[f64]) -> Result<f64> {
        if window.len() != self.window_len {
            anyhow::bail!(
                "window length mismatch: model expects {}, got {}",
                self.window_len,
                window.len()
            );
        }
        Ok(self.linear.eval(window))
    }
}
