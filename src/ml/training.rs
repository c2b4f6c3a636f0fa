//! ML Model Training Pipeline
//!
//! Dataset splitting and mini-batch gradient descent. Every source of
//! randomness is a `&mut impl Rng` passed in by the caller, so one seeded
//! generator makes a whole training run reproducible.

use anyhow::Result;
use rand::seq::SliceRandom;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::models::LinearModel;
use crate::forecast::WindowedDataset;

/// Training Dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingDataset {
    pub features: Vec<Vec<f64>>,
    pub targets: Vec<f64>,
}

impl TrainingDataset {
    pub fn new(features: Vec<Vec<f64>>, targets: Vec<f64>) -> Result<Self> {
        if features.len() != targets.len() {
            anyhow::bail!(
                "Feature and target count mismatch: {} features, {} targets",
                features.len(),
                targets.len()
            );
        }
        if let Some(first) = features.first() {
            let width = first.len();
            if let Some(i) = features.iter().position(|row| row.len() != width) {
                anyhow::bail!("Row {} has {} features, expected {}", i, features[i].len(), width);
            }
        }
        Ok(Self { features, targets })
    }

    pub fn from_windows(windows: &WindowedDataset) -> Self {
        Self {
            features: windows.pairs.iter().map(|p| p.window.clone()).collect(),
            targets: windows.targets(),
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn n_features(&self) -> usize {
        self.features.first().map_or(0, Vec::len)
    }

    fn subset(&self, indices: &[usize]) -> TrainingDataset {
        TrainingDataset {
            features: indices.iter().map(|&i| self.features[i].clone()).collect(),
            targets: indices.iter().map(|&i| self.targets[i]).collect(),
        }
    }

    /// Ordered split: rows before `idx` and the rest
    fn split_at(&self, idx: usize) -> (TrainingDataset, TrainingDataset) {
        let indices: Vec<usize> = (0..self.len()).collect();
        let idx = idx.min(self.len());
        (self.subset(&indices[..idx]), self.subset(&indices[idx..]))
    }

    /// Random split; `test_ratio` of the rows (rounded up) go to the test side
    pub fn shuffled_split<R: Rng + ?Sized>(
        &self,
        test_ratio: f64,
        rng: &mut R,
    ) -> Result<(TrainingDataset, TrainingDataset)> {
        if test_ratio <= 0.0 || test_ratio >= 1.0 {
            anyhow::bail!("Test ratio must be between 0 and 1");
        }

        let mut indices: Vec<usize> = (0..self.len()).collect();
        indices.shuffle(rng);

        let n_test = (self.len() as f64 * test_ratio).ceil() as usize;
        let (test, train) = indices.split_at(n_test.min(self.len()));
        Ok((self.subset(train), self.subset(test)))
    }

    /// Contiguous k-fold partitions as `(train, validation)` pairs.
    ///
    /// The first `len % k` folds get one extra row. Fewer rows than folds is an error.
    pub fn k_folds(&self, k: usize) -> Result<Vec<(TrainingDataset, TrainingDataset)>> {
        if k < 2 {
            anyhow::bail!("Need at least 2 folds, got {}", k);
        }
        if self.len() < k {
            anyhow::bail!("Cannot make {} folds from {} rows", k, self.len());
        }

        let base = self.len() / k;
        let extra = self.len() % k;
        let mut start = 0;
        let mut folds = Vec::with_capacity(k);

        for fold in 0..k {
            let size = base + usize::from(fold < extra);
            let end = start + size;
            let val: Vec<usize> = (start..end).collect();
            let train: Vec<usize> = (0..start).chain(end..self.len()).collect();
            folds.push((self.subset(&train), self.subset(&val)));
            start = end;
        }

        Ok(folds)
    }
}

/// Training Configuration for gradient-descent models
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    /// Tail share of the training rows held out to monitor loss per epoch
    pub validation_split: f64,
    /// Std-dev of the normal distribution initial weights are drawn from
    pub init_std: f64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 50,
            batch_size: 16,
            learning_rate: 0.05,
            validation_split: 0.1,
            init_std: 0.05,
        }
    }
}

/// Loss after one pass over the training rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochLoss {
    pub epoch: usize,
    pub train_loss: f64,
    pub val_loss: Option<f64>,
}

/// Model Trainer
pub struct ModelTrainer {
    config: TrainingConfig,
}

impl ModelTrainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    /// Fit `y = w·x + b` by mini-batch gradient descent on mean squared error.
    ///
    /// Batches are reshuffled every epoch. The last `validation_split` share
    /// of rows is never trained on; its loss is only reported.
    pub fn train_linear<R: Rng + ?Sized>(
        &self,
        dataset: &TrainingDataset,
        rng: &mut R,
    ) -> Result<(LinearModel, Vec<EpochLoss>)> {
        if dataset.is_empty() {
            anyhow::bail!("Cannot train on empty dataset");
        }
        anyhow::ensure!(self.config.batch_size > 0, "batch size must be positive");

        let n_features = dataset.n_features();
        let split_at = (dataset.len() as f64 * (1.0 - self.config.validation_split)).floor() as usize;
        let (fit_rows, val_rows) = if split_at == 0 || split_at >= dataset.len() {
            (dataset.clone(), None)
        } else {
            let (fit, val) = dataset.split_at(split_at);
            (fit, Some(val))
        };

        let init = Normal::new(0.0, self.config.init_std)
            .map_err(|e| anyhow::anyhow!("invalid weight init std {}: {}", self.config.init_std, e))?;
        let mut model = LinearModel::new(
            (0..n_features).map(|_| init.sample(rng)).collect(),
            0.0,
        );

        let mut order: Vec<usize> = (0..fit_rows.len()).collect();
        let mut history = Vec::with_capacity(self.config.epochs);

        for epoch in 1..=self.config.epochs {
            order.shuffle(rng);

            for batch in order.chunks(self.config.batch_size) {
                let mut coef_gradients = vec![0.0; n_features];
                let mut intercept_gradient = 0.0;
                let n = batch.len() as f64;

                for &i in batch {
                    let features = &fit_rows.features[i];
                    let error = model.eval(features) - fit_rows.targets[i];
                    for (g, x) in coef_gradients.iter_mut().zip(features) {
                        *g += 2.0 * error * x / n;
                    }
                    intercept_gradient += 2.0 * error / n;
                }

                for (c, g) in model.coefficients.iter_mut().zip(&coef_gradients) {
                    *c -= self.config.learning_rate * g;
                }
                model.intercept -= self.config.learning_rate * intercept_gradient;
            }

            let loss = EpochLoss {
                epoch,
                train_loss: mse(&model, &fit_rows),
                val_loss: val_rows.as_ref().map(|v| mse(&model, v)),
            };
            debug!(epoch, train_loss = loss.train_loss, val_loss = ?loss.val_loss, "epoch finished");
            history.push(loss);
        }

        if let Some(last) = history.last() {
            info!(
                epochs = self.config.epochs,
                rows = fit_rows.len(),
                held_out = val_rows.as_ref().map_or(0, TrainingDataset::len),
                train_loss = last.train_loss,
                val_loss = ?last.val_loss,
                "linear model trained"
            );
        }

        Ok((model, history))
    }
}

fn mse(model: &LinearModel, dataset: &TrainingDataset) -> f64 {
    if dataset.is_empty() {
        return 0.0;
    }
    dataset
        .features
        .iter()
        .zip(&dataset.targets)
        .map(|(x, y)| (model.eval(x) - y).powi(2))
        .sum::<f64>()
        / dataset.len() as f64
}
