//! SmartCore RandomForest wrapper and hyper-parameter search
//!
//! The fitted regressor lives in memory as a smartcore model and travels
//! between stages as bincode bytes inside the regressor bundle.

use anyhow::{Context, Result};
use itertools::iproduct;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use smartcore::ensemble::random_forest_regressor::{
    RandomForestRegressor, RandomForestRegressorParameters,
};
use smartcore::linalg::basic::matrix::DenseMatrix;

use super::models::TabularModel;
use super::training::TrainingDataset;
use crate::forecast::ForecastMetrics;

type Forest = RandomForestRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

/// Tree-building parameters searched by the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_trees: usize,
    /// `None` grows trees until leaves are pure
    pub max_depth: Option<u16>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
        }
    }
}

impl ForestParams {
    fn to_smartcore(self, seed: u64) -> RandomForestRegressorParameters {
        RandomForestRegressorParameters {
            max_depth: self.max_depth,
            min_samples_leaf: self.min_samples_leaf,
            min_samples_split: self.min_samples_split,
            n_trees: self.n_trees,
            m: None, // sqrt(n_features)
            keep_samples: false,
            seed,
        }
    }
}

impl std::fmt::Display for ForestParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let depth = self
            .max_depth
            .map_or_else(|| "none".to_string(), |d| d.to_string());
        write!(
            f,
            "n_trees={} max_depth={} min_samples_split={}",
            self.n_trees, depth, self.min_samples_split
        )
    }
}

fn to_matrix(rows: &[Vec<f64>], n_features: usize) -> Result<DenseMatrix<f64>> {
    let mut flat = Vec::with_capacity(rows.len() * n_features);
    for (i, row) in rows.iter().enumerate() {
        if row.len() != n_features {
            anyhow::bail!(
                "Feature count mismatch in row {}: expected {}, got {}",
                i,
                n_features,
                row.len()
            );
        }
        flat.extend_from_slice(row);
    }
    Ok(DenseMatrix::new(rows.len(), n_features, flat, false))
}

/// Fitted random forest
#[derive(Debug)]
pub struct RandomForestModel {
    model: Forest,
    params: ForestParams,
    seed: u64,
    n_features: usize,
}

impl RandomForestModel {
    /// Fit on `dataset`; the tree seed is drawn from `rng`
    pub fn train<R: Rng + ?Sized>(
        dataset: &TrainingDataset,
        params: ForestParams,
        rng: &mut R,
    ) -> Result<Self> {
        Self::train_with_seed(dataset, params, rng.gen())
    }

    pub fn train_with_seed(dataset: &TrainingDataset, params: ForestParams, seed: u64) -> Result<Self> {
        if dataset.is_empty() {
            anyhow::bail!("Cannot train on empty dataset");
        }

        let n_features = dataset.n_features();
        let x = to_matrix(&dataset.features, n_features)?;
        let model = Forest::fit(&x, &dataset.targets, params.to_smartcore(seed))
            .map_err(|e| anyhow::anyhow!("RandomForest training failed: {:?}", e))?;

        debug!(rows = dataset.len(), features = n_features, %params, "random forest fitted");

        Ok(Self {
            model,
            params,
            seed,
            n_features,
        })
    }

    pub fn params(&self) -> ForestParams {
        self.params
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(&self.model).context("Failed to serialize model")
    }

    pub fn from_bytes(bytes: &[u8], params: ForestParams, seed: u64, n_features: usize) -> Result<Self> {
        let model: Forest = bincode::deserialize(bytes).context("Failed to deserialize model")?;
        Ok(Self {
            model,
            params,
            seed,
            n_features,
        })
    }
}

impl TabularModel for RandomForestModel {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_rows(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let x = to_matrix(rows, self.n_features)?;
        self.model
            .predict(&x)
            .map_err(|e| anyhow::anyhow!("Prediction failed: {:?}", e))
    }
}

/// Candidate values for each searched parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamGrid {
    pub n_trees: Vec<usize>,
    pub max_depth: Vec<Option<u16>>,
    pub min_samples_split: Vec<usize>,
}

impl Default for ParamGrid {
    fn default() -> Self {
        Self {
            n_trees: vec![100, 200],
            max_depth: vec![None, Some(10), Some(20)],
            min_samples_split: vec![2, 5],
        }
    }
}

impl ParamGrid {
    /// Every combination, `n_trees` varying slowest
    pub fn candidates(&self) -> Vec<ForestParams> {
        iproduct!(
            self.n_trees.iter(),
            self.max_depth.iter(),
            self.min_samples_split.iter()
        )
        .map(|(&n_trees, &max_depth, &min_samples_split)| ForestParams {
            n_trees,
            max_depth,
            min_samples_split,
            ..ForestParams::default()
        })
        .collect()
    }
}

/// Cross-validation outcome for one candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvResult {
    pub rank: usize,
    pub n_trees: usize,
    pub max_depth: Option<u16>,
    pub min_samples_split: usize,
    pub mean_r2: f64,
    pub std_r2: f64,
}

impl CvResult {
    pub fn params(&self) -> ForestParams {
        ForestParams {
            n_trees: self.n_trees,
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            ..ForestParams::default()
        }
    }
}

/// Exhaustive search scored by mean R² over contiguous k folds
pub struct GridSearch {
    pub grid: ParamGrid,
    pub folds: usize,
}

impl GridSearch {
    pub fn new(grid: ParamGrid, folds: usize) -> Self {
        Self { grid, folds }
    }

    /// Score every candidate and return them ranked best first.
    ///
    /// All candidates share one seed drawn from `rng` so they differ only in
    /// their parameters. Ties keep grid order.
    pub fn run<R: Rng + ?Sized>(&self, dataset: &TrainingDataset, rng: &mut R) -> Result<Vec<CvResult>> {
        let candidates = self.grid.candidates();
        if candidates.is_empty() {
            anyhow::bail!("Parameter grid is empty");
        }

        let folds = dataset.k_folds(self.folds)?;
        let seed: u64 = rng.gen();
        let mut results = Vec::with_capacity(candidates.len());

        for params in candidates {
            let mut scores = Vec::with_capacity(folds.len());
            for (train, validation) in &folds {
                let model = RandomForestModel::train_with_seed(train, params, seed)?;
                let predicted = model.predict_rows(&validation.features)?;
                let metrics = ForecastMetrics::calculate(&validation.targets, &predicted)?;
                scores.push(metrics.r2);
            }

            let mean_r2 = scores.iter().sum::<f64>() / scores.len() as f64;
            let std_r2 = (scores.iter().map(|s| (s - mean_r2).powi(2)).sum::<f64>()
                / scores.len() as f64)
                .sqrt();
            debug!(%params, mean_r2, std_r2, "candidate scored");

            results.push(CvResult {
                rank: 0,
                n_trees: params.n_trees,
                max_depth: params.max_depth,
                min_samples_split: params.min_samples_split,
                mean_r2,
                std_r2,
            });
        }

        results.sort_by(|a, b| b.mean_r2.total_cmp(&a.mean_r2));
        for (i, result) in results.iter_mut().enumerate() {
            result.rank = i + 1;
        }

        if let Some(best) = results.first() {
            info!(
                candidates = results.len(),
                folds = self.folds,
                best = %best.params(),
                mean_r2 = best.mean_r2,
                "grid search finished"
            );
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    // y = 2*x1 + 3*x2 over a small grid of points
    fn linear_dataset() -> TrainingDataset {
        let mut features = Vec::new();
        let mut targets = Vec::new();
        for i in 0..8 {
            for j in 0..5 {
                let (x1, x2) = (i as f64, j as f64);
                features.push(vec![x1, x2]);
                targets.push(2.0 * x1 + 3.0 * x2);
            }
        }
        TrainingDataset::new(features, targets).unwrap()
    }

    fn small_params() -> ForestParams {
        ForestParams {
            n_trees: 10,
            max_depth: Some(5),
            ..ForestParams::default()
        }
    }

    #[test]
    fn test_grid_candidates_cover_product() {
        let candidates = ParamGrid::default().candidates();
        assert_eq!(candidates.len(), 12);
        assert_eq!(candidates[0].n_trees, 100);
        assert_eq!(candidates[0].max_depth, None);
        assert_eq!(candidates[11].n_trees, 200);
        assert_eq!(candidates[11].max_depth, Some(20));
        assert_eq!(candidates[11].min_samples_split, 5);
    }

    #[test]
    fn test_params_display() {
        assert_eq!(
            ForestParams::default().to_string(),
            "n_trees=100 max_depth=none min_samples_split=2"
        );
    }

    #[test]
    fn test_train_and_predict() {
        let dataset = linear_dataset();
        let model =
            RandomForestModel::train(&dataset, small_params(), &mut StdRng::seed_from_u64(42)).unwrap();

        assert_eq!(model.n_features(), 2);
        let prediction = model.predict_row(&[4.0, 2.0]).unwrap();
        // true value 14
        assert!(prediction > 9.0 && prediction < 19.0, "prediction {prediction}");
    }

    #[test]
    fn test_rejects_wrong_width() {
        let model =
            RandomForestModel::train_with_seed(&linear_dataset(), small_params(), 7).unwrap();
        assert!(model.predict_row(&[1.0]).is_err());
    }

    #[test]
    fn test_empty_dataset_is_error() {
        let empty = TrainingDataset::new(Vec::new(), Vec::new()).unwrap();
        assert!(RandomForestModel::train_with_seed(&empty, small_params(), 1).is_err());
    }

    #[test]
    fn test_bytes_round_trip_predicts_identically() {
        let dataset = linear_dataset();
        let model = RandomForestModel::train_with_seed(&dataset, small_params(), 3).unwrap();
        let bytes = model.to_bytes().unwrap();
        let restored = RandomForestModel::from_bytes(&bytes, model.params(), model.seed(), 2).unwrap();

        assert_eq!(
            model.predict_rows(&dataset.features).unwrap(),
            restored.predict_rows(&dataset.features).unwrap()
        );
    }

    #[test]
    fn test_same_seed_same_forest() {
        let dataset = linear_dataset();
        let a = RandomForestModel::train(&dataset, small_params(), &mut StdRng::seed_from_u64(9)).unwrap();
        let b = RandomForestModel::train(&dataset, small_params(), &mut StdRng::seed_from_u64(9)).unwrap();
        assert_eq!(
            a.predict_rows(&dataset.features).unwrap(),
            b.predict_rows(&dataset.features).unwrap()
        );
    }

    #[test]
    fn test_grid_search_ranks_all_candidates() {
        let grid = ParamGrid {
            n_trees: vec![5, 10],
            max_depth: vec![Some(2), None],
            min_samples_split: vec![2],
        };
        let results = GridSearch::new(grid, 3)
            .run(&linear_dataset(), &mut StdRng::seed_from_u64(42))
            .unwrap();

        assert_eq!(results.len(), 4);
        assert_eq!(results[0].rank, 1);
        assert_eq!(results[3].rank, 4);
        assert!(results.windows(2).all(|w| w[0].mean_r2 >= w[1].mean_r2));
    }

    #[test]
    fn test_grid_search_needs_enough_rows() {
        let tiny = TrainingDataset::new(vec![vec![1.0], vec![2.0]], vec![1.0, 2.0]).unwrap();
        let result = GridSearch::new(ParamGrid::default(), 3).run(&tiny, &mut StdRng::seed_from_u64(1));
        assert!(result.is_err());
    }
}
