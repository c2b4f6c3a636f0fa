//! Machine Learning Module
//!
//! Models and training for the two NOx predictors:
//! - a linear autoregressive sequence model over a window of daily values
//! - a random-forest regressor over merged monthly/daily plant features
//!
//! # Architecture
//! - Training pipeline with seeded, injected randomness
//! - Category encoding persisted alongside the model
//! - Versioned artifact bundles handed from train to predict stages

use serde::{Deserialize, Serialize};

use crate::forecast::ForecastMetrics;

pub mod artifact;
pub mod encoding;
pub mod forest;
pub mod models;
pub mod sequence;
pub mod training;

pub use artifact::*;
pub use encoding::*;
pub use forest::*;
pub use models::*;
pub use sequence::*;
pub use training::*;

/// ML Model Type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ModelType {
    LinearAutoregressive,
    RandomForest,
}

/// ML Model Metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub model_id: String,
    pub model_type: ModelType,
    pub trained_at: chrono::DateTime<chrono::Utc>,
    pub training_samples: usize,
    pub seed: u64,
    pub validation_metrics: Option<ValidationMetrics>,
    pub feature_names: Vec<String>,
}

impl ModelMetadata {
    pub fn new(model_type: ModelType, training_samples: usize, seed: u64) -> Self {
        Self {
            model_id: format!("{}_{}", model_type, uuid::Uuid::new_v4()),
            model_type,
            trained_at: chrono::Utc::now(),
            training_samples,
            seed,
            validation_metrics: None,
            feature_names: Vec::new(),
        }
    }

    pub fn with_feature_names(mut self, feature_names: Vec<String>) -> Self {
        self.feature_names = feature_names;
        self
    }

    pub fn with_metrics(mut self, metrics: ValidationMetrics) -> Self {
        self.validation_metrics = Some(metrics);
        self
    }
}

/// Validation Metrics, in original (ppm) units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationMetrics {
    pub mae: f64,  // Mean Absolute Error
    pub rmse: f64, // Root Mean Square Error
    pub mape: f64, // Mean Absolute Percentage Error
    pub r2: f64,   // R-squared
    pub samples: usize,
}

impl From<&ForecastMetrics> for ValidationMetrics {
    fn from(m: &ForecastMetrics) -> Self {
        Self {
            mae: m.mae,
            rmse: m.rmse,
            mape: m.mape,
            r2: m.r2,
            samples: m.sample_count,
        }
    }
}
