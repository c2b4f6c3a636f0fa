//! Versioned model bundles
//!
//! A train stage writes one JSON bundle holding everything its predict-side
//! stages need. Loading checks `format_version` before parsing the rest, so an
//! incompatible bundle fails with a clear error instead of a field mismatch.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use super::encoding::CategoryEncoding;
use super::forest::{CvResult, ForestParams, RandomForestModel};
use super::sequence::LinearSequenceModel;
use super::ModelMetadata;
use crate::forecast::Log1pMinMaxScaler;

pub const SEQUENCE_BUNDLE_VERSION: u32 = 1;
pub const REGRESSOR_BUNDLE_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ArtifactError {
    #[error("{kind} bundle has format version {found}, this build reads version {supported}")]
    UnsupportedVersion {
        kind: &'static str,
        found: u32,
        supported: u32,
    },

    #[error("Model expects {expected} features but the stored encoding produces {found}")]
    ModelMismatch { expected: usize, found: usize },

    #[error("Stored window has {found} values, model window length is {expected}")]
    WindowMismatch { expected: usize, found: usize },
}

/// Implemented by every bundle type so loading can check its version
pub trait Bundle: Serialize + DeserializeOwned {
    const KIND: &'static str;
    const VERSION: u32;

    /// Consistency checks run after a successful parse
    fn validate(&self) -> Result<(), ArtifactError> {
        Ok(())
    }

    fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
        }
        let json = serde_json::to_string(self)?;
        std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
        info!(kind = Self::KIND, path = %path.display(), "bundle saved");
        Ok(())
    }

    fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("invalid bundle {}", path.display()))
    }

    fn from_json(text: &str) -> Result<Self> {
        #[derive(Deserialize)]
        struct VersionHeader {
            format_version: u32,
        }

        let header: VersionHeader = serde_json::from_str(text)?;
        if header.format_version != Self::VERSION {
            return Err(ArtifactError::UnsupportedVersion {
                kind: Self::KIND,
                found: header.format_version,
                supported: Self::VERSION,
            }
            .into());
        }

        let bundle: Self = serde_json::from_str(text)?;
        bundle.validate()?;
        Ok(bundle)
    }
}

/// Output of sequence training, input of forecasting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceBundle {
    pub format_version: u32,
    pub model: LinearSequenceModel,
    pub scaler: Log1pMinMaxScaler,
    pub window_len: usize,
    /// Last `window_len` scaled values of the training series
    pub last_window: Vec<f64>,
    pub last_date: NaiveDate,
    pub metadata: ModelMetadata,
}

impl SequenceBundle {
    pub fn new(
        model: LinearSequenceModel,
        scaler: Log1pMinMaxScaler,
        last_window: Vec<f64>,
        last_date: NaiveDate,
        metadata: ModelMetadata,
    ) -> Result<Self, ArtifactError> {
        let bundle = Self {
            format_version: SEQUENCE_BUNDLE_VERSION,
            window_len: model.window_len,
            model,
            scaler,
            last_window,
            last_date,
            metadata,
        };
        bundle.validate()?;
        Ok(bundle)
    }
}

impl Bundle for SequenceBundle {
    const KIND: &'static str = "sequence";
    const VERSION: u32 = SEQUENCE_BUNDLE_VERSION;

    fn validate(&self) -> Result<(), ArtifactError> {
        if self.model.window_len != self.window_len {
            return Err(ArtifactError::WindowMismatch {
                expected: self.window_len,
                found: self.model.window_len,
            });
        }
        if self.last_window.len() != self.window_len {
            return Err(ArtifactError::WindowMismatch {
                expected: self.window_len,
                found: self.last_window.len(),
            });
        }
        Ok(())
    }
}

/// Output of regressor training, input of alert/explain/simulate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressorBundle {
    pub format_version: u32,
    /// bincode-encoded smartcore forest
    pub model_bytes: Vec<u8>,
    pub n_features: usize,
    pub params: ForestParams,
    pub forest_seed: u64,
    pub encoding: CategoryEncoding,
    pub cv_results: Vec<CvResult>,
    /// Share of test-split predictions above the regulation limit
    pub test_exceedance_rate: f64,
    pub metadata: ModelMetadata,
}

impl RegressorBundle {
    pub fn new(
        model: &RandomForestModel,
        encoding: CategoryEncoding,
        cv_results: Vec<CvResult>,
        test_exceedance_rate: f64,
        metadata: ModelMetadata,
    ) -> Result<Self> {
        use super::models::TabularModel;

        let bundle = Self {
            format_version: REGRESSOR_BUNDLE_VERSION,
            model_bytes: model.to_bytes()?,
            n_features: model.n_features(),
            params: model.params(),
            forest_seed: model.seed(),
            encoding,
            cv_results,
            test_exceedance_rate,
            metadata,
        };
        bundle.validate()?;
        Ok(bundle)
    }

    pub fn model(&self) -> Result<RandomForestModel> {
        RandomForestModel::from_bytes(&self.model_bytes, self.params, self.forest_seed, self.n_features)
    }

    pub fn feature_names(&self) -> Vec<String> {
        self.encoding.feature_names()
    }
}

impl Bundle for RegressorBundle {
    const KIND: &'static str = "regressor";
    const VERSION: u32 = REGRESSOR_BUNDLE_VERSION;

    fn validate(&self) -> Result<(), ArtifactError> {
        if self.encoding.width() != self.n_features {
            return Err(ArtifactError::ModelMismatch {
                expected: self.n_features,
                found: self.encoding.width(),
            });
        }
        Ok(())
    }
}
