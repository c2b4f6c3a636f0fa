//! What-if simulation: scale one input of a single sample and watch the prediction

use anyhow::Result;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::ml::TabularModel;

/// Percentage steps applied to the target feature, both ends inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariationRange {
    pub start: i32,
    pub end: i32,
    pub step: i32,
}

impl Default for VariationRange {
    fn default() -> Self {
        Self {
            start: -20,
            end: 20,
            step: 5,
        }
    }
}

impl VariationRange {
    pub fn percents(&self) -> Result<Vec<i32>> {
        anyhow::ensure!(self.step > 0, "variation step must be positive, got {}", self.step);
        anyhow::ensure!(
            self.start <= self.end,
            "variation start {} is after end {}",
            self.start,
            self.end
        );
        Ok((self.start..=self.end).step_by(self.step as usize).collect())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhatIfPoint {
    pub delta_percent: i32,
    pub feature_value: f64,
    pub predicted_nox_ppm: f64,
    pub exceeds_limit: bool,
}

/// Resolve a feature name to its column, listing the valid names on failure
pub fn feature_index(feature_names: &[String], feature: &str) -> Result<usize> {
    feature_names
        .iter()
        .position(|n| n == feature)
        .ok_or_else(|| {
            anyhow::anyhow!(
                "unknown feature '{}'; valid features: {}",
                feature,
                feature_names.join(", ")
            )
        })
}

/// Choose the sample to perturb
pub fn pick_sample<R: Rng + ?Sized>(len: usize, rng: &mut R) -> Option<usize> {
    (len > 0).then(|| rng.gen_range(0..len))
}

pub fn simulate_variation<M: TabularModel + ?Sized>(
    model: &M,
    base_row: &[f64],
    feature: usize,
    range: &VariationRange,
    limit: f64,
) -> Result<Vec<WhatIfPoint>> {
    let base_value = *base_row.get(feature).ok_or_else(|| {
        anyhow::anyhow!("feature index {} out of range for {} columns", feature, base_row.len())
    })?;

    let percents = range.percents()?;
    let rows: Vec<Vec<f64>> = percents
        .iter()
        .map(|delta| {
            let mut row = base_row.to_vec();
            row[feature] = base_value * (1.0 + f64::from(*delta) / 100.0);
            row
        })
        .collect();
    let predictions = model.predict_rows(&rows)?;

    let points: Vec<WhatIfPoint> = percents
        .into_iter()
        .zip(rows)
        .zip(predictions)
        .map(|((delta_percent, row), predicted)| WhatIfPoint {
            delta_percent,
            feature_value: row[feature],
            predicted_nox_ppm: predicted,
            exceeds_limit: predicted > limit,
        })
        .collect();

    info!(
        steps = points.len(),
        exceeding = points.iter().filter(|p| p.exceeds_limit).count(),
        "what-if simulation done"
    );
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::LinearModel;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_default_range_has_nine_steps() {
        let percents = VariationRange::default().percents().unwrap();
        assert_eq!(percents, vec![-20, -15, -10, -5, 0, 5, 10, 15, 20]);
    }

    #[test]
    fn test_invalid_ranges() {
        let zero_step = VariationRange { step: 0, ..Default::default() };
        let reversed = VariationRange { start: 10, end: -10, step: 5 };
        assert!(zero_step.percents().is_err());
        assert!(reversed.percents().is_err());
    }

    #[test]
    fn test_scales_only_target_feature() {
        // prediction = flow (index 1)
        let model = LinearModel::new(vec![0.0, 1.0], 0.0);
        let points =
            simulate_variation(&model, &[3.0, 50.0], 1, &VariationRange::default(), 50.0).unwrap();

        assert_eq!(points.len(), 9);
        assert_relative_eq!(points[0].predicted_nox_ppm, 40.0, epsilon = 1e-9);
        assert_relative_eq!(points[8].predicted_nox_ppm, 60.0, epsilon = 1e-9);
        assert!(!points[4].exceeds_limit);
        assert!(points[5].exceeds_limit);
    }

    #[test]
    fn test_unknown_feature_lists_valid_names() {
        let names = vec!["flow".to_string(), "oxygen".to_string()];
        let err = feature_index(&names, "pressure").unwrap_err().to_string();
        assert!(err.contains("pressure"));
        assert!(err.contains("flow, oxygen"));
        assert_eq!(feature_index(&names, "oxygen").unwrap(), 1);
    }

    #[test]
    fn test_pick_sample_is_seeded() {
        let a = pick_sample(100, &mut StdRng::seed_from_u64(42));
        let b = pick_sample(100, &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
        assert!(a.unwrap() < 100);
        assert_eq!(pick_sample(0, &mut StdRng::seed_from_u64(42)), None);
    }
}
