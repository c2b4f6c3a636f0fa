//! Forward/inverse transform pair applied around the sequence model
//!
//! Forward: `ln(1 + x)` followed by min-max scaling fitted on the log values.
//! Inverse: undo the scaling, then `exp(y) - 1`. The two are exact inverses,
//! which is what makes metrics computed after `inverse` meaningful.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransformError {
    #[error("Cannot fit scaler on empty data")]
    EmptyData,

    #[error("Value at index {index} is negative ({value}); log1p transform needs x >= 0")]
    NegativeValue { index: usize, value: f64 },

    #[error("Value at index {index} is not finite")]
    NonFinite { index: usize },
}

/// Fitted log1p + min-max scaler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Log1pMinMaxScaler {
    pub log_min: f64,
    pub log_max: f64,
}

impl Log1pMinMaxScaler {
    pub fn fit(values: &[f64]) -> Result<Self, TransformError> {
        if values.is_empty() {
            return Err(TransformError::EmptyData);
        }
        check_domain(values)?;

        let (log_min, log_max) = values
            .iter()
            .map(|v| v.ln_1p())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            });

        Ok(Self { log_min, log_max })
    }

    /// Zero range scales by 1, so constant data maps to 0
    fn range(&self) -> f64 {
        let range = self.log_max - self.log_min;
        if range.abs() < 1e-12 {
            1.0
        } else {
            range
        }
    }

    pub fn transform(&self, values: &[f64]) -> Result<Vec<f64>, TransformError> {
        check_domain(values)?;
        let range = self.range();
        Ok(values
            .iter()
            .map(|v| (v.ln_1p() - self.log_min) / range)
            .collect())
    }

    pub fn inverse_one(&self, scaled: f64) -> f64 {
        (scaled * self.range() + self.log_min).exp_m1()
    }

    pub fn inverse(&self, scaled: &[f64]) -> Vec<f64> {
        scaled.iter().map(|&v| self.inverse_one(v)).collect()
    }
}

fn check_domain(values: &[f64]) -> Result<(), TransformError> {
    for (index, &value) in values.iter().enumerate() {
        if !value.is_finite() {
            return Err(TransformError::NonFinite { index });
        }
        if value < 0.0 {
            return Err(TransformError::NegativeValue { index, value });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_scaled_range_is_unit_interval() {
        let values = vec![3.0, 10.0, 25.0, 60.0, 12.5];
        let scaler = Log1pMinMaxScaler::fit(&values).unwrap();
        let scaled = scaler.transform(&values).unwrap();

        assert_relative_eq!(scaled[0], 0.0);
        assert_relative_eq!(scaled[3], 1.0);
        assert!(scaled.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_inverse_recovers_input() {
        let values = vec![0.0, 1.5, 18.0, 44.2, 97.3];
        let scaler = Log1pMinMaxScaler::fit(&values).unwrap();
        let restored = scaler.inverse(&scaler.transform(&values).unwrap());

        for (a, b) in values.iter().zip(restored.iter()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_constant_series_maps_to_zero() {
        let scaler = Log1pMinMaxScaler::fit(&[7.0, 7.0, 7.0]).unwrap();
        let scaled = scaler.transform(&[7.0]).unwrap();
        assert_relative_eq!(scaled[0], 0.0);
        assert_relative_eq!(scaler.inverse_one(0.0), 7.0, epsilon = 1e-9);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert_eq!(Log1pMinMaxScaler::fit(&[]), Err(TransformError::EmptyData));
        assert_eq!(
            Log1pMinMaxScaler::fit(&[1.0, -2.0]),
            Err(TransformError::NegativeValue { index: 1, value: -2.0 })
        );
        assert_eq!(
            Log1pMinMaxScaler::fit(&[f64::NAN]),
            Err(TransformError::NonFinite { index: 0 })
        );
    }

    #[test]
    fn test_values_outside_fit_range_extrapolate() {
        let scaler = Log1pMinMaxScaler::fit(&[1.0, 9.0]).unwrap();
        let scaled = scaler.transform(&[20.0]).unwrap();
        assert!(scaled[0] > 1.0);
        assert_relative_eq!(scaler.inverse_one(scaled[0]), 20.0, epsilon = 1e-9);
    }
}
