//! Iterative multi-step forecasting
//!
//! Produces `H` future values from a one-step point-predictor by feeding each
//! prediction back in as the newest element of the input window. The loop is
//! closed: after the first step the model consumes its own output, so errors
//! compound across the horizon and are never corrected against real data.

use anyhow::Result;
use std::collections::VecDeque;
use tracing::debug;

/// Maps one fixed-length window to the next value of the series
pub trait PointPredictor {
    fn predict_next(&self, window: &[f64]) -> Result<f64>;
}

impl<F> PointPredictor for F
where
    F: Fn(&[f64]) -> Result<f64>,
{
    fn predict_next(&self, window: &[f64]) -> Result<f64> {
        self(window)
    }
}

/// Forecast `horizon` values starting from `initial_window`.
///
/// The window keeps its length throughout: each step drops the oldest value
/// and appends the prediction just made. Output stays in whatever space the
/// predictor works in; inverting any scaling is up to the caller.
///
/// A predictor error aborts the horizon and is returned as-is. Non-finite
/// predictions are not checked and flow into every later step.
pub fn forecast_recursive<P>(
    predictor: &P,
    initial_window: &[f64],
    horizon: usize,
) -> Result<Vec<f64>>
where
    P: PointPredictor + ?Sized,
{
    if horizon == 0 {
        return Ok(Vec::new());
    }
    anyhow::ensure!(
        !initial_window.is_empty(),
        "cannot forecast from an empty initial window"
    );

    let window_len = initial_window.len();
    let mut window: VecDeque<f64> = initial_window.iter().copied().collect();
    let mut predictions = Vec::with_capacity(horizon);

    for step in 0..horizon {
        let value = predictor.predict_next(window.make_contiguous())?;
        predictions.push(value);

        window.pop_front();
        window.push_back(value);
        debug_assert_eq!(window.len(), window_len);

        debug!(step, value, "forecast step");
    }

    Ok(predictions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    fn range(from: usize, to: usize) -> Vec<f64> {
        (from..=to).map(|v| v as f64).collect()
    }

    #[test]
    fn test_last_plus_one_predictor() {
        let predictor = |w: &[f64]| -> Result<f64> { Ok(w[w.len() - 1] + 1.0) };
        let out = forecast_recursive(&predictor, &range(7, 20), 3).unwrap();
        assert_eq!(out, vec![21.0, 22.0, 23.0]);
    }

    #[test]
    fn test_constant_predictor_reaches_fixed_point() {
        let seen = RefCell::new(Vec::new());
        let predictor = |w: &[f64]| -> Result<f64> {
            seen.borrow_mut().push(w.to_vec());
            Ok(4.5)
        };

        let out = forecast_recursive(&predictor, &range(1, 3), 5).unwrap();
        assert_eq!(out, vec![4.5; 5]);

        // Third call sees a window of length 3 made entirely of predictions
        let windows = seen.borrow();
        assert_eq!(windows[0], vec![1.0, 2.0, 3.0]);
        assert_eq!(windows[1], vec![2.0, 3.0, 4.5]);
        assert_eq!(windows[3], vec![4.5, 4.5, 4.5]);
        assert!(windows.iter().all(|w| w.len() == 3));
    }

    #[test]
    fn test_zero_horizon_never_calls_predictor() {
        let calls = Cell::new(0usize);
        let predictor = |_: &[f64]| -> Result<f64> {
            calls.set(calls.get() + 1);
            Ok(0.0)
        };

        let out = forecast_recursive(&predictor, &range(1, 14), 0).unwrap();
        assert!(out.is_empty());
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_nan_on_first_call_propagates() {
        let calls = Cell::new(0usize);
        let predictor = |w: &[f64]| -> Result<f64> {
            let n = calls.get();
            calls.set(n + 1);
            if n == 0 {
                Ok(f64::NAN)
            } else {
                Ok(w.iter().sum::<f64>() / w.len() as f64)
            }
        };

        let out = forecast_recursive(&predictor, &range(1, 14), 6).unwrap();
        assert_eq!(out.len(), 6);
        assert!(out.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_predictor_error_aborts_horizon() {
        let calls = Cell::new(0usize);
        let predictor = |_: &[f64]| -> Result<f64> {
            calls.set(calls.get() + 1);
            if calls.get() == 2 {
                anyhow::bail!("model unavailable")
            }
            Ok(1.0)
        };

        let err = forecast_recursive(&predictor, &range(1, 4), 10).unwrap_err();
        assert_eq!(err.to_string(), "model unavailable");
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_empty_initial_window_is_rejected() {
        let predictor = |_: &[f64]| -> Result<f64> { Ok(1.0) };
        assert!(forecast_recursive(&predictor, &[], 3).is_err());
    }

    #[test]
    fn test_works_through_trait_object() {
        let predictor = |w: &[f64]| -> Result<f64> { Ok(w[0] * 2.0) };
        let boxed: Box<dyn PointPredictor> = Box::new(predictor);
        let out = forecast_recursive(boxed.as_ref(), &[1.0, 2.0], 3).unwrap();
        // [1,2] -> 2, [2,2] -> 4, [2,4] -> 4
        assert_eq!(out, vec![2.0, 4.0, 4.0]);
    }
}
