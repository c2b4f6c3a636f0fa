//! Property tests for windowing, recursive forecasting and the scaler

use approx::relative_eq;
use nox_forecast::forecast::{forecast_recursive, make_windows, Log1pMinMaxScaler, WindowedDataset};
use proptest::prelude::*;
use std::cell::Cell;

fn series_strategy() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(0.0f64..500.0, 0..80)
}

proptest! {
    #[test]
    fn windows_count_and_alignment(series in series_strategy(), window_len in 1usize..20) {
        let pairs = make_windows(&series, window_len);

        let expected = series.len().saturating_sub(window_len);
        prop_assert_eq!(pairs.len(), expected);

        for (i, pair) in pairs.iter().enumerate() {
            prop_assert_eq!(pair.window.len(), window_len);
            prop_assert_eq!(&pair.window[..], &series[i..i + window_len]);
            prop_assert_eq!(pair.target, series[i + window_len]);
        }
    }

    #[test]
    fn windowing_is_deterministic(series in series_strategy(), window_len in 0usize..20) {
        prop_assert_eq!(make_windows(&series, window_len), make_windows(&series, window_len));

        let a = WindowedDataset::from_series(&series, window_len);
        let b = WindowedDataset::from_series(&series, window_len);
        prop_assert_eq!(a, b);
    }

    #[test]
    fn split_partitions_pairs_in_order(series in series_strategy(), ratio in 0.0f64..=1.0) {
        let dataset = WindowedDataset::from_series(&series, 5);
        let (train, test) = dataset.split(ratio);

        prop_assert_eq!(train.len() + test.len(), dataset.len());
        let rejoined: Vec<_> = train.pairs.iter().chain(test.pairs.iter()).cloned().collect();
        prop_assert_eq!(rejoined, dataset.pairs);
    }

    #[test]
    fn forecast_has_horizon_length_and_calls(
        window in prop::collection::vec(-10.0f64..10.0, 1..20),
        horizon in 0usize..40,
    ) {
        let calls = Cell::new(0usize);
        let predictor = |w: &[f64]| -> anyhow::Result<f64> {
            calls.set(calls.get() + 1);
            Ok(w.iter().sum::<f64>() / w.len() as f64)
        };

        let out = forecast_recursive(&predictor, &window, horizon).unwrap();
        prop_assert_eq!(out.len(), horizon);
        prop_assert_eq!(calls.get(), horizon);
    }

    #[test]
    fn forecast_feeds_predictions_back(
        window in prop::collection::vec(-100.0f64..100.0, 1..15),
        horizon in 1usize..30,
    ) {
        // Each prediction echoes the oldest value, so the output replays the
        // window and then the predictions themselves.
        let predictor = |w: &[f64]| -> anyhow::Result<f64> { Ok(w[0]) };
        let out = forecast_recursive(&predictor, &window, horizon).unwrap();

        for (t, value) in out.iter().enumerate() {
            prop_assert_eq!(*value, window[t % window.len()]);
        }
    }

    #[test]
    fn scaler_inverse_recovers_input(values in prop::collection::vec(0.0f64..1e4, 1..60)) {
        let scaler = Log1pMinMaxScaler::fit(&values).unwrap();
        let scaled = scaler.transform(&values).unwrap();

        for s in &scaled {
            prop_assert!((-1e-12..=1.0 + 1e-12).contains(s));
        }
        for (original, restored) in values.iter().zip(scaler.inverse(&scaled)) {
            prop_assert!(relative_eq!(*original, restored, epsilon = 1e-6, max_relative = 1e-9));
        }
    }
}
