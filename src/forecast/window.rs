//! Sequence windowing
//!
//! Turns a scalar series into supervised `(window -> next value)` pairs.
//! Pairs keep the order of their start offset; nothing here shuffles, so a
//! prefix/suffix split never leaks future values into the training half.

use serde::{Deserialize, Serialize};

/// Window length used by the daily NOx model (two weeks of history)
pub const DEFAULT_WINDOW_LEN: usize = 14;

/// One supervised sample: `window` is followed immediately by `target` in the series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingPair {
    pub window: Vec<f64>,
    pub target: f64,
}

/// Build every training pair `(S[i..i+L], S[i+L])` for `0 <= i <= N-L-1`.
///
/// A series no longer than the window yields no pairs. That is not an error
/// here; callers that need training data decide what an empty result means.
pub fn make_windows(series: &[f64], window_len: usize) -> Vec<TrainingPair> {
    if window_len == 0 || series.len() <= window_len {
        return Vec::new();
    }

    series
        .windows(window_len + 1)
        .map(|w| TrainingPair {
            window: w[..window_len].to_vec(),
            target: w[window_len],
        })
        .collect()
}

/// Ordered collection of training pairs sharing one window length
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowedDataset {
    pub window_len: usize,
    pub pairs: Vec<TrainingPair>,
}

impl WindowedDataset {
    pub fn from_series(series: &[f64], window_len: usize) -> Self {
        Self {
            window_len,
            pairs: make_windows(series, window_len),
        }
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Split into a training prefix and a test suffix.
    ///
    /// `train_size = floor(len * train_ratio)`; ratios outside `[0, 1]` are clamped.
    pub fn split(&self, train_ratio: f64) -> (WindowedDataset, WindowedDataset) {
        let ratio = train_ratio.clamp(0.0, 1.0);
        let train_size = (self.len() as f64 * ratio).floor() as usize;
        let (train, test) = self.pairs.split_at(train_size);

        (
            WindowedDataset {
                window_len: self.window_len,
                pairs: train.to_vec(),
            },
            WindowedDataset {
                window_len: self.window_len,
                pairs: test.to_vec(),
            },
        )
    }

    pub fn inputs(&self) -> Vec<&[f64]> {
        self.pairs.iter().map(|p| p.window.as_slice()).collect()
    }

    pub fn targets(&self) -> Vec<f64> {
        self.pairs.iter().map(|p| p.target).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn one_to(n: usize) -> Vec<f64> {
        (1..=n).map(|v| v as f64).collect()
    }

    #[test]
    fn test_twenty_points_window_fourteen() {
        let pairs = make_windows(&one_to(20), 14);

        assert_eq!(pairs.len(), 6);
        assert_eq!(pairs[0].window, one_to(14));
        assert_eq!(pairs[0].target, 15.0);

        let last = pairs.last().unwrap();
        assert_eq!(last.window, (6..=19).map(|v| v as f64).collect::<Vec<_>>());
        assert_eq!(last.target, 20.0);
    }

    #[rstest]
    #[case(0, 14)]
    #[case(5, 14)]
    #[case(14, 14)]
    #[case(3, 3)]
    fn test_short_series_yields_nothing(#[case] n: usize, #[case] window_len: usize) {
        assert!(make_windows(&one_to(n), window_len).is_empty());
    }

    #[test]
    fn test_one_extra_point_yields_one_pair() {
        let pairs = make_windows(&one_to(15), 14);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].target, 15.0);
    }

    #[test]
    fn test_zero_window_len_is_empty() {
        assert!(make_windows(&one_to(10), 0).is_empty());
    }

    #[test]
    fn test_split_is_prefix_suffix() {
        let dataset = WindowedDataset::from_series(&one_to(24), 4);
        assert_eq!(dataset.len(), 20);

        let (train, test) = dataset.split(0.8);
        assert_eq!(train.len(), 16);
        assert_eq!(test.len(), 4);

        // Every training target precedes every test target
        let last_train = train.targets().last().copied().unwrap();
        let first_test = test.targets()[0];
        assert!(last_train < first_test);
        assert_eq!(first_test, 21.0);
    }

    #[test]
    fn test_split_floors_train_size() {
        let dataset = WindowedDataset::from_series(&one_to(20), 14);
        let (train, test) = dataset.split(0.8);
        // floor(6 * 0.8) = 4
        assert_eq!(train.len(), 4);
        assert_eq!(test.len(), 2);
    }

    #[test]
    fn test_inputs_and_targets_line_up() {
        let dataset = WindowedDataset::from_series(&one_to(6), 2);
        let inputs = dataset.inputs();
        let targets = dataset.targets();
        assert_eq!(inputs.len(), targets.len());
        assert_eq!(inputs[1], &[2.0, 3.0][..]);
        assert_eq!(targets[1], 4.0);
    }
}
