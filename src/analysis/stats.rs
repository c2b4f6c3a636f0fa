//! Descriptive statistics over the daily export
//!
//! Summary of NOx, per-unit group statistics, correlation of each measured
//! column with NOx and a list of days above an outlier threshold.

use anyhow::Result;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::cmp::Ordering;
use tracing::info;

use crate::domain::{DailyEmission, DateRange};

/// Count, moments and quartiles of one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesSummary {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation; NaN for fewer than two values
    pub std: f64,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

impl SeriesSummary {
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        Some(Self {
            count: values.len(),
            mean: Statistics::mean(values),
            std: Statistics::std_dev(values),
            min: Statistics::min(values),
            q1: interpolated_quantile(&sorted, 0.25),
            median: interpolated_quantile(&sorted, 0.5),
            q3: interpolated_quantile(&sorted, 0.75),
            max: Statistics::max(values),
        })
    }
}

/// Quantile of sorted, non-empty `sorted` by linear interpolation between
/// the closest ranks, at position `(n - 1) * p`
fn interpolated_quantile(sorted: &[f64], p: f64) -> f64 {
    let h = (sorted.len() - 1) as f64 * p;
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupStats {
    /// `station_unit`
    pub group: String,
    pub mean: f64,
    pub std: f64,
    pub max: f64,
    pub min: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Correlation {
    pub column: String,
    /// Pearson coefficient with NOx; NaN when either column is constant
    pub pearson: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescriptiveReport {
    pub range: DateRange,
    pub nox: SeriesSummary,
    pub groups: Vec<GroupStats>,
    pub correlations: Vec<Correlation>,
    pub outlier_threshold: f64,
    pub outliers: Vec<DailyEmission>,
}

pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    if x.len() != y.len() || x.len() < 2 {
        return f64::NAN;
    }
    let denom = Statistics::std_dev(x) * Statistics::std_dev(y);
    if denom.abs() < f64::EPSILON {
        return f64::NAN;
    }
    Statistics::covariance(x, y) / denom
}

/// Descending with NaN last
fn desc_nan_last(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.total_cmp(&a),
    }
}

fn group_stats(records: &[&DailyEmission]) -> Vec<GroupStats> {
    let groups = records
        .iter()
        .into_group_map_by(|r| format!("{}_{}", r.station.trim(), r.unit.trim()));

    let mut stats: Vec<GroupStats> = groups
        .into_iter()
        .map(|(group, rows)| {
            let values: Vec<f64> = rows.iter().map(|r| r.nox).collect();
            GroupStats {
                group,
                mean: Statistics::mean(&values),
                std: Statistics::std_dev(&values),
                max: Statistics::max(&values),
                min: Statistics::min(&values),
                count: values.len(),
            }
        })
        .collect();

    stats.sort_by(|a, b| desc_nan_last(a.mean, b.mean).then_with(|| a.group.cmp(&b.group)));
    stats
}

fn correlations(records: &[&DailyEmission]) -> Vec<Correlation> {
    let nox: Vec<f64> = records.iter().map(|r| r.nox).collect();
    let columns: [(&str, fn(&DailyEmission) -> f64); 6] = [
        ("nox", |r| r.nox),
        ("sox", |r| r.sox),
        ("dust", |r| r.dust),
        ("oxygen", |r| r.oxygen),
        ("flow", |r| r.flow),
        ("temperature", |r| r.temperature),
    ];

    let mut out: Vec<Correlation> = columns
        .iter()
        .map(|(name, get)| {
            let values: Vec<f64> = records.iter().map(|r| get(r)).collect();
            Correlation {
                column: name.to_string(),
                pearson: pearson(&values, &nox),
            }
        })
        .collect();

    out.sort_by(|a, b| desc_nan_last(a.pearson, b.pearson));
    out
}

/// Build the report over the rows inside `range`
pub fn describe(
    records: &[DailyEmission],
    range: &DateRange,
    outlier_threshold: f64,
) -> Result<DescriptiveReport> {
    let rows: Vec<&DailyEmission> = records.iter().filter(|r| range.contains(r.date)).collect();
    let nox_values: Vec<f64> = rows.iter().map(|r| r.nox).collect();
    let nox = SeriesSummary::from_values(&nox_values)
        .ok_or_else(|| anyhow::anyhow!("no daily records inside {}", range))?;

    let outliers: Vec<DailyEmission> = rows
        .iter()
        .filter(|r| r.nox > outlier_threshold)
        .map(|r| (*r).clone())
        .collect();

    let report = DescriptiveReport {
        range: *range,
        groups: group_stats(&rows),
        correlations: correlations(&rows),
        nox,
        outlier_threshold,
        outliers,
    };

    info!(
        rows = report.nox.count,
        mean = report.nox.mean,
        groups = report.groups.len(),
        outliers = report.outliers.len(),
        "descriptive analysis done"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn day(d: u32, station: &str, unit: &str, nox: f64, flow: f64) -> DailyEmission {
        DailyEmission {
            date: NaiveDate::from_ymd_opt(2023, 3, d).unwrap(),
            station: station.to_string(),
            unit: unit.to_string(),
            nox,
            sox: 5.0,
            dust: 1.0,
            oxygen: 6.0,
            flow,
            temperature: 120.0,
        }
    }

    fn range() -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_summary_matches_hand_computation() {
        let summary = SeriesSummary::from_values(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert_eq!(summary.count, 8);
        assert_relative_eq!(summary.mean, 5.0);
        assert_relative_eq!(summary.std, (32.0f64 / 7.0).sqrt(), epsilon = 1e-12);
        assert_eq!(summary.min, 2.0);
        assert_eq!(summary.max, 9.0);
        assert!(summary.q1 <= summary.median && summary.median <= summary.q3);
        assert!(SeriesSummary::from_values(&[]).is_none());
    }

    #[test]
    fn test_quartiles_interpolate_between_ranks() {
        let summary = SeriesSummary::from_values(&[4.0, 1.0, 3.0, 2.0]).unwrap();
        assert_relative_eq!(summary.q1, 1.75, epsilon = 1e-12);
        assert_relative_eq!(summary.median, 2.5, epsilon = 1e-12);
        assert_relative_eq!(summary.q3, 3.25, epsilon = 1e-12);

        let single = SeriesSummary::from_values(&[7.0]).unwrap();
        assert_eq!((single.q1, single.median, single.q3), (7.0, 7.0, 7.0));
    }

    #[test]
    fn test_pearson() {
        assert_relative_eq!(pearson(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]), 1.0, epsilon = 1e-12);
        assert_relative_eq!(pearson(&[1.0, 2.0, 3.0], &[3.0, 2.0, 1.0]), -1.0, epsilon = 1e-12);
        assert!(pearson(&[1.0, 1.0, 1.0], &[1.0, 2.0, 3.0]).is_nan());
    }

    #[test]
    fn test_report_groups_correlations_outliers() {
        let records = vec![
            day(1, "영흥", "1호기", 10.0, 100.0),
            day(2, "영흥", "1호기", 20.0, 200.0),
            day(1, "삼천포", "3A호기", 250.0, 2500.0),
            day(2, "삼천포", "3A호기", 150.0, 1500.0),
        ];
        let report = describe(&records, &range(), 200.0).unwrap();

        assert_eq!(report.nox.count, 4);
        assert_eq!(report.groups[0].group, "삼천포_3A호기");
        assert_relative_eq!(report.groups[0].mean, 200.0);
        assert_eq!(report.groups[1].count, 2);

        // flow is exactly proportional to nox
        let flow = report.correlations.iter().find(|c| c.column == "flow").unwrap();
        assert_relative_eq!(flow.pearson, 1.0, epsilon = 1e-12);
        // constant columns sort last
        assert!(report.correlations.last().unwrap().pearson.is_nan());

        assert_eq!(report.outliers.len(), 1);
        assert_eq!(report.outliers[0].nox, 250.0);
    }

    #[test]
    fn test_empty_range_is_error() {
        let records = vec![day(1, "영흥", "1호기", 10.0, 1.0)];
        let later = DateRange::new(
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 2, 1).unwrap(),
        )
        .unwrap();
        assert!(describe(&records, &later, 200.0).is_err());
    }
}
