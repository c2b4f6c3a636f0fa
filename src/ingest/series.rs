use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

use super::DatasetError;
use crate::domain::{DailyEmission, DateRange};

/// Plant-wide daily NOx, one value per calendar day with no gaps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySeries {
    dates: Vec<NaiveDate>,
    values: Vec<f64>,
}

impl DailySeries {
    /// Build from explicit points, enforcing a strictly increasing, contiguous index
    pub fn new(points: Vec<(NaiveDate, f64)>) -> Result<Self, DatasetError> {
        for pair in points.windows(2) {
            let (previous, next) = (pair[0].0, pair[1].0);
            if next <= previous {
                return Err(DatasetError::NotIncreasing(next));
            }
            if next - previous != Duration::days(1) {
                return Err(DatasetError::Gap { previous, next });
            }
        }

        let (dates, values) = points.into_iter().unzip();
        Ok(Self { dates, values })
    }

    /// Mean NOx per day across every station and unit inside `range`
    pub fn from_daily_records(
        records: &[DailyEmission],
        range: &DateRange,
    ) -> Result<Self, DatasetError> {
        let mut per_day: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
        for record in records.iter().filter(|r| range.contains(r.date)) {
            let entry = per_day.entry(record.date).or_insert((0.0, 0));
            entry.0 += record.nox;
            entry.1 += 1;
        }

        if per_day.is_empty() {
            return Err(DatasetError::NoRecords(range.to_string()));
        }

        let points = per_day
            .into_iter()
            .map(|(date, (sum, count))| (date, sum / count as f64))
            .collect();
        let series = Self::new(points)?;

        info!(
            days = series.len(),
            first = %series.dates[0],
            last = %series.dates[series.len() - 1],
            "daily NOx series built"
        );
        Ok(series)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    /// The `horizon` calendar days following the last observation
    pub fn next_dates(&self, horizon: usize) -> Vec<NaiveDate> {
        self.last_date()
            .map(|last| dates_after(last, horizon))
            .unwrap_or_default()
    }
}

pub fn dates_after(last: NaiveDate, horizon: usize) -> Vec<NaiveDate> {
    (1..=horizon as i64)
        .map(|offset| last + Duration::days(offset))
        .collect()
}
