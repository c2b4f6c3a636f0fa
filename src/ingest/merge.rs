use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::domain::{
    expand_unit_label, resolve_station, DailyEmission, DateRange, MergedRecord, MonthlyEmission,
};

/// `(station, unit, month)` after label normalisation
type JoinKey = (String, String, String);

/// Running sums for the per-unit monthly means of the daily measurements
#[derive(Debug, Default, Clone)]
struct DailyAccumulator {
    count: usize,
    nox: f64,
    sox: f64,
    dust: f64,
    oxygen: f64,
    flow: f64,
    temperature: f64,
}

impl DailyAccumulator {
    fn add(&mut self, r: &DailyEmission) {
        self.count += 1;
        self.nox += r.nox;
        self.sox += r.sox;
        self.dust += r.dust;
        self.oxygen += r.oxygen;
        self.flow += r.flow;
        self.temperature += r.temperature;
    }

    fn into_record(self, key: JoinKey, nox_ppm: f64) -> MergedRecord {
        let n = self.count as f64;
        let (station, unit, month) = key;
        MergedRecord {
            station,
            unit,
            month,
            nox_ppm,
            nox_daily_mean: self.nox / n,
            sox_daily_mean: self.sox / n,
            dust: self.dust / n,
            oxygen: self.oxygen / n,
            flow: self.flow / n,
            temperature: self.temperature / n,
        }
    }
}

/// Monthly means of the daily measurements, keyed by normalised station/unit/month
fn aggregate_daily(daily: &[DailyEmission], range: &DateRange) -> BTreeMap<JoinKey, DailyAccumulator> {
    let mut groups: BTreeMap<JoinKey, DailyAccumulator> = BTreeMap::new();

    for record in daily.iter().filter(|r| range.contains(r.date)) {
        let unit = record.unit.trim().to_string();
        let key = (resolve_station(&record.station, &unit), unit, record.month_key());
        groups.entry(key).or_default().add(record);
    }

    groups
}

/// Monthly rows with multi-unit labels exploded to one row per unit
fn explode_monthly(monthly: &[MonthlyEmission], range: &DateRange) -> Vec<(JoinKey, f64)> {
    monthly
        .iter()
        .filter(|m| range.contains_month(m.month.trim()))
        .flat_map(|m| {
            expand_unit_label(&m.unit).into_iter().map(move |unit| {
                let station = resolve_station(&m.station, &unit);
                ((station, unit, m.month.trim().to_string()), m.nox_ppm)
            })
        })
        .collect()
}

/// Inner join of the monthly reports with the aggregated daily exports.
///
/// Rows on either side without a partner are dropped. Output is sorted by
/// station, unit and month.
pub fn merge_exports(
    daily: &[DailyEmission],
    monthly: &[MonthlyEmission],
    range: &DateRange,
) -> Vec<MergedRecord> {
    let groups = aggregate_daily(daily, range);
    let exploded = explode_monthly(monthly, range);
    debug!(
        daily_groups = groups.len(),
        monthly_rows = exploded.len(),
        "merge inputs prepared"
    );

    let mut merged: Vec<MergedRecord> = exploded
        .into_iter()
        .filter_map(|(key, nox_ppm)| {
            groups
                .get(&key)
                .cloned()
                .map(|acc| acc.into_record(key, nox_ppm))
        })
        .collect();

    merged.sort_by(|a, b| {
        (&a.station, &a.unit, &a.month).cmp(&(&b.station, &b.unit, &b.month))
    });

    info!(rows = merged.len(), %range, "monthly and daily exports merged");
    merged
}
