//! Regulation-limit monitoring over regressor predictions

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::MergedRecord;
use crate::ml::{CategoryEncoding, TabularModel};

/// Monthly NOx limit (ppm) predictions are checked against
pub const DEFAULT_NOX_LIMIT: f64 = 50.0;

/// A merged row whose predicted NOx is above the limit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub station: String,
    pub unit: String,
    pub month: String,
    pub nox_ppm: f64,
    pub nox_daily_mean: f64,
    pub sox_daily_mean: f64,
    pub dust: f64,
    pub oxygen: f64,
    pub flow: f64,
    pub temperature: f64,
    pub predicted_nox_ppm: f64,
}

impl AlertRecord {
    fn new(record: &MergedRecord, predicted_nox_ppm: f64) -> Self {
        Self {
            station: record.station.clone(),
            unit: record.unit.clone(),
            month: record.month.clone(),
            nox_ppm: record.nox_ppm,
            nox_daily_mean: record.nox_daily_mean,
            sox_daily_mean: record.sox_daily_mean,
            dust: record.dust,
            oxygen: record.oxygen,
            flow: record.flow,
            temperature: record.temperature,
            predicted_nox_ppm,
        }
    }
}

/// Predict every record and keep those strictly above `limit`
pub fn detect_exceedances<M: TabularModel + ?Sized>(
    model: &M,
    encoding: &CategoryEncoding,
    records: &[MergedRecord],
    limit: f64,
) -> Result<Vec<AlertRecord>> {
    let unknown = encoding.unknown_categories(records).len();
    if unknown > 0 {
        warn!(rows = unknown, "rows with station/unit labels unseen at training time");
    }

    let rows = encoding.encode_all(records);
    let predictions = model.predict_rows(&rows)?;

    let alerts: Vec<AlertRecord> = records
        .iter()
        .zip(predictions)
        .filter(|(_, predicted)| *predicted > limit)
        .map(|(record, predicted)| AlertRecord::new(record, predicted))
        .collect();

    info!(checked = records.len(), alerts = alerts.len(), limit, "limit check done");
    Ok(alerts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::LinearModel;

    fn record(unit: &str, flow: f64) -> MergedRecord {
        MergedRecord {
            station: "영흥".to_string(),
            unit: unit.to_string(),
            month: "202305".to_string(),
            nox_ppm: 45.0,
            nox_daily_mean: 0.0,
            sox_daily_mean: 0.0,
            dust: 0.0,
            oxygen: 0.0,
            flow,
            temperature: 0.0,
        }
    }

    #[test]
    fn test_flags_strictly_above_limit() {
        let records = vec![record("1호기", 40.0), record("2호기", 50.0), record("3호기", 60.0)];
        let encoding = CategoryEncoding::fit(&records);
        // prediction = flow
        let mut coefficients = vec![0.0; encoding.width()];
        coefficients[4] = 1.0;
        let model = LinearModel::new(coefficients, 0.0);

        let alerts = detect_exceedances(&model, &encoding, &records, DEFAULT_NOX_LIMIT).unwrap();

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].unit, "3호기");
        assert_eq!(alerts[0].predicted_nox_ppm, 60.0);
        assert_eq!(alerts[0].nox_ppm, 45.0);
    }

    #[test]
    fn test_no_alerts_when_all_below() {
        let records = vec![record("1호기", 10.0)];
        let encoding = CategoryEncoding::fit(&records);
        let model = LinearModel::zeros(encoding.width());

        assert!(detect_exceedances(&model, &encoding, &records, 50.0).unwrap().is_empty());
    }

    #[test]
    fn test_model_width_mismatch_is_error() {
        let records = vec![record("1호기", 10.0)];
        let encoding = CategoryEncoding::fit(&records);
        let model = LinearModel::zeros(3);

        assert!(detect_exceedances(&model, &encoding, &records, 50.0).is_err());
    }
}
