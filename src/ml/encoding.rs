//! Feature encoding for the tabular regressor
//!
//! Station and unit labels become indicator columns. The category lists are
//! fixed when the model is trained and stored with it, so every later stage
//! builds rows with exactly the columns, in exactly the order, the model saw.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::domain::{MergedRecord, NUMERIC_FEATURES};

const STATION_PREFIX: &str = "station_";
const UNIT_PREFIX: &str = "unit_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryEncoding {
    pub stations: Vec<String>,
    pub units: Vec<String>,
}

impl CategoryEncoding {
    /// Collect the sorted, de-duplicated station and unit labels
    pub fn fit(records: &[MergedRecord]) -> Self {
        let stations: BTreeSet<&str> = records.iter().map(|r| r.station.as_str()).collect();
        let units: BTreeSet<&str> = records.iter().map(|r| r.unit.as_str()).collect();

        Self {
            stations: stations.into_iter().map(String::from).collect(),
            units: units.into_iter().map(String::from).collect(),
        }
    }

    pub fn width(&self) -> usize {
        NUMERIC_FEATURES.len() + self.stations.len() + self.units.len()
    }

    /// Column names in encoding order: numeric inputs, then stations, then units
    pub fn feature_names(&self) -> Vec<String> {
        NUMERIC_FEATURES
            .iter()
            .map(|name| name.to_string())
            .chain(self.stations.iter().map(|s| format!("{STATION_PREFIX}{s}")))
            .chain(self.units.iter().map(|u| format!("{UNIT_PREFIX}{u}")))
            .collect()
    }

    /// Encode one record. Labels not seen at fit time leave their block all zero.
    pub fn encode(&self, record: &MergedRecord) -> Vec<f64> {
        let mut row = Vec::with_capacity(self.width());
        row.extend_from_slice(&record.numeric_features());
        row.extend(
            self.stations
                .iter()
                .map(|s| if *s == record.station { 1.0 } else { 0.0 }),
        );
        row.extend(
            self.units
                .iter()
                .map(|u| if *u == record.unit { 1.0 } else { 0.0 }),
        );
        row
    }

    pub fn encode_all(&self, records: &[MergedRecord]) -> Vec<Vec<f64>> {
        records.iter().map(|r| self.encode(r)).collect()
    }

    /// Records whose station or unit the encoding has never seen
    pub fn unknown_categories<'a>(&self, records: &'a [MergedRecord]) -> Vec<&'a MergedRecord> {
        records
            .iter()
            .filter(|r| !self.stations.contains(&r.station) || !self.units.contains(&r.unit))
            .collect()
    }
}
