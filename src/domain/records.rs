use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One day of stack measurements for a single generating unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyEmission {
    /// Measurement day, `YYYYMMDD` on disk
    #[serde(with = "compact_date")]
    pub date: NaiveDate,
    pub station: String,
    pub unit: String,
    /// NOx concentration (ppm)
    pub nox: f64,
    /// SOx concentration (ppm)
    pub sox: f64,
    /// Dust (mg/Sm³)
    pub dust: f64,
    /// Oxygen (%)
    pub oxygen: f64,
    /// Flue gas flow (Sm³/h)
    pub flow: f64,
    /// Flue gas temperature (°C)
    pub temperature: f64,
}

impl DailyEmission {
    pub fn month_key(&self) -> String {
        month_key(self.date)
    }
}

/// Monthly regulatory report row; the unit label may cover several units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyEmission {
    /// `YYYYMM`
    pub month: String,
    pub station: String,
    pub unit: String,
    /// Monthly average NOx (ppm)
    pub nox_ppm: f64,
}

/// Monthly report joined with the daily measurements of the same unit and month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedRecord {
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
}

/// Names of the numeric model inputs, in the order `MergedRecord::numeric_features` returns them
pub const NUMERIC_FEATURES: [&str; 6] = [
    "nox_daily_mean",
    "sox_daily_mean",
    "dust",
    "oxygen",
    "flow",
    "temperature",
];

impl MergedRecord {
    pub fn numeric_features(&self) -> [f64; 6] {
        [
            self.nox_daily_mean,
            self.sox_daily_mean,
            self.dust,
            self.oxygen,
            self.flow,
            self.temperature,
        ]
    }
}

/// Inclusive calendar range the analysis is restricted to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> anyhow::Result<Self> {
        anyhow::ensure!(start <= end, "date range start {start} is after end {end}");
        Ok(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// `YYYYMM` keys compare lexicographically in calendar order
    pub fn contains_month(&self, month: &str) -> bool {
        month_key(self.start).as_str() <= month && month <= month_key(self.end).as_str()
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

pub fn month_key(date: NaiveDate) -> String {
    format!("{:04}{:02}", date.year(), date.month())
}

/// `YYYYMMDD` date encoding used by the plant exports
pub mod compact_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y%m%d";

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&date.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDate::parse_from_str(raw.trim(), FORMAT).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_month_key_is_zero_padded() {
        assert_eq!(month_key(date(2023, 3, 9)), "202303");
        assert_eq!(month_key(date(2024, 12, 31)), "202412");
    }

    #[test]
    fn test_date_range_bounds_are_inclusive() {
        let range = DateRange::new(date(2023, 1, 1), date(2024, 12, 31)).unwrap();
        assert!(range.contains(date(2023, 1, 1)));
        assert!(range.contains(date(2024, 12, 31)));
        assert!(!range.contains(date(2025, 1, 1)));

        assert!(range.contains_month("202301"));
        assert!(range.contains_month("202412"));
        assert!(!range.contains_month("202212"));
        assert!(!range.contains_month("202501"));
    }

    #[test]
    fn test_reversed_range_is_rejected() {
        assert!(DateRange::new(date(2024, 1, 2), date(2024, 1, 1)).is_err());
    }

    #[test]
    fn test_daily_record_csv_roundtrip_uses_compact_date() {
        let data = "date,station,unit,nox,sox,dust,oxygen,flow,temperature\n\
                    20230105,영흥,1호기,41.5,20.1,1.2,6.1,1500000,120.5\n";
        let mut reader = csv::Reader::from_reader(data.as_bytes());
        let record: DailyEmission = reader.deserialize().next().unwrap().unwrap();

        assert_eq!(record.date, date(2023, 1, 5));
        assert_eq!(record.unit, "1호기");
        assert_eq!(record.month_key(), "202301");

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.serialize(&record).unwrap();
        let out = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        assert!(out.contains("20230105"));
    }
}
