//! Loading and merging the plant's CSV exports
//!
//! Reading and writing go through `csv` + serde on the record types in
//! `crate::domain`; the merge and the daily series build on top.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;
use tracing::debug;

use crate::domain::{DailyEmission, MergedRecord, MonthlyEmission};

pub mod merge;
pub mod series;

pub use merge::*;
pub use series::*;

/// Dataset shape problems found while building a daily series
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DatasetError {
    #[error("No daily records inside {0}")]
    NoRecords(String),

    #[error("Daily series has a gap: {previous} is followed by {next}")]
    Gap { previous: NaiveDate, next: NaiveDate },

    #[error("Daily series is not strictly increasing at {0}")]
    NotIncreasing(NaiveDate),
}

/// Read every row of a headered CSV file into `T`
pub fn read_csv<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;

    let rows = reader
        .deserialize()
        .enumerate()
        .map(|(i, row)| row.with_context(|| format!("{}: bad row {}", path.display(), i + 2)))
        .collect::<Result<Vec<T>>>()?;

    debug!(path = %path.display(), rows = rows.len(), "csv loaded");
    Ok(rows)
}

/// Write rows to a headered CSV file, creating parent directories
pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    debug!(path = %path.display(), rows = rows.len(), "csv written");
    Ok(())
}

pub fn read_daily_csv(path: &Path) -> Result<Vec<DailyEmission>> {
    read_csv(path).context("reading daily export")
}

pub fn read_monthly_csv(path: &Path) -> Result<Vec<MonthlyEmission>> {
    read_csv(path).context("reading monthly export")
}

pub fn read_merged_csv(path: &Path) -> Result<Vec<MergedRecord>> {
    read_csv(path).context("reading merged dataset")
}

pub fn write_merged_csv(path: &Path, records: &[MergedRecord]) -> Result<()> {
    write_csv(path, records).context("writing merged dataset")
}
