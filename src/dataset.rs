//! Raw churn dataset loading and feature derivation.
//!
//! Input is the telecom churn export as a workbook (`.xlsx` and friends), a
//! CSV file or JSON Lines. Every format maps header names onto
//! [`RawChurnRow`]. Preprocessing folds the per-period usage columns into the
//! totals the model consumes and derives the two indicator flags.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use calamine::{Data, RangeDeserializer, RangeDeserializerBuilder, Reader, open_workbook_auto};
use serde::Deserialize;
use thiserror::Error;

use crate::features::FeatureRecord;

/// Customer-service call count above which a customer is flagged.
pub const MANY_CUST_SERV_CALLS_THRESHOLD: i64 = 5;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("Failed to open dataset {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to read dataset {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid record on line {line}: {source}")]
    InvalidLine {
        line: usize,
        source: serde_json::Error,
    },
    #[error("Invalid CSV data in {path}: {source}")]
    Csv { path: PathBuf, source: csv::Error },
    #[error("Failed to read workbook {path}: {source}")]
    Workbook {
        path: PathBuf,
        source: calamine::Error,
    },
    #[error("Workbook {0} has no worksheets")]
    NoWorksheet(PathBuf),
    #[error("Invalid row {row} in {path}: {source}")]
    InvalidSheetRow {
        path: PathBuf,
        row: usize,
        source: calamine::DeError,
    },
    #[error("Unsupported dataset file {0} (expected .xlsx, .xls, .ods, .csv or .jsonl)")]
    UnsupportedFormat(PathBuf),
    #[error("Dataset has no usable rows")]
    Empty,
}

/// On-disk layout of a raw churn export, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetFormat {
    /// First worksheet of a spreadsheet, header in the first row.
    Workbook,
    /// Comma separated with a header line.
    Csv,
    /// One JSON object per line.
    JsonLines,
}

impl DatasetFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Some(DatasetFormat::Workbook),
            "csv" => Some(DatasetFormat::Csv),
            "jsonl" | "ndjson" | "json" => Some(DatasetFormat::JsonLines),
            _ => None,
        }
    }
}

/// One row of the raw export. Missing values stay `None` and drop the row.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawChurnRow {
    #[serde(rename = "Account_Length")]
    pub account_length: Option<f64>,
    #[serde(rename = "Area_Code")]
    pub area_code: Option<f64>,
    #[serde(rename = "Intl_Plan")]
    pub intl_plan: Option<String>,
    #[serde(rename = "Vmail_Plan")]
    pub vmail_plan: Option<String>,
    #[serde(rename = "Vmail_Message")]
    pub vmail_message: Option<f64>,
    #[serde(rename = "Day_Mins")]
    pub day_mins: Option<f64>,
    #[serde(rename = "Eve_Mins")]
    pub eve_mins: Option<f64>,
    #[serde(rename = "Night_Mins")]
    pub night_mins: Option<f64>,
    #[serde(rename = "Intl_Mins")]
    pub intl_mins: Option<f64>,
    #[serde(rename = "Day_Calls")]
    pub day_calls: Option<f64>,
    #[serde(rename = "Eve_Calls")]
    pub eve_calls: Option<f64>,
    #[serde(rename = "Night_Calls")]
    pub night_calls: Option<f64>,
    #[serde(rename = "Intl_Calls")]
    pub intl_calls: Option<f64>,
    #[serde(rename = "Day_Charge")]
    pub day_charge: Option<f64>,
    #[serde(rename = "Eve_Charge")]
    pub eve_charge: Option<f64>,
    #[serde(rename = "Night_Charge")]
    pub night_charge: Option<f64>,
    #[serde(rename = "Intl_Charge")]
    pub intl_charge: Option<f64>,
    #[serde(rename = "CustServ_Calls")]
    pub cust_serv_calls: Option<f64>,
    #[serde(rename = "Churn")]
    pub churn: Option<String>,
}

impl RawChurnRow {
    fn total_charge(&self) -> Option<f64> {
        sum4(
            self.day_charge,
            self.eve_charge,
            self.night_charge,
            self.intl_charge,
        )
    }
}

/// Preprocessed rows ready for training.
#[derive(Debug, Clone)]
pub struct ChurnDataset {
    pub records: Vec<FeatureRecord>,
    /// 1 for churned customers, 0 otherwise; aligned with `records`.
    pub labels: Vec<usize>,
    /// Raw rows dropped for missing or unmappable values.
    pub dropped: usize,
}

impl ChurnDataset {
    /// Row counts per label (`[stayed, churned]`).
    pub fn class_counts(&self) -> [usize; 2] {
        let churned = self.labels.iter().filter(|&&label| label == 1).count();
        [self.labels.len() - churned, churned]
    }

    /// Feature matrix in model input order.
    pub fn matrix(&self) -> Vec<Vec<f64>> {
        self.records
            .iter()
            .map(|record| record.to_vector().to_vec())
            .collect()
    }
}

/// Read raw rows from any supported export, picking the reader by extension.
pub fn load_rows(path: &Path) -> Result<Vec<RawChurnRow>, DatasetError> {
    match DatasetFormat::from_path(path) {
        Some(DatasetFormat::Workbook) => load_workbook(path),
        Some(DatasetFormat::Csv) => load_csv(path),
        Some(DatasetFormat::JsonLines) => load_jsonl(path),
        None => Err(DatasetError::UnsupportedFormat(path.to_path_buf())),
    }
}

/// Read the first worksheet of a spreadsheet. Empty cells become `None`.
pub fn load_workbook(path: &Path) -> Result<Vec<RawChurnRow>, DatasetError> {
    let workbook_error = |source| DatasetError::Workbook {
        path: path.to_path_buf(),
        source,
    };
    let mut workbook = open_workbook_auto(path).map_err(workbook_error)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| DatasetError::NoWorksheet(path.to_path_buf()))?
        .map_err(workbook_error)?;
    let sheet_error = |row, source| DatasetError::InvalidSheetRow {
        path: path.to_path_buf(),
        row,
        source,
    };
    let rows: RangeDeserializer<'_, Data, RawChurnRow> = RangeDeserializerBuilder::new()
        .from_range(&range)
        .map_err(|source| sheet_error(1, source))?;
    // Row numbers are 1-based and the header occupies row 1.
    rows.enumerate()
        .map(|(idx, row)| row.map_err(|source| sheet_error(idx + 2, source)))
        .collect()
}

/// Read a CSV export with a header line. Empty fields become `None`.
pub fn load_csv(path: &Path) -> Result<Vec<RawChurnRow>, DatasetError> {
    let csv_error = |source| DatasetError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(csv_error)?;
    reader
        .deserialize::<RawChurnRow>()
        .map(|row| row.map_err(csv_error))
        .collect()
}

/// Read a JSON Lines export. Blank lines are skipped.
pub fn load_jsonl(path: &Path) -> Result<Vec<RawChurnRow>, DatasetError> {
    let file = File::open(path).map_err(|source| DatasetError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let mut rows = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|source| DatasetError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let row = serde_json::from_str(&line).map_err(|source| DatasetError::InvalidLine {
            line: idx + 1,
            source,
        })?;
        rows.push(row);
    }
    Ok(rows)
}

/// Derive model features and labels from raw rows.
///
/// `High_Usage` compares each row's total charge against the mean over every
/// raw row whose four charge components are present, including rows that are
/// later dropped for other missing values.
pub fn preprocess(rows: &[RawChurnRow]) -> Result<ChurnDataset, DatasetError> {
    let charges: Vec<f64> = rows.iter().filter_map(RawChurnRow::total_charge).collect();
    let cleaned: Vec<(PartialRecord, usize)> = rows
        .iter()
        .filter_map(|row| Some((PartialRecord::from_raw(row)?, churn_label(row.churn.as_deref()?)?)))
        .collect();
    let dropped = rows.len() - cleaned.len();
    if cleaned.is_empty() {
        return Err(DatasetError::Empty);
    }
    if dropped > 0 {
        tracing::warn!(dropped, "Dropped rows with missing or unmappable values");
    }

    let mean_charge = charges.iter().sum::<f64>() / charges.len() as f64;
    let (records, labels) = cleaned
        .into_iter()
        .map(|(row, label)| (row.finish(mean_charge), label))
        .unzip();
    Ok(ChurnDataset {
        records,
        labels,
        dropped,
    })
}

/// Record with every field but `High_Usage` resolved.
struct PartialRecord {
    account_length: i64,
    area_code: i64,
    intl_plan: i64,
    vmail_plan: i64,
    vmail_message: i64,
    cust_serv_calls: i64,
    total_calls: f64,
    total_mins: f64,
    total_charge: f64,
}

impl PartialRecord {
    fn from_raw(row: &RawChurnRow) -> Option<Self> {
        let cust_serv_calls = integral(row.cust_serv_calls?)?;
        Some(Self {
            account_length: integral(row.account_length?)?,
            area_code: integral(row.area_code?)?,
            intl_plan: yes_no(row.intl_plan.as_deref()?)?,
            vmail_plan: yes_no(row.vmail_plan.as_deref()?)?,
            vmail_message: integral(row.vmail_message?)?,
            cust_serv_calls,
            total_calls: sum4(row.day_calls, row.eve_calls, row.night_calls, row.intl_calls)?,
            total_mins: sum4(row.day_mins, row.eve_mins, row.night_mins, row.intl_mins)?,
            total_charge: row.total_charge()?,
        })
    }

    fn finish(self, mean_charge: f64) -> FeatureRecord {
        FeatureRecord {
            account_length: self.account_length,
            area_code: self.area_code,
            intl_plan: self.intl_plan,
            vmail_plan: self.vmail_plan,
            vmail_message: self.vmail_message,
            cust_serv_calls: self.cust_serv_calls,
            total_calls: self.total_calls,
            total_mins: self.total_mins,
            total_charge: self.total_charge,
            high_usage: i64::from(self.total_charge > mean_charge),
            many_cust_serv_calls: i64::from(self.cust_serv_calls > MANY_CUST_SERV_CALLS_THRESHOLD),
        }
    }
}

fn integral(value: f64) -> Option<i64> {
    (value.is_finite() && value.fract() == 0.0).then_some(value as i64)
}

fn sum4(a: Option<f64>, b: Option<f64>, c: Option<f64>, d: Option<f64>) -> Option<f64> {
    let total = a? + b? + c? + d?;
    total.is_finite().then_some(total)
}

fn yes_no(value: &str) -> Option<i64> {
    match value.trim() {
        "yes" => Some(1),
        "no" => Some(0),
        _ => None,
    }
}

fn churn_label(value: &str) -> Option<usize> {
    match value.trim() {
        "True." => Some(1),
        "False." => Some(0),
        _ => None,
    }
}
