//! Raw transaction loading from CSV.
//!
//! The header must hold exactly `Time`, `V1`..`V28`, `Amount` and `Class`,
//! in any order. Header names are compared untrimmed; only values are trimmed. Every value must parse as a finite number and `Class` must
//! be 0 or 1. Any violation is a data-format error raised before a single
//! pipeline stage runs.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use thiserror::Error;

use fraudlab_core::domain::{Label, Transaction, COMPONENT_COUNT};
use fraudlab_core::fingerprint::DatasetHash;
use fraudlab_core::schema::{self, ColumnIndex};

/// Malformed input content.
#[derive(Debug, Error, PartialEq)]
pub enum DataFormatError {
    #[error("invalid header: {}", .0.join("; "))]
    Schema(Vec<String>),
    #[error("row {row}, column '{column}': '{value}' is not a finite number")]
    NotANumber {
        row: usize,
        column: String,
        value: String,
    },
    #[error("row {row}: class must be 0 or 1, got '{value}'")]
    InvalidClass { row: usize, value: String },
}

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("data format error: {0}")]
    DataFormat(#[from] DataFormatError),
}

/// Loaded records plus their provenance hash.
#[derive(Debug, Clone)]
pub struct LoadedData {
    pub records: Vec<Transaction>,
    /// BLAKE3 over every loaded value, in file order.
    pub dataset_hash: DatasetHash,
}

/// Load and validate a transaction CSV file.
pub fn load_transactions(path: &Path) -> Result<LoadedData, LoadError> {
    let file = File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let records = read_transactions(file)?;
    let dataset_hash = DatasetHash::of_transactions(&records);
    tracing::info!(
        path = %path.display(),
        rows = records.len(),
        dataset_hash = %dataset_hash,
        "loaded transactions"
    );
    Ok(LoadedData {
        records,
        dataset_hash,
    })
}

/// Parse transactions from any CSV reader.
pub fn read_transactions<R: Read>(reader: R) -> Result<Vec<Transaction>, LoadError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::Fields)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let names: Vec<&str> = headers.iter().collect();
    let validation = schema::validate_header(&names);
    let index = match validation.index {
        Some(index) if validation.is_valid => index,
        _ => return Err(DataFormatError::Schema(validation.errors).into()),
    };

    let mut records = Vec::new();
    for (row, result) in rdr.records().enumerate() {
        let record = result?;
        records.push(parse_row(row, &record, &headers, &index)?);
    }
    Ok(records)
}

fn parse_row(
    row: usize,
    record: &csv::StringRecord,
    headers: &csv::StringRecord,
    index: &ColumnIndex,
) -> Result<Transaction, DataFormatError> {
    let number = |col: usize| -> Result<f64, DataFormatError> {
        let raw = record.get(col).unwrap_or("");
        raw.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| DataFormatError::NotANumber {
                row,
                column: headers.get(col).unwrap_or("").to_string(),
                value: raw.to_string(),
            })
    };

    let mut components = [0.0; COMPONENT_COUNT];
    for (slot, &col) in components.iter_mut().zip(&index.components) {
        *slot = number(col)?;
    }
    let class = number(index.class)?;
    let label = Label::from_class(class).ok_or_else(|| DataFormatError::InvalidClass {
        row,
        value: record.get(index.class).unwrap_or("").to_string(),
    })?;

    Ok(Transaction {
        id: row,
        time: number(index.time)?,
        components,
        amount: number(index.amount)?,
        label,
    })
}
