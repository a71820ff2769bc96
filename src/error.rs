//! Domain errors raised while loading and cleaning a dispensing snapshot.
//!
//! I/O and CSV failures travel through `anyhow`; the data problems below are
//! kept as a typed enum so callers can downcast and decide what to do with a
//! malformed row.

use std::{fmt, path::PathBuf};

use thiserror::Error;

use crate::record::{Column, RawRecord};

/// Identifying fields of the source row an error refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowContext {
    /// 1-based physical line in the source file (the header is line 1).
    pub line: usize,
    pub contractor_code: String,
    pub contractor_name: String,
    pub content: String,
    pub period: String,
}

impl RowContext {
    pub fn from_record(record: &RawRecord) -> Self {
        Self {
            line: record.line(),
            contractor_code: record.get(Column::ContractorCode).trim().to_string(),
            contractor_name: record.get(Column::ContractorName).trim().to_string(),
            content: record.get(Column::Content).trim().to_string(),
            period: record.get(Column::YearMonth).trim().to_string(),
        }
    }
}

impl fmt::Display for RowContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "line {} (contractor {} '{}', content '{}', period '{}')",
            self.line, self.contractor_code, self.contractor_name, self.content, self.period
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error(
        "header of {path:?} does not match the dispensing layout (missing: [{}], unexpected: [{}])",
        .missing.join(", "),
        .unexpected.join(", ")
    )]
    HeaderMismatch {
        path: PathBuf,
        missing: Vec<String>,
        unexpected: Vec<String>,
    },
    #[error("header of {path:?} repeats column '{column}'")]
    DuplicateHeader { path: PathBuf, column: String },
    #[error("{path:?} contains a header but no data rows")]
    Empty { path: PathBuf },
    #[error("{path:?} loaded {loaded} row(s) but the source has {expected} data line(s)")]
    RowCountMismatch {
        path: PathBuf,
        loaded: usize,
        expected: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("format error at {row}: {column} value '{value}' {reason}")]
    Format {
        row: RowContext,
        column: Column,
        value: String,
        reason: String,
    },
    #[error("inconsistent data{}: {detail}", row_suffix(.row))]
    Inconsistency {
        row: Option<RowContext>,
        detail: String,
    },
    #[error("{count} malformed row(s) exceed the tolerance of {tolerance}; first: {first}")]
    ToleranceExceeded {
        count: usize,
        tolerance: usize,
        first: Box<DataError>,
    },
}

fn row_suffix(row: &Option<RowContext>) -> String {
    row.as_ref().map(|r| format!(" at {r}")).unwrap_or_default()
}

impl DataError {
    /// Source row the error points at, when it concerns a single row.
    pub fn row(&self) -> Option<&RowContext> {
        match self {
            DataError::Format { row, .. } => Some(row),
            DataError::Inconsistency { row, .. } => row.as_ref(),
            DataError::ToleranceExceeded { first, .. } => first.row(),
            DataError::Load(_) => None,
        }
    }

    pub fn is_format(&self) -> bool {
        matches!(self, DataError::Format { .. })
    }

    pub fn is_inconsistency(&self) -> bool {
        matches!(self, DataError::Inconsistency { .. })
    }
}
