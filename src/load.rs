use std::{collections::HashSet, path::Path};

use anyhow::{Context, Result, anyhow};
use encoding_rs::Encoding;
use log::{debug, info};

use crate::{
    cli::LoadArgs,
    config::PipelineConfig,
    error::{DataError, LoadError},
    io_utils,
    record::{Column, RawRecord, RawTable},
};

#[derive(Debug, Clone, Copy)]
pub struct LoadOptions {
    pub delimiter: u8,
    pub encoding: &'static Encoding,
    /// Fail when the parsed row count differs from the source's data lines.
    pub verify_line_count: bool,
}

impl LoadOptions {
    pub fn from_config(path: &Path, config: &PipelineConfig) -> Result<Self> {
        Ok(Self {
            delimiter: io_utils::resolve_input_delimiter(path, config.input.delimiter),
            encoding: io_utils::resolve_encoding(config.input.encoding.as_deref())?,
            verify_line_count: config.input.verify_line_count,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub rows: usize,
    /// Non-blank physical lines in the source, header included.
    pub source_lines: usize,
    pub digest: String,
}

impl LoadReport {
    pub fn expected_rows(&self) -> usize {
        self.source_lines.saturating_sub(1)
    }

    pub fn line_count_matches(&self) -> bool {
        self.rows == self.expected_rows()
    }
}

#[derive(Debug, Clone)]
pub struct LoadedTable {
    pub raw: RawTable,
    pub backup: RawTable,
    pub report: LoadReport,
}

impl LoadedTable {
    /// Confirms the backup still mirrors the raw snapshot.
    pub fn verify_backup(&self) -> std::result::Result<(), DataError> {
        let backup_digest = self.backup.digest();
        if backup_digest == self.report.digest && self.backup.len() == self.raw.len() {
            Ok(())
        } else {
            Err(DataError::Inconsistency {
                row: None,
                detail: format!(
                    "backup digest {backup_digest} differs from raw digest {}",
                    self.report.digest
                ),
            })
        }
    }
}

/// Maps each source field position to its column, validating the header set.
fn header_layout(path: &Path, headers: &[String]) -> Result<Vec<Column>, LoadError> {
    let mut seen = HashSet::new();
    let mut layout = Vec::with_capacity(headers.len());
    let mut unexpected = Vec::new();
    for header in headers {
        match Column::from_header(header) {
            Some(column) => {
                if !seen.insert(column) {
                    return Err(LoadError::DuplicateHeader {
                        path: path.to_path_buf(),
                        column: column.header().to_string(),
                    });
                }
                layout.push(column);
            }
            None => unexpected.push(header.trim().to_string()),
        }
    }
    let missing = Column::ALL
        .iter()
        .filter(|column| !seen.contains(*column))
        .map(|column| column.header().to_string())
        .collect::<Vec<_>>();
    if !missing.is_empty() || !unexpected.is_empty() {
        return Err(LoadError::HeaderMismatch {
            path: path.to_path_buf(),
            missing,
            unexpected,
        });
    }
    Ok(layout)
}

pub fn load_table(path: &Path, options: &LoadOptions) -> Result<LoadedTable> {
    debug!(
        "Reading {path:?} with delimiter '{}' and encoding {}",
        crate::printable_delimiter(options.delimiter),
        options.encoding.name()
    );
    let mut reader = io_utils::open_csv_reader_from_path(path, options.delimiter)?;
    let headers = io_utils::reader_headers(&mut reader, options.encoding)
        .with_context(|| format!("Reading header of {path:?}"))?;
    let layout = header_layout(path, &headers).map_err(DataError::from)?;
    debug!("Header layout for {path:?}: {layout:?}");

    let mut records = Vec::new();
    for (row_idx, record) in reader.byte_records().enumerate() {
        let record = record.with_context(|| format!("Reading row {} of {path:?}", row_idx + 2))?;
        let line = record
            .position()
            .map(|pos| pos.line() as usize)
            .unwrap_or(row_idx + 2);
        let decoded = io_utils::decode_record(&record, options.encoding)
            .with_context(|| format!("Decoding line {line} of {path:?}"))?;
        let mut fields = vec![String::new(); Column::COUNT];
        for (value, column) in decoded.into_iter().zip(&layout) {
            fields[column.index()] = value;
        }
        records.push(RawRecord::new(line, fields)?);
    }
    let source_lines = reader.into_inner().lines();

    if records.is_empty() {
        return Err(DataError::from(LoadError::Empty {
            path: path.to_path_buf(),
        })
        .into());
    }

    let raw = RawTable::new(records);
    let report = LoadReport {
        rows: raw.len(),
        source_lines,
        digest: raw.digest(),
    };
    if options.verify_line_count && !report.line_count_matches() {
        return Err(DataError::from(LoadError::RowCountMismatch {
            path: path.to_path_buf(),
            loaded: report.rows,
            expected: report.expected_rows(),
        })
        .into());
    }

    let loaded = LoadedTable {
        backup: raw.clone(),
        raw,
        report,
    };
    loaded.verify_backup()?;
    info!(
        "Loaded {} row(s) from {:?} ({} source line(s), digest {})",
        loaded.report.rows,
        path,
        loaded.report.source_lines,
        &loaded.report.digest[..12]
    );
    Ok(loaded)
}

pub fn execute(args: &LoadArgs) -> Result<()> {
    let config = PipelineConfig::resolve(&args.input)?;
    let path = &args.input.input;
    let options = LoadOptions::from_config(path, &config)?;
    let loaded = load_table(path, &options).with_context(|| format!("Loading {path:?}"))?;
    if let Some(backup_path) = &args.backup {
        if io_utils::is_dash(backup_path) {
            return Err(anyhow!("--backup requires a file path"));
        }
        loaded
            .backup
            .write_csv(backup_path, options.delimiter, options.encoding)
            .with_context(|| format!("Writing backup snapshot to {backup_path:?}"))?;
        info!("Backup snapshot written to {backup_path:?}");
    }
    println!("rows: {}", loaded.report.rows);
    println!("source_lines: {}", loaded.report.source_lines);
    println!("sha256: {}", loaded.report.digest);
    Ok(())
}
