//! Dispensing record layout: the fixed column set, the raw snapshot rows as
//! loaded, and the typed rows produced by cleaning.

use std::{borrow::Cow, fmt, path::Path, str::FromStr};

use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use encoding_rs::Encoding;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::io_utils;

/// Replacement for geography code/name pairs that are absent in the source.
pub const SENTINEL: &str = "Unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Column {
    IcbCode,
    IcbName,
    HwbCode,
    HwbName,
    LpcCode,
    LpcName,
    AccountType,
    ContractorCode,
    ContractorName,
    Address1,
    Address2,
    Address3,
    Address4,
    Postcode,
    ContentGroup,
    Content,
    YearMonth,
    Value,
}

impl Column {
    pub const COUNT: usize = 18;

    pub const ALL: [Column; Column::COUNT] = [
        Column::IcbCode,
        Column::IcbName,
        Column::HwbCode,
        Column::HwbName,
        Column::LpcCode,
        Column::LpcName,
        Column::AccountType,
        Column::ContractorCode,
        Column::ContractorName,
        Column::Address1,
        Column::Address2,
        Column::Address3,
        Column::Address4,
        Column::Postcode,
        Column::ContentGroup,
        Column::Content,
        Column::YearMonth,
        Column::Value,
    ];

    /// Columns that identify a category and take part in distinct-count audits.
    pub const CATEGORICAL: [Column; 12] = [
        Column::IcbCode,
        Column::IcbName,
        Column::HwbCode,
        Column::HwbName,
        Column::LpcCode,
        Column::LpcName,
        Column::AccountType,
        Column::ContractorCode,
        Column::ContractorName,
        Column::Postcode,
        Column::ContentGroup,
        Column::Content,
    ];

    pub fn header(self) -> &'static str {
        match self {
            Column::IcbCode => "ICB_CODE",
            Column::IcbName => "ICB_NAME",
            Column::HwbCode => "HWB_CODE",
            Column::HwbName => "HWB_NAME",
            Column::LpcCode => "LPC_CODE",
            Column::LpcName => "LPC_NAME",
            Column::AccountType => "ACCOUNT_TYPE",
            Column::ContractorCode => "CONTRACTOR_CODE",
            Column::ContractorName => "CONTRACTOR_NAME",
            Column::Address1 => "ADDRESS_1",
            Column::Address2 => "ADDRESS_2",
            Column::Address3 => "ADDRESS_3",
            Column::Address4 => "ADDRESS_4",
            Column::Postcode => "POSTCODE",
            Column::ContentGroup => "CONTENT_GROUP",
            Column::Content => "CONTENT",
            Column::YearMonth => "YEAR_MONTH",
            Column::Value => "VALUE",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn is_categorical(self) -> bool {
        Column::CATEGORICAL.contains(&self)
    }

    /// Matches a header or user-supplied column name, ignoring case and
    /// surrounding whitespace.
    pub fn from_header(name: &str) -> Option<Column> {
        let trimmed = name.trim().trim_start_matches('\u{feff}');
        Column::ALL
            .into_iter()
            .find(|column| column.header().eq_ignore_ascii_case(trimmed))
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header())
    }
}

impl FromStr for Column {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Column::from_header(s).ok_or_else(|| {
            anyhow!(
                "Unknown column '{s}'. Expected one of: {}",
                Column::ALL.map(Column::header).join(", ")
            )
        })
    }
}

pub fn headers() -> Vec<String> {
    Column::ALL.iter().map(|c| c.header().to_string()).collect()
}

/// One source row exactly as read, fields ordered by [`Column::ALL`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    line: usize,
    fields: Vec<String>,
}

impl RawRecord {
    pub fn new(line: usize, fields: Vec<String>) -> Result<Self> {
        if fields.len() != Column::COUNT {
            return Err(anyhow!(
                "Row on line {line} has {} field(s); expected {}",
                fields.len(),
                Column::COUNT
            ));
        }
        Ok(Self { line, fields })
    }

    pub fn line(&self) -> usize {
        self.line
    }

    pub fn get(&self, column: Column) -> &str {
        &self.fields[column.index()]
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }
}

/// Immutable snapshot of the source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTable {
    records: Vec<RawRecord>,
}

impl RawTable {
    pub fn new(records: Vec<RawRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[RawRecord] {
        &self.records
    }

    /// SHA-256 over every field of every row, hex encoded.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for record in &self.records {
            for field in &record.fields {
                hasher.update(field.as_bytes());
                hasher.update([0x1f]);
            }
            hasher.update([0x1e]);
        }
        hasher
            .finalize()
            .iter()
            .map(|byte| format!("{byte:02x}"))
            .collect()
    }

    pub fn write_csv(&self, path: &Path, delimiter: u8, encoding: &'static Encoding) -> Result<()> {
        let mut writer = io_utils::open_csv_writer(Some(path), delimiter, encoding)?;
        writer
            .write_record(headers())
            .with_context(|| format!("Writing header to {path:?}"))?;
        for record in &self.records {
            writer
                .write_record(&record.fields)
                .with_context(|| format!("Writing line {} to {path:?}", record.line))?;
        }
        writer.flush().with_context(|| format!("Flushing {path:?}"))?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanRecord {
    pub line: usize,
    pub icb_code: String,
    pub icb_name: String,
    pub hwb_code: String,
    pub hwb_name: String,
    pub lpc_code: String,
    pub lpc_name: String,
    pub account_type: String,
    pub contractor_code: String,
    pub contractor_name: String,
    pub address: [String; 4],
    pub postcode: String,
    pub content_group: String,
    pub content: String,
    pub period: NaiveDate,
    pub quantity: u64,
}

impl CleanRecord {
    /// Text form of a column, used for grouping and predicates. The period
    /// renders as `YYYY-MM`.
    pub fn text(&self, column: Column) -> Cow<'_, str> {
        let borrowed = match column {
            Column::IcbCode => &self.icb_code,
            Column::IcbName => &self.icb_name,
            Column::HwbCode => &self.hwb_code,
            Column::HwbName => &self.hwb_name,
            Column::LpcCode => &self.lpc_code,
            Column::LpcName => &self.lpc_name,
            Column::AccountType => &self.account_type,
            Column::ContractorCode => &self.contractor_code,
            Column::ContractorName => &self.contractor_name,
            Column::Address1 => &self.address[0],
            Column::Address2 => &self.address[1],
            Column::Address3 => &self.address[2],
            Column::Address4 => &self.address[3],
            Column::Postcode => &self.postcode,
            Column::ContentGroup => &self.content_group,
            Column::Content => &self.content,
            Column::YearMonth => return Cow::Owned(self.period.format("%Y-%m").to_string()),
            Column::Value => return Cow::Owned(self.quantity.to_string()),
        };
        Cow::Borrowed(borrowed.as_str())
    }

    fn to_row(&self) -> Vec<String> {
        Column::ALL
            .iter()
            .map(|&column| match column {
                Column::YearMonth => self.period.format("%Y-%m-%d").to_string(),
                other => self.text(other).into_owned(),
            })
            .collect()
    }
}

/// Typed table produced by the cleaning stage; read-only for every query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanTable {
    records: Vec<CleanRecord>,
}

impl CleanTable {
    pub fn new(records: Vec<CleanRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[CleanRecord] {
        &self.records
    }

    /// The single reporting month, if the table has any rows.
    pub fn period(&self) -> Option<NaiveDate> {
        self.records.first().map(|r| r.period)
    }

    pub fn write_csv(&self, path: &Path, delimiter: u8, encoding: &'static Encoding) -> Result<()> {
        let mut writer = io_utils::open_csv_writer(Some(path), delimiter, encoding)?;
        writer
            .write_record(headers())
            .with_context(|| format!("Writing header to {path:?}"))?;
        for record in &self.records {
            writer
                .write_record(record.to_row())
                .with_context(|| format!("Writing line {} to {path:?}", record.line))?;
        }
        writer.flush().with_context(|| format!("Flushing {path:?}"))?;
        Ok(())
    }
}
