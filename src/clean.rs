//! Cleaning stage: raw snapshot to typed table.
//!
//! Rules run per row in a fixed order: reporting period, quantity, then the
//! HWB and LPC geography pairs. The raw table is never modified. Malformed
//! rows are collected and compared against the policy's tolerance; at the
//! default tolerance of zero the first one halts cleaning.

use std::{collections::BTreeSet, sync::LazyLock};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use log::{info, warn};
use regex::Regex;

use crate::{
    cli::CleanArgs,
    config::{CleaningPolicy, PartialPairPolicy, PipelineConfig},
    error::{DataError, RowContext},
    io_utils,
    load::{self, LoadOptions},
    record::{CleanRecord, CleanTable, Column, RawRecord, RawTable, SENTINEL},
};

static PERIOD_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{2})$").expect("valid period pattern"));
static QUANTITY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+|\d{1,3}(,\d{3})+)$").expect("valid quantity pattern")
});

#[derive(Debug, Clone, Default)]
pub struct CleanOutcome {
    pub table: CleanTable,
    /// Rows in the raw table; exceeds `table.len()` by the rejected rows.
    pub source_rows: usize,
    /// Rows excluded because they were malformed (only with a non-zero tolerance).
    pub rejected: Vec<DataError>,
    /// Partial geography pairs filled with the sentinel under the patch policy.
    pub patched: Vec<DataError>,
}

/// `YYYY-MM` to the first day of that month.
pub fn parse_period(text: &str) -> std::result::Result<NaiveDate, String> {
    let trimmed = text.trim();
    let captures = PERIOD_PATTERN
        .captures(trimmed)
        .ok_or_else(|| "does not match YYYY-MM".to_string())?;
    let year: i32 = captures[1]
        .parse()
        .map_err(|_| "has an unreadable year".to_string())?;
    let month: u32 = captures[2]
        .parse()
        .map_err(|_| "has an unreadable month".to_string())?;
    NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| format!("has invalid month {month:02}"))
}

/// Whole, non-negative quantity; `,` is accepted only as a thousands separator.
pub fn parse_quantity(text: &str) -> std::result::Result<u64, String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err("is empty".to_string());
    }
    if trimmed.starts_with('-') {
        return Err("is negative".to_string());
    }
    if !QUANTITY_PATTERN.is_match(trimmed) {
        return Err("is not a whole number".to_string());
    }
    trimmed
        .replace(',', "")
        .parse::<u64>()
        .map_err(|err| format!("cannot be read as an integer ({err})"))
}

fn is_absent(value: &str) -> bool {
    value.trim().is_empty()
}

enum PairResolution {
    Kept(String, String),
    Filled,
    Partial { detail: String },
}

fn resolve_pair(record: &RawRecord, code_col: Column, name_col: Column) -> PairResolution {
    let code = record.get(code_col);
    let name = record.get(name_col);
    match (is_absent(code), is_absent(name)) {
        (false, false) => PairResolution::Kept(code.trim().to_string(), name.trim().to_string()),
        (true, true) => PairResolution::Filled,
        (false, true) => PairResolution::Partial {
            detail: format!("{code_col} '{}' present but {name_col} absent", code.trim()),
        },
        (true, false) => PairResolution::Partial {
            detail: format!("{name_col} '{}' present but {code_col} absent", name.trim()),
        },
    }
}

struct RowCleaner<'a> {
    policy: &'a CleaningPolicy,
    patched: Vec<DataError>,
}

impl RowCleaner<'_> {
    fn pair(
        &mut self,
        record: &RawRecord,
        code_col: Column,
        name_col: Column,
    ) -> std::result::Result<(String, String), DataError> {
        match resolve_pair(record, code_col, name_col) {
            PairResolution::Kept(code, name) => Ok((code, name)),
            PairResolution::Filled => Ok((SENTINEL.to_string(), SENTINEL.to_string())),
            PairResolution::Partial { detail } => {
                let err = DataError::Inconsistency {
                    row: Some(RowContext::from_record(record)),
                    detail,
                };
                match self.policy.partial_pairs {
                    PartialPairPolicy::Fail => Err(err),
                    PartialPairPolicy::Patch => {
                        warn!("Patched with '{SENTINEL}': {err}");
                        self.patched.push(err);
                        let fill = |value: &str| {
                            if is_absent(value) {
                                SENTINEL.to_string()
                            } else {
                                value.trim().to_string()
                            }
                        };
                        Ok((fill(record.get(code_col)), fill(record.get(name_col))))
                    }
                }
            }
        }
    }

    fn clean(&mut self, record: &RawRecord) -> std::result::Result<CleanRecord, DataError> {
        let format_error = |column: Column, reason: String| DataError::Format {
            row: RowContext::from_record(record),
            column,
            value: record.get(column).to_string(),
            reason,
        };
        let period = parse_period(record.get(Column::YearMonth))
            .map_err(|reason| format_error(Column::YearMonth, reason))?;
        let quantity = parse_quantity(record.get(Column::Value))
            .map_err(|reason| format_error(Column::Value, reason))?;
        let (hwb_code, hwb_name) = self.pair(record, Column::HwbCode, Column::HwbName)?;
        let (lpc_code, lpc_name) = self.pair(record, Column::LpcCode, Column::LpcName)?;
        let text = |column: Column| record.get(column).trim().to_string();
        Ok(CleanRecord {
            line: record.line(),
            icb_code: text(Column::IcbCode),
            icb_name: text(Column::IcbName),
            hwb_code,
            hwb_name,
            lpc_code,
            lpc_name,
            account_type: text(Column::AccountType),
            contractor_code: text(Column::ContractorCode),
            contractor_name: text(Column::ContractorName),
            address: [
                text(Column::Address1),
                text(Column::Address2),
                text(Column::Address3),
                text(Column::Address4),
            ],
            postcode: text(Column::Postcode),
            content_group: text(Column::ContentGroup),
            content: text(Column::Content),
            period,
            quantity,
        })
    }
}

pub fn clean_table(
    raw: &RawTable,
    policy: &CleaningPolicy,
) -> std::result::Result<CleanOutcome, DataError> {
    let mut cleaner = RowCleaner {
        policy,
        patched: Vec::new(),
    };
    let mut records = Vec::with_capacity(raw.len());
    let mut rejected = Vec::new();
    for record in raw.records() {
        match cleaner.clean(record) {
            Ok(clean) => records.push(clean),
            Err(err) => {
                if policy.tolerance == 0 {
                    return Err(err);
                }
                warn!("Rejected row: {err}");
                rejected.push(err);
            }
        }
    }
    if rejected.len() > policy.tolerance {
        let count = rejected.len();
        return Err(DataError::ToleranceExceeded {
            count,
            tolerance: policy.tolerance,
            first: Box::new(rejected.swap_remove(0)),
        });
    }

    let periods = records
        .iter()
        .map(|r| r.period)
        .collect::<BTreeSet<NaiveDate>>();
    if periods.len() > 1 {
        return Err(DataError::Inconsistency {
            row: None,
            detail: format!(
                "snapshot spans {} reporting periods ({})",
                periods.len(),
                periods
                    .iter()
                    .map(|p| p.format("%Y-%m").to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        });
    }

    Ok(CleanOutcome {
        table: CleanTable::new(records),
        source_rows: raw.len(),
        rejected,
        patched: cleaner.patched,
    })
}

/// Loads and cleans `args.input`, returning the outcome and the resolved
/// configuration. Shared by the `clean`, `report` and `rollup` commands.
pub fn load_and_clean(
    args: &crate::cli::InputArgs,
) -> Result<(CleanOutcome, PipelineConfig, LoadOptions)> {
    let config = PipelineConfig::resolve(args)?;
    let path = &args.input;
    let options = LoadOptions::from_config(path, &config)?;
    let loaded = load::load_table(path, &options).with_context(|| format!("Loading {path:?}"))?;
    let outcome = clean_table(&loaded.raw, &config.cleaning)
        .with_context(|| format!("Cleaning {path:?}"))?;
    info!(
        "Cleaned {} of {} row(s) ({} rejected, {} patched)",
        outcome.table.len(),
        loaded.report.rows,
        outcome.rejected.len(),
        outcome.patched.len()
    );
    Ok((outcome, config, options))
}

pub fn execute(args: &CleanArgs) -> Result<()> {
    let (outcome, _config, options) = load_and_clean(&args.input)?;
    for issue in outcome.rejected.iter().chain(&outcome.patched) {
        eprintln!("{issue}");
    }
    match &args.output {
        Some(path) if !io_utils::is_dash(path) => {
            outcome
                .table
                .write_csv(path, options.delimiter, options.encoding)
                .with_context(|| format!("Writing clean table to {path:?}"))?;
            info!("Clean table written to {path:?}");
        }
        Some(path) => outcome
            .table
            .write_csv(path, options.delimiter, options.encoding)?,
        None => {
            println!("rows: {} of {}", outcome.table.len(), outcome.source_rows);
            println!("rejected: {}", outcome.rejected.len());
            println!("patched: {}", outcome.patched.len());
            if let Some(period) = outcome.table.period() {
                println!("period: {}", period.format("%Y-%m"));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_parses_to_first_of_month() {
        assert_eq!(
            parse_period("2023-01").unwrap(),
            NaiveDate::from_ymd_opt(2023, 1, 1).unwrap()
        );
        assert_eq!(
            parse_period(" 2024-12 ").unwrap(),
            NaiveDate::from_ymd_opt(2024, 12, 1).unwrap()
        );
    }

    #[test]
    fn period_rejects_other_shapes() {
        assert!(parse_period("202301").is_err());
        assert!(parse_period("2023-1").is_err());
        assert!(parse_period("2023-13").is_err());
        assert!(parse_period("2023-01-01").is_err());
        assert!(parse_period("").is_err());
    }

    #[test]
    fn quantity_strips_thousands_separators() {
        assert_eq!(parse_quantity("1,200").unwrap(), 1200);
        assert_eq!(parse_quantity("12,345,678").unwrap(), 12_345_678);
        assert_eq!(parse_quantity("50").unwrap(), 50);
        assert_eq!(parse_quantity("0").unwrap(), 0);
    }

    #[test]
    fn quantity_rejects_malformed_text() {
        assert!(parse_quantity("").is_err());
        assert!(parse_quantity("-4").unwrap_err().contains("negative"));
        assert!(parse_quantity("12.5").is_err());
        assert!(parse_quantity("1,20").is_err());
        assert!(parse_quantity("12a").is_err());
        assert!(parse_quantity("99999999999999999999999").is_err());
    }
}
