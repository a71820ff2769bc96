use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::{config::PartialPairPolicy, record::Column};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Load, clean, and profile monthly pharmacy dispensing snapshots",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Load a snapshot, verify its layout and row count, optionally write a backup copy
    Load(LoadArgs),
    /// Load and clean a snapshot, reporting rejected or patched rows
    Clean(CleanArgs),
    /// Run catalog queries against the cleaned snapshot
    Report(ReportArgs),
    /// Ad-hoc roll-up with optional filters and ranking
    Rollup(RollupArgs),
    /// List the queries available to `report`
    Queries(QueriesArgs),
}

/// Source file and pipeline settings shared by every data command.
#[derive(Debug, Clone, Args)]
pub struct InputArgs {
    /// Input snapshot (`-` for stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// YAML configuration file
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,
    /// Delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Malformed rows tolerated before cleaning fails (default 0)
    #[arg(long)]
    pub tolerance: Option<usize>,
    /// Handling of HWB/LPC pairs with only one half present
    #[arg(long = "partial-pairs", value_enum)]
    pub partial_pairs: Option<PartialPairPolicy>,
    /// Skip comparing the loaded row count with the source line count
    #[arg(long = "skip-line-check")]
    pub skip_line_check: bool,
}

#[derive(Debug, Args)]
pub struct LoadArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Write the backup snapshot to this path
    #[arg(long)]
    pub backup: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct CleanArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Write the clean table to this path (`-` for stdout)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, ValueEnum, PartialEq, Eq)]
#[value(rename_all = "kebab-case")]
pub enum OutputFormat {
    #[default]
    Table,
    Csv,
    Json,
}

#[derive(Debug, Args)]
pub struct ReportArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Query to run (repeatable); all catalog queries when omitted
    #[arg(short = 'q', long = "query", action = clap::ArgAction::Append)]
    pub queries: Vec<String>,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
    /// Directory receiving one file per result (csv) or report.json (json)
    #[arg(long = "output-dir")]
    pub output_dir: Option<PathBuf>,
    /// Override the ranking length for top-N queries
    #[arg(long)]
    pub top: Option<usize>,
}

#[derive(Debug, Args)]
pub struct RollupArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Comma-separated grouping columns, e.g. `ICB_CODE,ICB_NAME`
    #[arg(short = 'g', long = "group-by", value_delimiter = ',', required = true, value_parser = parse_column)]
    pub group_by: Vec<Column>,
    /// Row filters such as `ACCOUNT_TYPE=Appliance` or `CONTRACTOR_NAME in A|B`
    #[arg(long = "filter", action = clap::ArgAction::Append)]
    pub filters: Vec<String>,
    /// Rank by quantity and keep the first N groups
    #[arg(long)]
    pub top: Option<usize>,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

#[derive(Debug, Args)]
pub struct QueriesArgs {
    /// YAML configuration file
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,
}

pub fn parse_column(value: &str) -> Result<Column, String> {
    value.parse::<Column>().map_err(|err| err.to_string())
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" | "\\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
