pub mod aggregate;
pub mod catalog;
pub mod clean;
pub mod cli;
pub mod config;
pub mod error;
pub mod io_utils;
pub mod load;
pub mod predicate;
pub mod record;
pub mod report;
pub mod result;
pub mod table;

use std::{env, sync::OnceLock};

use anyhow::Result;
use clap::Parser;
use log::LevelFilter;

use crate::{
    catalog::Catalog,
    cli::{Cli, Commands, QueriesArgs},
    config::PipelineConfig,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("dispensing_eda", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Load(args) => load::execute(&args),
        Commands::Clean(args) => clean::execute(&args),
        Commands::Report(args) => report::execute(&args),
        Commands::Rollup(args) => report::execute_rollup(&args),
        Commands::Queries(args) => handle_queries(&args),
    }
}

fn handle_queries(args: &QueriesArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    let catalog = Catalog::standard(&config.catalog);
    let rows = catalog
        .queries()
        .iter()
        .map(|q| vec![q.name().to_string(), q.description().to_string()])
        .collect::<Vec<_>>();
    let headers = vec!["name".to_string(), "description".to_string()];
    print!("{}", table::render_table(&headers, &rows, &[]));
    Ok(())
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        other => (other as char).to_string(),
    }
}
