use std::{
    fs,
    io::{self, Write},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use encoding_rs::UTF_8;
use log::info;

use crate::{
    aggregate,
    catalog::Catalog,
    clean,
    cli::{OutputFormat, ReportArgs, RollupArgs},
    io_utils, predicate,
    result::ResultSet,
    table,
};

pub fn execute(args: &ReportArgs) -> Result<()> {
    let (outcome, mut config, _) = clean::load_and_clean(&args.input)?;
    if let Some(top) = args.top {
        config.catalog.top_n = top;
        config.validate()?;
    }
    let catalog = Catalog::standard(&config.catalog);
    let results = catalog.run_selected(&args.queries, &outcome.table)?;
    info!(
        "Ran {} quer{} over {} row(s)",
        results.len(),
        if results.len() == 1 { "y" } else { "ies" },
        outcome.table.len()
    );
    emit(&results, args.format, args.output_dir.as_deref())
}

pub fn execute_rollup(args: &RollupArgs) -> Result<()> {
    let filter = predicate::parse_filters(&args.filters)?;
    let (outcome, _, _) = clean::load_and_clean(&args.input)?;
    let result = match args.top {
        Some(0) => return Err(anyhow!("--top must be at least 1")),
        Some(n) => aggregate::top_n("rollup", &outcome.table, &args.group_by, n, filter.as_ref()),
        None => aggregate::rollup("rollup", &outcome.table, &args.group_by, filter.as_ref()),
    };
    emit(&[result], args.format, None)
}

pub fn emit(results: &[ResultSet], format: OutputFormat, output_dir: Option<&Path>) -> Result<()> {
    if format == OutputFormat::Table && output_dir.is_some() {
        return Err(anyhow!("--output-dir requires --format csv or json"));
    }
    if let Some(dir) = output_dir {
        fs::create_dir_all(dir).with_context(|| format!("Creating output directory {dir:?}"))?;
    }
    match format {
        OutputFormat::Table => {
            for result in results {
                table::print_result(result);
            }
        }
        OutputFormat::Csv => match output_dir {
            Some(dir) => {
                for result in results {
                    let path = dir.join(format!("{}.csv", result.name));
                    write_csv(result, Some(&path))?;
                    info!("Wrote {} row(s) to {path:?}", result.rows.len());
                }
            }
            None if results.len() == 1 => write_csv(&results[0], None)?,
            None => {
                return Err(anyhow!(
                    "CSV output of {} results requires --output-dir",
                    results.len()
                ));
            }
        },
        OutputFormat::Json => match output_dir {
            Some(dir) => {
                let path = dir.join("report.json");
                let file = fs::File::create(&path)
                    .with_context(|| format!("Creating output file {path:?}"))?;
                serde_json::to_writer_pretty(io::BufWriter::new(file), results)
                    .with_context(|| format!("Writing JSON to {path:?}"))?;
                info!("Wrote {} result set(s) to {path:?}", results.len());
            }
            None => {
                let stdout = io::stdout();
                let mut handle = stdout.lock();
                serde_json::to_writer_pretty(&mut handle, results).context("Writing JSON")?;
                writeln!(handle)?;
            }
        },
    }
    Ok(())
}

fn write_csv(result: &ResultSet, path: Option<&Path>) -> Result<()> {
    let mut writer = io_utils::open_csv_writer(path, b',', UTF_8)?;
    writer
        .write_record(&result.columns)
        .with_context(|| format!("Writing header for '{}'", result.name))?;
    for row in result.display_rows() {
        writer
            .write_record(&row)
            .with_context(|| format!("Writing row for '{}'", result.name))?;
    }
    writer.flush()?;
    Ok(())
}
