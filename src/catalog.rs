//! Registry of named report queries.
//!
//! [`Catalog::standard`] registers the descriptive queries run against every
//! monthly snapshot. Queries never write, so [`Catalog::run_all`] executes them
//! in parallel over the shared clean table and returns results in catalog
//! order.

use std::time::Instant;

use anyhow::{Result, anyhow, bail};
use log::debug;
use rayon::prelude::*;

use crate::{
    aggregate,
    config::CatalogSettings,
    predicate::Predicate,
    record::{CleanTable, Column, SENTINEL},
    result::ResultSet,
};

type QueryFn = Box<dyn Fn(&str, &CleanTable) -> ResultSet + Send + Sync>;

pub struct QueryDef {
    name: String,
    description: String,
    run: QueryFn,
}

impl QueryDef {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn execute(&self, table: &CleanTable) -> ResultSet {
        let started = Instant::now();
        let result = (self.run)(&self.name, table).with_description(self.description.clone());
        debug!(
            "Query '{}' produced {} row(s) in {:?}",
            self.name,
            result.rows.len(),
            started.elapsed()
        );
        result
    }
}

#[derive(Default)]
pub struct Catalog {
    queries: Vec<QueryDef>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: &str, description: &str, run: F) -> Result<&mut Self>
    where
        F: Fn(&str, &CleanTable) -> ResultSet + Send + Sync + 'static,
    {
        if self.get(name).is_some() {
            bail!("Query '{name}' is already registered");
        }
        self.push(name, description, run);
        Ok(self)
    }

    fn push<F>(&mut self, name: &str, description: &str, run: F)
    where
        F: Fn(&str, &CleanTable) -> ResultSet + Send + Sync + 'static,
    {
        self.queries.push(QueryDef {
            name: name.to_string(),
            description: description.to_string(),
            run: Box::new(run),
        });
    }

    pub fn standard(settings: &CatalogSettings) -> Self {
        let mut catalog = Self::new();
        let top = settings.top_n;

        catalog.push(
            "reporting_period",
            "Reporting month with row and contractor counts",
            aggregate::reporting_period,
        );
        catalog.push(
            "distinct_counts",
            "Distinct known values per categorical column",
            aggregate::distinct_counts,
        );
        catalog.push(
            "missing_values",
            "Blank or Unknown values per column",
            aggregate::missing_values,
        );
        catalog.push(
            "quantity_summary",
            "Row count, total, max, min and mean of the dispensed quantity",
            |name, table| aggregate::quantity_summary(name, table, None),
        );

        for (name, description, keys) in [
            (
                "quantity_by_account_type",
                "Quantity and share by account type",
                vec![Column::AccountType],
            ),
            (
                "quantity_by_icb",
                "Quantity and share by integrated care board",
                vec![Column::IcbCode, Column::IcbName],
            ),
            (
                "quantity_by_lpc",
                "Quantity and share by local pharmaceutical committee",
                vec![Column::LpcCode, Column::LpcName],
            ),
            (
                "quantity_by_content_group",
                "Quantity and share by content group",
                vec![Column::ContentGroup],
            ),
            (
                "quantity_by_content",
                "Quantity and share by content within content group",
                vec![Column::ContentGroup, Column::Content],
            ),
            (
                "quantity_by_account_and_group",
                "Quantity and share by account type and content group",
                vec![Column::AccountType, Column::ContentGroup],
            ),
        ] {
            catalog.push(name, description, move |name, table| {
                aggregate::rollup(name, table, &keys, None)
            });
        }

        for (name, description, keys) in [
            (
                "top_icbs",
                "Integrated care boards ranked by quantity",
                vec![Column::IcbCode, Column::IcbName],
            ),
            (
                "top_hwbs",
                "Health and wellbeing boards ranked by quantity",
                vec![Column::HwbCode, Column::HwbName],
            ),
            (
                "top_lpcs",
                "Local pharmaceutical committees ranked by quantity",
                vec![Column::LpcCode, Column::LpcName],
            ),
            (
                "top_contractors",
                "Contractors ranked by quantity",
                vec![Column::ContractorCode, Column::ContractorName],
            ),
            (
                "top_content",
                "Content lines ranked by quantity",
                vec![Column::Content],
            ),
            (
                "top_postcodes",
                "Postcodes ranked by quantity",
                vec![Column::Postcode],
            ),
        ] {
            catalog.push(name, description, move |name, table| {
                aggregate::top_n(name, table, &keys, top, None)
            });
        }

        catalog.push(
            "contractors_per_icb",
            "Distinct contractors within each integrated care board",
            |name, table| {
                aggregate::distinct_per_group(
                    name,
                    table,
                    Column::IcbName,
                    Column::ContractorCode,
                    None,
                )
            },
        );

        let unknown_geography = Predicate::Any(vec![
            Predicate::equals(Column::HwbCode, SENTINEL),
            Predicate::equals(Column::LpcCode, SENTINEL),
        ]);
        catalog.push(
            "unknown_geography_by_icb",
            "Quantity from rows with an Unknown HWB or LPC, by integrated care board",
            move |name, table| {
                aggregate::rollup(
                    name,
                    table,
                    &[Column::IcbCode, Column::IcbName],
                    Some(&unknown_geography),
                )
            },
        );

        let appliance = Predicate::equals(
            Column::AccountType,
            settings.appliance_account_type.clone(),
        );
        let appliance_ranked = appliance.clone();
        catalog.push(
            "appliance_by_content",
            "Appliance contractor quantity and share by content",
            move |name, table| {
                aggregate::rollup(
                    name,
                    table,
                    &[Column::ContentGroup, Column::Content],
                    Some(&appliance),
                )
            },
        );
        catalog.push(
            "top_appliance_contractors",
            "Appliance contractors ranked by quantity",
            move |name, table| {
                aggregate::top_n(
                    name,
                    table,
                    &[Column::ContractorCode, Column::ContractorName],
                    top,
                    Some(&appliance_ranked),
                )
            },
        );

        let featured = Predicate::one_of(
            Column::ContractorName,
            settings.featured_contractors.iter().cloned(),
        );
        catalog.push(
            "featured_contractors",
            "Quantity and share for the configured contractor set",
            move |name, table| {
                aggregate::rollup(name, table, &[Column::ContractorName], Some(&featured))
            },
        );

        catalog
    }

    pub fn queries(&self) -> &[QueryDef] {
        &self.queries
    }

    pub fn names(&self) -> Vec<&str> {
        self.queries.iter().map(QueryDef::name).collect()
    }

    pub fn get(&self, name: &str) -> Option<&QueryDef> {
        self.queries.iter().find(|q| q.name == name)
    }

    pub fn run(&self, name: &str, table: &CleanTable) -> Result<ResultSet> {
        self.get(name)
            .map(|query| query.execute(table))
            .ok_or_else(|| {
                anyhow!(
                    "Unknown query '{name}'. Available: {}",
                    self.names().join(", ")
                )
            })
    }

    pub fn run_all(&self, table: &CleanTable) -> Vec<ResultSet> {
        self.queries
            .par_iter()
            .map(|query| query.execute(table))
            .collect()
    }

    /// Runs the named queries, or the whole catalog when `names` is empty.
    pub fn run_selected(&self, names: &[String], table: &CleanTable) -> Result<Vec<ResultSet>> {
        if names.is_empty() {
            return Ok(self.run_all(table));
        }
        let selected = names
            .iter()
            .map(|name| {
                self.get(name).ok_or_else(|| {
                    anyhow!(
                        "Unknown query '{name}'. Available: {}",
                        self.names().join(", ")
                    )
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(selected
            .par_iter()
            .map(|query| query.execute(table))
            .collect())
    }
}
