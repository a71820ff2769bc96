//! Aggregation primitives over a clean table.
//!
//! Every function is pure: it reads the table, optionally restricted by a
//! [`Predicate`], and returns a [`ResultSet`]. Groups keep the order in which
//! their first row appears, so sorting by total is a stable ranking with ties
//! left in input order.

use std::collections::{HashMap, HashSet};

use itertools::Itertools;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::{
    predicate::Predicate,
    record::{CleanRecord, CleanTable, Column, SENTINEL},
    result::{Cell, ResultSet},
};

pub const TOTAL_COLUMN: &str = "total_quantity";
pub const PERCENT_COLUMN: &str = "percent_of_total";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupTotal {
    pub keys: Vec<String>,
    pub rows: usize,
    pub total: u128,
}

/// Summed quantity per group together with the grand total of every row the
/// predicate admits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rollup {
    pub groups: Vec<GroupTotal>,
    pub grand_total: u128,
    pub rows: usize,
}

impl Rollup {
    pub fn sort_descending(&mut self) {
        self.groups.sort_by(|a, b| b.total.cmp(&a.total));
    }
}

fn selected<'a>(
    table: &'a CleanTable,
    predicate: Option<&'a Predicate>,
) -> impl Iterator<Item = &'a CleanRecord> + 'a {
    table
        .records()
        .iter()
        .filter(move |record| predicate.is_none_or(|p| p.matches(record)))
}

pub fn column_label(column: Column) -> String {
    column.header().to_ascii_lowercase()
}

fn is_reportable(value: &str) -> bool {
    let trimmed = value.trim();
    !trimmed.is_empty() && trimmed != SENTINEL
}

/// `round(100 * part / whole, 2)`, half away from zero. A zero whole yields 0.00.
pub fn percentage_of(part: u128, whole: u128) -> Decimal {
    if whole == 0 {
        return Decimal::new(0, 2);
    }
    // Same ratio at a scale Decimal can hold.
    let shift = (128 - whole.leading_zeros()).saturating_sub(64);
    let (part, whole) = ((part >> shift) as u64, (whole >> shift) as u64);
    let mut percent = (Decimal::from(part) * Decimal::ONE_HUNDRED / Decimal::from(whole))
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    percent.rescale(2);
    percent
}

pub fn group_totals(
    table: &CleanTable,
    keys: &[Column],
    predicate: Option<&Predicate>,
) -> Rollup {
    let mut index: HashMap<Vec<String>, usize> = HashMap::new();
    let mut rollup = Rollup::default();
    for record in selected(table, predicate) {
        let key = keys
            .iter()
            .map(|&column| record.text(column).into_owned())
            .collect::<Vec<_>>();
        let slot = *index.entry(key.clone()).or_insert_with(|| {
            rollup.groups.push(GroupTotal {
                keys: key,
                rows: 0,
                total: 0,
            });
            rollup.groups.len() - 1
        });
        let group = &mut rollup.groups[slot];
        group.rows += 1;
        group.total += u128::from(record.quantity);
        rollup.grand_total += u128::from(record.quantity);
        rollup.rows += 1;
    }
    rollup
}

fn rollup_result(name: &str, keys: &[Column], rollup: &Rollup) -> ResultSet {
    let columns = keys
        .iter()
        .map(|&c| column_label(c))
        .chain([TOTAL_COLUMN.to_string(), PERCENT_COLUMN.to_string()])
        .collect();
    let mut result = ResultSet::new(name, columns);
    for group in &rollup.groups {
        let mut row = group
            .keys
            .iter()
            .map(|k| Cell::text(k.as_str()))
            .collect::<Vec<_>>();
        row.push(Cell::Integer(group.total));
        row.push(Cell::Decimal(percentage_of(
            group.total,
            rollup.grand_total,
        )));
        result.rows.push(row);
    }
    result
}

/// Group roll-up with each group's share of the grand total, in
/// first-appearance order.
pub fn rollup(
    name: &str,
    table: &CleanTable,
    keys: &[Column],
    predicate: Option<&Predicate>,
) -> ResultSet {
    rollup_result(name, keys, &group_totals(table, keys, predicate))
}

/// Roll-up ranked by summed quantity, highest first, truncated to `n`.
pub fn top_n(
    name: &str,
    table: &CleanTable,
    keys: &[Column],
    n: usize,
    predicate: Option<&Predicate>,
) -> ResultSet {
    let mut totals = group_totals(table, keys, predicate);
    totals.sort_descending();
    totals.groups.truncate(n);
    rollup_result(name, keys, &totals)
}

/// Distinct non-sentinel values for every categorical column.
pub fn distinct_counts(name: &str, table: &CleanTable) -> ResultSet {
    let mut result = ResultSet::new(name, vec!["column".into(), "distinct_values".into()]);
    for column in Column::CATEGORICAL {
        let distinct = table
            .records()
            .iter()
            .map(|record| record.text(column))
            .filter(|value| is_reportable(value))
            .collect::<HashSet<_>>()
            .len();
        result
            .rows
            .push(vec![Cell::text(column.header()), Cell::Integer(distinct as u128)]);
    }
    result
}

/// Sentinel or blank values per text column.
pub fn missing_values(name: &str, table: &CleanTable) -> ResultSet {
    let mut result = ResultSet::new(
        name,
        vec!["column".into(), "missing".into(), PERCENT_COLUMN.into()],
    );
    let rows = table.len() as u128;
    for column in Column::ALL
        .into_iter()
        .filter(|c| !matches!(c, Column::YearMonth | Column::Value))
    {
        let missing = table
            .records()
            .iter()
            .filter(|record| !is_reportable(&record.text(column)))
            .count() as u128;
        result.rows.push(vec![
            Cell::text(column.header()),
            Cell::Integer(missing),
            Cell::Decimal(percentage_of(missing, rows)),
        ]);
    }
    result
}

/// Row count, sum, max, min and mean of the quantity.
pub fn quantity_summary(
    name: &str,
    table: &CleanTable,
    predicate: Option<&Predicate>,
) -> ResultSet {
    let mut result = ResultSet::new(
        name,
        vec![
            "rows".into(),
            TOTAL_COLUMN.into(),
            "max_quantity".into(),
            "min_quantity".into(),
            "mean_quantity".into(),
        ],
    );
    let mut rows = 0u64;
    let mut total = 0u128;
    let mut max: Option<u64> = None;
    let mut min: Option<u64> = None;
    for record in selected(table, predicate) {
        rows += 1;
        total += u128::from(record.quantity);
        max = Some(max.map_or(record.quantity, |m| m.max(record.quantity)));
        min = Some(min.map_or(record.quantity, |m| m.min(record.quantity)));
    }
    let mean = (rows > 0).then(|| {
        // The quotient never exceeds the largest quantity, so it fits a u64.
        let whole = (total / u128::from(rows)) as u64;
        let remainder = (total % u128::from(rows)) as u64;
        let mut mean = (Decimal::from(whole) + Decimal::from(remainder) / Decimal::from(rows))
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        mean.rescale(2);
        mean
    });
    result.rows.push(vec![
        Cell::Integer(u128::from(rows)),
        Cell::Integer(total),
        max.map_or(Cell::Empty, |m| Cell::Integer(u128::from(m))),
        min.map_or(Cell::Empty, |m| Cell::Integer(u128::from(m))),
        mean.map_or(Cell::Empty, Cell::Decimal),
    ]);
    result
}

/// Distinct values of `counted` within each `group`, most first.
pub fn distinct_per_group(
    name: &str,
    table: &CleanTable,
    group: Column,
    counted: Column,
    predicate: Option<&Predicate>,
) -> ResultSet {
    let mut order: Vec<String> = Vec::new();
    let mut members: HashMap<String, HashSet<String>> = HashMap::new();
    for record in selected(table, predicate) {
        let key = record.text(group).into_owned();
        let set = members.entry(key.clone()).or_insert_with(|| {
            order.push(key);
            HashSet::new()
        });
        let value = record.text(counted);
        if is_reportable(&value) {
            set.insert(value.into_owned());
        }
    }
    let counts = order
        .into_iter()
        .map(|key| {
            let count = members.get(&key).map_or(0, HashSet::len);
            (key, count)
        })
        .sorted_by(|a, b| b.1.cmp(&a.1))
        .collect::<Vec<_>>();
    let mut result = ResultSet::new(
        name,
        vec![
            column_label(group),
            format!("distinct_{}", column_label(counted)),
        ],
    );
    for (key, count) in counts {
        result
            .rows
            .push(vec![Cell::text(key), Cell::Integer(count as u128)]);
    }
    result
}

/// The snapshot's reporting month with row and contractor counts.
pub fn reporting_period(name: &str, table: &CleanTable) -> ResultSet {
    let mut result = ResultSet::new(
        name,
        vec!["period".into(), "rows".into(), "contractors".into()],
    );
    let contractors = table
        .records()
        .iter()
        .map(|record| record.contractor_code.as_str())
        .filter(|code| is_reportable(code))
        .unique()
        .count();
    result.rows.push(vec![
        table.period().map_or(Cell::Empty, Cell::Date),
        Cell::Integer(table.len() as u128),
        Cell::Integer(contractors as u128),
    ]);
    result
}
