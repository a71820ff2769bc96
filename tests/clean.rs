mod common;

use chrono::NaiveDate;
use common::{raw_table, row};
use dispensing_eda::{
    aggregate,
    clean::clean_table,
    config::{CleaningPolicy, PartialPairPolicy},
    error::DataError,
    record::{Column, SENTINEL},
    result::Cell,
};

fn policy(tolerance: usize, partial_pairs: PartialPairPolicy) -> CleaningPolicy {
    CleaningPolicy {
        tolerance,
        partial_pairs,
    }
}

#[test]
fn quantities_with_separators_sum_exactly() {
    let raw = raw_table(vec![
        row(&[(Column::Value, "1,200")]),
        row(&[(Column::Value, "50")]),
        row(&[(Column::Value, "0")]),
    ]);
    let outcome = clean_table(&raw, &CleaningPolicy::default()).expect("clean");
    assert_eq!(outcome.table.len(), raw.len());

    let summary = aggregate::quantity_summary("summary", &outcome.table, None);
    let cells = &summary.rows[0];
    assert_eq!(cells[0], Cell::Integer(3));
    assert_eq!(cells[1], Cell::Integer(1250));
    assert_eq!(cells[2], Cell::Integer(1200));
    assert_eq!(cells[3], Cell::Integer(0));
    assert_eq!(cells[4].to_string(), "416.67");
}

#[test]
fn period_becomes_first_of_month() {
    let table = common::clean(vec![row(&[(Column::YearMonth, "2023-01")])]);
    assert_eq!(table.period(), NaiveDate::from_ymd_opt(2023, 1, 1));
    assert_eq!(
        table.records()[0].period,
        NaiveDate::from_ymd_opt(2023, 1, 1).unwrap()
    );
}

#[test]
fn absent_pairs_become_unknown() {
    let table = common::clean(vec![row(&[
        (Column::HwbCode, ""),
        (Column::HwbName, "  "),
        (Column::LpcCode, ""),
        (Column::LpcName, ""),
    ])]);
    let record = &table.records()[0];
    assert_eq!(record.hwb_code, SENTINEL);
    assert_eq!(record.hwb_name, SENTINEL);
    assert_eq!(record.lpc_code, SENTINEL);
    assert_eq!(record.lpc_name, SENTINEL);
}

#[test]
fn half_absent_pair_is_an_inconsistency_by_default() {
    let raw = raw_table(vec![
        row(&[]),
        row(&[(Column::HwbName, ""), (Column::ContractorCode, "FQ777")]),
    ]);
    let err = clean_table(&raw, &CleaningPolicy::default()).unwrap_err();
    match &err {
        DataError::Inconsistency {
            row: Some(context),
            detail,
        } => {
            assert_eq!(context.line, 3);
            assert_eq!(context.contractor_code, "FQ777");
            assert!(detail.contains("HWB_NAME absent"), "{detail}");
        }
        other => panic!("expected inconsistency, got {other:?}"),
    }
}

#[test]
fn patch_policy_keeps_the_row_and_reports_it() {
    let raw = raw_table(vec![
        row(&[(Column::LpcCode, "")]),
        row(&[(Column::HwbCode, ""), (Column::HwbName, "")]),
    ]);
    let outcome =
        clean_table(&raw, &policy(0, PartialPairPolicy::Patch)).expect("clean with patching");

    assert_eq!(outcome.table.len(), 2);
    assert_eq!(outcome.patched.len(), 1);
    assert!(outcome.patched[0].is_inconsistency());
    assert!(outcome.rejected.is_empty());

    let patched = &outcome.table.records()[0];
    assert_eq!(patched.lpc_code, SENTINEL);
    assert_eq!(patched.lpc_name, "Tees Valley LPC");
}

#[test]
fn malformed_quantity_halts_cleaning() {
    let raw = raw_table(vec![row(&[]), row(&[(Column::Value, "12.5")])]);
    let err = clean_table(&raw, &CleaningPolicy::default()).unwrap_err();
    match err {
        DataError::Format {
            row, column, value, ..
        } => {
            assert_eq!(row.line, 3);
            assert_eq!(column, Column::Value);
            assert_eq!(value, "12.5");
        }
        other => panic!("expected format error, got {other:?}"),
    }
}

#[test]
fn malformed_period_is_a_format_error() {
    let raw = raw_table(vec![row(&[(Column::YearMonth, "Jan-2023")])]);
    let err = clean_table(&raw, &CleaningPolicy::default()).unwrap_err();
    assert!(matches!(
        err,
        DataError::Format {
            column: Column::YearMonth,
            ..
        }
    ));
}

#[test]
fn tolerance_admits_a_bounded_number_of_bad_rows() {
    let rows = vec![
        row(&[]),
        row(&[(Column::Value, "n/a")]),
        row(&[]),
        row(&[(Column::HwbCode, "")]),
    ];

    let outcome = clean_table(&raw_table(rows.clone()), &policy(2, PartialPairPolicy::Fail))
        .expect("within tolerance");
    assert_eq!(outcome.table.len(), 2);
    assert_eq!(outcome.source_rows, 4);
    assert_eq!(outcome.rejected.len(), 2);
    assert!(outcome.rejected[0].is_format());
    assert!(outcome.rejected[1].is_inconsistency());

    let err = clean_table(&raw_table(rows), &policy(1, PartialPairPolicy::Fail)).unwrap_err();
    match err {
        DataError::ToleranceExceeded {
            count,
            tolerance,
            first,
        } => {
            assert_eq!(count, 2);
            assert_eq!(tolerance, 1);
            assert!(first.is_format());
            assert_eq!(first.row().map(|r| r.line), Some(3));
        }
        other => panic!("expected tolerance error, got {other:?}"),
    }
}

#[test]
fn mixed_periods_are_rejected() {
    let raw = raw_table(vec![
        row(&[(Column::YearMonth, "2023-01")]),
        row(&[(Column::YearMonth, "2023-02")]),
    ]);
    let err = clean_table(&raw, &CleaningPolicy::default()).unwrap_err();
    match err {
        DataError::Inconsistency { row: None, detail } => {
            assert!(detail.contains("2023-01, 2023-02"), "{detail}");
        }
        other => panic!("expected table-wide inconsistency, got {other:?}"),
    }
}

#[test]
fn cleaning_leaves_the_raw_table_untouched() {
    let raw = raw_table(vec![
        row(&[(Column::HwbCode, ""), (Column::HwbName, "")]),
        row(&[(Column::Value, " 2,500 ")]),
    ]);
    let before = raw.digest();
    let outcome = clean_table(&raw, &CleaningPolicy::default()).expect("clean");

    assert_eq!(raw.digest(), before);
    assert_eq!(raw.records()[0].get(Column::HwbCode), "");
    assert_eq!(outcome.table.records()[1].quantity, 2500);
    assert_eq!(outcome.table.len(), raw.len());
}
