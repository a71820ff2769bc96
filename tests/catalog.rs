mod common;

use common::{clean, row};
use dispensing_eda::{
    catalog::Catalog,
    config::CatalogSettings,
    record::{CleanTable, Column},
    result::Cell,
};

fn snapshot() -> CleanTable {
    clean(vec![
        row(&[(Column::Value, "1,200")]),
        row(&[
            (Column::AccountType, "Appliance"),
            (Column::ContractorCode, "FAP01"),
            (Column::ContractorName, "FITTLEWORTH MEDICAL LIMITED"),
            (Column::ContentGroup, "Appliances"),
            (Column::Content, "Stoma"),
            (Column::Value, "40"),
        ]),
        row(&[
            (Column::ContractorCode, "FB100"),
            (Column::ContractorName, "BOOTS UK LIMITED"),
            (Column::HwbCode, ""),
            (Column::HwbName, ""),
            (Column::Value, "10"),
        ]),
    ])
}

#[test]
fn run_all_returns_every_query_in_catalog_order() {
    let catalog = Catalog::standard(&CatalogSettings::default());
    let table = snapshot();
    let results = catalog.run_all(&table);

    let names = results.iter().map(|r| r.name.as_str()).collect::<Vec<_>>();
    assert_eq!(names, catalog.names());
    assert_eq!(results.len(), 21);
    assert!(results.iter().all(|r| !r.description.is_empty()));
}

#[test]
fn summary_queries_cover_the_whole_table() {
    let catalog = Catalog::standard(&CatalogSettings::default());
    let table = snapshot();

    let summary = catalog.run("quantity_summary", &table).expect("summary");
    assert_eq!(summary.rows[0][0], Cell::Integer(table.len() as u128));
    assert_eq!(summary.rows[0][1], Cell::Integer(1250));

    let period = catalog.run("reporting_period", &table).expect("period");
    assert_eq!(period.rows[0][1], Cell::Integer(3));
    assert_eq!(period.rows[0][2], Cell::Integer(3));
}

#[test]
fn appliance_queries_only_see_appliance_rows() {
    let catalog = Catalog::standard(&CatalogSettings::default());
    let table = snapshot();

    let by_content = catalog.run("appliance_by_content", &table).expect("query");
    assert_eq!(by_content.rows.len(), 1);
    assert_eq!(by_content.rows[0][1].to_string(), "Stoma");
    assert_eq!(by_content.rows[0][3].to_string(), "100.00");

    let ranked = catalog
        .run("top_appliance_contractors", &table)
        .expect("query");
    assert_eq!(ranked.rows.len(), 1);
    assert_eq!(ranked.rows[0][0].to_string(), "FAP01");
}

#[test]
fn unknown_geography_picks_up_sentinel_rows() {
    let catalog = Catalog::standard(&CatalogSettings::default());
    let result = catalog
        .run("unknown_geography_by_icb", &snapshot())
        .expect("query");
    assert_eq!(result.rows.len(), 1);
    assert_eq!(result.rows[0][2], Cell::Integer(10));
}

#[test]
fn featured_contractors_follow_settings() {
    let table = snapshot();
    let default = Catalog::standard(&CatalogSettings::default())
        .run("featured_contractors", &table)
        .expect("query");
    assert_eq!(default.rows.len(), 1);
    assert_eq!(default.rows[0][0].to_string(), "BOOTS UK LIMITED");

    let settings = CatalogSettings {
        featured_contractors: vec!["CORNER CHEMIST".to_string()],
        ..CatalogSettings::default()
    };
    let custom = Catalog::standard(&settings)
        .run("featured_contractors", &table)
        .expect("query");
    assert_eq!(custom.rows[0][0].to_string(), "CORNER CHEMIST");
    assert_eq!(custom.rows[0][1], Cell::Integer(1200));
}

#[test]
fn top_n_setting_limits_rankings() {
    let settings = CatalogSettings {
        top_n: 1,
        ..CatalogSettings::default()
    };
    let result = Catalog::standard(&settings)
        .run("top_contractors", &snapshot())
        .expect("query");
    assert_eq!(result.rows.len(), 1);
    assert_eq!(result.rows[0][0].to_string(), "FA001");
}

#[test]
fn run_selected_keeps_requested_order_and_rejects_unknown_names() {
    let catalog = Catalog::standard(&CatalogSettings::default());
    let table = snapshot();

    let picked = catalog
        .run_selected(
            &["top_content".to_string(), "quantity_summary".to_string()],
            &table,
        )
        .expect("selected");
    let names = picked.iter().map(|r| r.name.as_str()).collect::<Vec<_>>();
    assert_eq!(names, vec!["top_content", "quantity_summary"]);

    let err = catalog
        .run_selected(&["no_such_query".to_string()], &table)
        .unwrap_err();
    assert!(err.to_string().contains("no_such_query"));
}
