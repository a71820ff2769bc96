#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::{TempDir, tempdir};

use dispensing_eda::{
    clean::clean_table,
    config::CleaningPolicy,
    record::{CleanTable, Column, RawRecord, RawTable},
};

/// A dispensing row with plausible defaults; override fields per test.
pub fn row(overrides: &[(Column, &str)]) -> Vec<String> {
    let mut fields = Column::ALL
        .iter()
        .map(|column| {
            match column {
                Column::IcbCode => "QHM",
                Column::IcbName => "NHS NORTH EAST AND NORTH CUMBRIA ICB",
                Column::HwbCode => "E06000001",
                Column::HwbName => "Hartlepool",
                Column::LpcCode => "LPC01",
                Column::LpcName => "Tees Valley LPC",
                Column::AccountType => "Pharmacy",
                Column::ContractorCode => "FA001",
                Column::ContractorName => "CORNER CHEMIST",
                Column::Address1 => "1 HIGH STREET",
                Column::Address2 => "",
                Column::Address3 => "HARTLEPOOL",
                Column::Address4 => "",
                Column::Postcode => "TS24 7AA",
                Column::ContentGroup => "Prescriptions",
                Column::Content => "Items",
                Column::YearMonth => "2023-01",
                Column::Value => "10",
            }
            .to_string()
        })
        .collect::<Vec<_>>();
    for (column, value) in overrides {
        fields[column.index()] = value.to_string();
    }
    fields
}

/// Serialises rows under the standard header as CSV text.
pub fn csv_text(rows: &[Vec<String>]) -> String {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(Column::ALL.iter().map(|c| c.header()))
        .expect("write header");
    for row in rows {
        writer.write_record(row).expect("write row");
    }
    String::from_utf8(writer.into_inner().expect("flush csv")).expect("utf-8 csv")
}

pub fn raw_table(rows: Vec<Vec<String>>) -> RawTable {
    RawTable::new(
        rows.into_iter()
            .enumerate()
            .map(|(idx, fields)| RawRecord::new(idx + 2, fields).expect("row width"))
            .collect(),
    )
}

pub fn clean(rows: Vec<Vec<String>>) -> CleanTable {
    clean_table(&raw_table(rows), &CleaningPolicy::default())
        .expect("clean rows")
        .table
}

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        self.write_bytes(name, contents.as_bytes())
    }

    pub fn write_bytes(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents).expect("write temp file contents");
        path
    }

    pub fn write_snapshot(&self, name: &str, rows: &[Vec<String>]) -> PathBuf {
        self.write(name, &csv_text(rows))
    }
}
