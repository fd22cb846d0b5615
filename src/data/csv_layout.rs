//! CSV dataset layout.
//!
//! A tables directory holds `table_list.csv` (columns `table_id` and
//! `table_name`) plus one CSV file per table, named by its `table_id`. Labels
//! live in `ground_truth.csv` with the same columns as a [`LabelRecord`].

use std::fs::File;
use std::path::Path;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{DataError, LabelRecord, Table};

pub const TABLE_LIST_FILE: &str = "table_list.csv";
pub const GROUND_TRUTH_FILE: &str = "ground_truth.csv";

#[derive(Debug, Deserialize)]
struct TableListEntry {
    table_id: String,
    #[serde(default)]
    table_name: Option<String>,
}

/// Reads every table listed in `dir/table_list.csv`.
///
/// A missing or blank `table_name` falls back to the file stem of the id.
pub fn read_table_dir(dir: &Path) -> Result<Vec<Table>, DataError> {
    let entries: Vec<TableListEntry> = read_records(&dir.join(TABLE_LIST_FILE))?;
    entries
        .into_iter()
        .map(|entry| {
            let (columns, rows) = read_cells(&dir.join(&entry.table_id))?;
            let table_name = entry
                .table_name
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| file_stem(&entry.table_id));
            Ok(Table {
                table_id: entry.table_id,
                table_name,
                columns,
                rows,
            })
        })
        .collect()
}

/// Label records from a `ground_truth.csv`-style file. Extra columns are ignored.
pub fn read_labels(path: &Path) -> Result<Vec<LabelRecord>, DataError> {
    read_records(path)
}

fn open(path: &Path) -> Result<csv::Reader<File>, DataError> {
    let file = File::open(path).map_err(|source| DataError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(file))
}

fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, DataError> {
    open(path)?
        .deserialize()
        .collect::<Result<Vec<T>, _>>()
        .map_err(|source| DataError::Csv {
            path: path.to_path_buf(),
            source,
        })
}

/// Header and rows of one table; empty cells become null.
fn read_cells(path: &Path) -> Result<(Vec<String>, Vec<Vec<Value>>), DataError> {
    let csv_error = |source: csv::Error| DataError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = open(path)?;
    let columns = reader
        .headers()
        .map_err(csv_error)?
        .iter()
        .map(str::to_string)
        .collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_error)?;
        rows.push(
            record
                .iter()
                .map(|cell| {
                    if cell.is_empty() {
                        Value::Null
                    } else {
                        Value::String(cell.to_string())
                    }
                })
                .collect(),
        );
    }
    Ok((columns, rows))
}

fn file_stem(table_id: &str) -> String {
    Path::new(table_id)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(table_id)
        .to_string()
}
