//! Tables and ground-truth labels.
//!
//! Two layouts are read. The JSON layout is `tables.json`, a list of tables
//! with their header and rows, and `labels.json`, a list of [`LabelRecord`]s
//! naming the annotated columns. The CSV layout is a directory of table files
//! indexed by `table_list.csv`, with labels in `ground_truth.csv`; see
//! [`csv_layout`].

pub mod csv_layout;
mod labels;
mod table;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

pub use labels::{ABSENT, LabelRecord};
pub use table::Table;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("table '{0}' appears more than once")]
    DuplicateTable(String),

    #[error("unknown table '{0}'")]
    UnknownTable(String),
}

/// Source of tables and labels for annotation and evaluation.
pub trait TableProvider {
    fn get_table(&self, table_id: &str) -> Result<&Table, DataError>;

    /// Markdown rendering of the table header and its first `max_rows` rows.
    fn get_table_summary(&self, table_id: &str, max_rows: usize) -> Result<String, DataError> {
        Ok(self.get_table(table_id)?.to_markdown(max_rows))
    }

    fn get_labels(&self) -> &[LabelRecord];
}

/// In-memory dataset.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    tables: HashMap<String, Table>,
    labels: Vec<LabelRecord>,
}

impl Dataset {
    /// # Errors
    ///
    /// Fails on duplicate table ids.
    pub fn new(tables: Vec<Table>, labels: Vec<LabelRecord>) -> Result<Self, DataError> {
        let mut by_id = HashMap::with_capacity(tables.len());
        for table in tables {
            if by_id.contains_key(&table.table_id) {
                return Err(DataError::DuplicateTable(table.table_id));
            }
            by_id.insert(table.table_id.clone(), table);
        }
        Ok(Self {
            tables: by_id,
            labels,
        })
    }

    /// Reads tables and labels, picking the layout from each path.
    ///
    /// A tables directory is read as the CSV layout, anything else as a
    /// `tables.json` document. A labels directory means its
    /// `ground_truth.csv`; a `.csv` file is read as CSV, anything else as JSON.
    pub fn load(tables_path: &Path, labels_path: &Path) -> Result<Self, DataError> {
        let tables: Vec<Table> = if tables_path.is_dir() {
            csv_layout::read_table_dir(tables_path)?
        } else {
            read_json(tables_path)?
        };
        let labels: Vec<LabelRecord> = if labels_path.is_dir() {
            csv_layout::read_labels(&labels_path.join(csv_layout::GROUND_TRUTH_FILE))?
        } else if labels_path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
        {
            csv_layout::read_labels(labels_path)?
        } else {
            read_json(labels_path)?
        };
        info!(
            tables = tables.len(),
            labels = labels.len(),
            "Loaded dataset"
        );
        Self::new(tables, labels)
    }

    /// Labels of `table_id`/`column_id`, if that column is annotated.
    pub fn label_for(&self, table_id: &str, column_id: u32) -> Option<&LabelRecord> {
        self.labels
            .iter()
            .find(|l| l.table_id == table_id && l.column_id == column_id)
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }
}

impl TableProvider for Dataset {
    fn get_table(&self, table_id: &str) -> Result<&Table, DataError> {
        self.tables
            .get(table_id)
            .ok_or_else(|| DataError::UnknownTable(table_id.to_string()))
    }

    fn get_labels(&self) -> &[LabelRecord] {
        &self.labels
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, DataError> {
    let content = fs::read_to_string(path).map_err(|source| DataError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| DataError::Json {
        path: path.to_path_buf(),
        source,
    })
}
