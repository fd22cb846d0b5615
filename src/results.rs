//! Files written into a results directory.
//!
//! - `predictions.json`: one [`PredictionRecord`] per column, written by `run`
//! - `results.json`: one [`EvaluationRecord`] per column, written by `eval`
//! - `results.txt`: rendered reports, appended by `eval`

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::annotate::PredictionRecord;
use crate::eval::{EvaluationRecord, EvaluationReport};

pub const PREDICTIONS_FILE: &str = "predictions.json";
pub const RESULTS_FILE: &str = "results.json";
pub const REPORT_FILE: &str = "results.txt";

#[derive(Debug, Error)]
pub enum ResultsError {
    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub fn write_predictions(dir: &Path, predictions: &[PredictionRecord]) -> Result<PathBuf, ResultsError> {
    write_json(&dir.join(PREDICTIONS_FILE), predictions)
}

pub fn read_predictions(dir: &Path) -> Result<Vec<PredictionRecord>, ResultsError> {
    read_json(&dir.join(PREDICTIONS_FILE))
}

pub fn write_results(dir: &Path, records: &[EvaluationRecord]) -> Result<PathBuf, ResultsError> {
    write_json(&dir.join(RESULTS_FILE), records)
}

pub fn read_results(dir: &Path) -> Result<Vec<EvaluationRecord>, ResultsError> {
    read_json(&dir.join(RESULTS_FILE))
}

/// Appends the rendered report to `results.txt`, creating it if needed.
pub fn append_report(dir: &Path, report: &EvaluationReport) -> Result<PathBuf, ResultsError> {
    let path = dir.join(REPORT_FILE);
    let io_err = |source| ResultsError::Io {
        path: path.clone(),
        source,
    };
    fs::create_dir_all(dir).map_err(io_err)?;
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(io_err)?;
    write!(file, "{report}").map_err(io_err)?;
    Ok(path)
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<PathBuf, ResultsError> {
    let io_err = |source| ResultsError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let json = serde_json::to_string_pretty(value).map_err(|source| ResultsError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, json).map_err(io_err)?;
    Ok(path.to_path_buf())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ResultsError> {
    let content = fs::read_to_string(path).map_err(|source| ResultsError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| ResultsError::Json {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ontology::ClassId;
    use tempfile::TempDir;

    #[test]
    fn predictions_survive_a_write_and_read() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("llama3");
        let predictions = vec![PredictionRecord {
            table_id: "t1".to_string(),
            table_name: "people".to_string(),
            column_id: 0,
            column_name: "name".to_string(),
            paths: vec![vec![ClassId::from("ex:Agent")], Vec::new()],
        }];

        let path = write_predictions(&nested, &predictions).unwrap();
        assert!(path.ends_with(PREDICTIONS_FILE));

        // ids are stored as plain strings
        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"ex:Agent\""));

        assert_eq!(read_predictions(&nested).unwrap(), predictions);
    }

    #[test]
    fn report_is_appended() {
        let dir = TempDir::new().unwrap();
        let report = EvaluationReport::default();
        append_report(dir.path(), &report).unwrap();
        append_report(dir.path(), &report).unwrap();
        let text = fs::read_to_string(dir.path().join(REPORT_FILE)).unwrap();
        assert_eq!(text.matches("Path Level").count(), 2);
    }

    #[test]
    fn missing_results_file_is_an_io_error() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            read_results(dir.path()),
            Err(ResultsError::Io { .. })
        ));
    }
}
