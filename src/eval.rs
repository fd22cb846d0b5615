//! Scoring predicted class paths against ground truth.

mod ground_truth;
mod metrics;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::annotate::PredictionRecord;
use crate::data::LabelRecord;
use crate::ontology::OntologyGraph;
use crate::search::path_names;

pub use ground_truth::ground_truth_paths;
pub use metrics::{Counts, LevelScores, Scores, node_counts, node_level, path_counts, path_level};

/// Predicted and expected paths of one column, as class names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub table_id: String,
    pub table_name: String,
    pub column_id: u32,
    pub column_name: String,
    pub pred_paths: Vec<Vec<String>>,
    pub gt_paths: Vec<Vec<String>>,
}

impl EvaluationRecord {
    /// Resolves predicted ids to names and builds the ground truth from `label`.
    pub fn from_prediction(
        prediction: &PredictionRecord,
        label: &LabelRecord,
        graph: &OntologyGraph,
    ) -> Self {
        Self {
            table_id: prediction.table_id.clone(),
            table_name: prediction.table_name.clone(),
            column_id: prediction.column_id,
            column_name: prediction.column_name.clone(),
            pred_paths: prediction
                .paths
                .iter()
                .map(|path| path_names(graph, path))
                .collect(),
            gt_paths: ground_truth_paths(label),
        }
    }
}

/// Scores at both granularities.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub path: LevelScores,
    pub node: LevelScores,
}

pub fn evaluate(records: &[EvaluationRecord]) -> EvaluationReport {
    EvaluationReport {
        path: path_level(records),
        node: node_level(records),
    }
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_level(f, "Path Level", &self.path)?;
        write_level(f, "Node Level", &self.node)
    }
}

fn write_level(f: &mut fmt::Formatter<'_>, title: &str, level: &LevelScores) -> fmt::Result {
    writeln!(f, "+++++++++++++++++{title}+++++++++++++++++")?;
    writeln!(f, "\tMacro Precision: {:.4}", level.macro_avg.precision)?;
    writeln!(f, "\tMacro Recall: {:.4}", level.macro_avg.recall)?;
    writeln!(f, "\tMacro F1: {:.4}", level.macro_avg.f1)?;
    writeln!(f, "\tMicro Precision: {:.4}", level.micro_avg.precision)?;
    writeln!(f, "\tMicro Recall: {:.4}", level.micro_avg.recall)?;
    writeln!(f, "\tMicro F1: {:.4}", level.micro_avg.f1)?;
    writeln!(
        f,
        "\tColumns: {}  TP: {}  FP: {}  FN: {}",
        level.columns,
        level.totals.true_positives,
        level.totals.false_positives,
        level.totals.false_negatives
    )
}
