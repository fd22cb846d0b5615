//! Runs the path search for every labelled column of a dataset.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cancel::CancellationToken;
use crate::consensus::DecisionStrategy;
use crate::data::{LabelRecord, TableProvider};
use crate::ontology::{ClassId, OntologyGraph};
use crate::oracle::ColumnContext;
use crate::search::PathSearch;

/// Terminal search paths of one column, as class ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub table_id: String,
    pub table_name: String,
    pub column_id: u32,
    pub column_name: String,
    pub paths: Vec<Vec<ClassId>>,
}

/// Predictions of a run over many columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotationRun {
    pub predictions: Vec<PredictionRecord>,
    /// Set when cancellation stopped the run before every column was searched.
    pub cancelled: bool,
}

pub struct Annotator<'a> {
    provider: &'a dyn TableProvider,
    graph: &'a OntologyGraph,
    strategy: &'a dyn DecisionStrategy,
    max_depth: usize,
    sample_rows: usize,
    cancel: CancellationToken,
}

impl<'a> Annotator<'a> {
    pub fn new(
        provider: &'a dyn TableProvider,
        graph: &'a OntologyGraph,
        strategy: &'a dyn DecisionStrategy,
    ) -> Self {
        Self {
            provider,
            graph,
            strategy,
            max_depth: 2,
            sample_rows: 5,
            cancel: CancellationToken::new(),
        }
    }

    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Rows of the table shown to the oracle.
    pub fn sample_rows(mut self, k: usize) -> Self {
        self.sample_rows = k;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Searches one labelled column.
    ///
    /// A column whose table cannot be found yields an empty prediction; the
    /// failure is logged and does not affect other columns. The flag is set
    /// when cancellation cut the search short.
    pub fn annotate_column(&self, label: &LabelRecord) -> (PredictionRecord, bool) {
        let mut record = PredictionRecord {
            table_id: label.table_id.clone(),
            table_name: String::new(),
            column_id: label.column_id,
            column_name: label.column_name.clone(),
            paths: Vec::new(),
        };

        let table = match self.provider.get_table(&label.table_id) {
            Ok(table) => table,
            Err(e) => {
                warn!(
                    table_id = %label.table_id,
                    column = %label.column_name,
                    error = %e,
                    "Skipping column"
                );
                return (record, false);
            }
        };
        record.table_name = table.table_name.clone();

        let context = ColumnContext {
            table_name: table.table_name.clone(),
            table_summary: table.to_markdown(self.sample_rows),
            column_name: label.column_name.clone(),
        };
        let outcome = PathSearch::new(self.graph, self.strategy, self.max_depth)
            .with_cancellation(self.cancel.clone())
            .run(&context);

        info!(
            table_id = %label.table_id,
            column = %label.column_name,
            paths = outcome.paths.len(),
            decisions = outcome.decisions,
            "Annotated column"
        );
        record.paths = outcome.paths;
        (record, outcome.cancelled)
    }

    /// Searches every labelled column in label order.
    pub fn annotate_all(&self) -> AnnotationRun {
        let labels = self.provider.get_labels();
        let mut run = AnnotationRun::default();

        for (i, label) in labels.iter().enumerate() {
            if self.cancel.is_cancelled() {
                run.cancelled = true;
                break;
            }
            let (record, cancelled) = self.annotate_column(label);
            run.predictions.push(record);
            if cancelled {
                run.cancelled = true;
                break;
            }
            info!(done = i + 1, total = labels.len(), "Progress");
        }

        if run.cancelled {
            warn!(
                done = run.predictions.len(),
                total = labels.len(),
                "Annotation cancelled"
            );
        }
        run
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::Decision;
    use crate::data::{Dataset, Table};
    use crate::ontology::{OWL_THING, OntologyGraphBuilder, OntologyNode};
    use serde_json::json;
    use std::sync::Mutex;

    struct Recording {
        contexts: Mutex<Vec<ColumnContext>>,
    }

    impl DecisionStrategy for Recording {
        fn decide(&self, context: &ColumnContext, candidates: &[String]) -> Decision {
            self.contexts.lock().unwrap().push(context.clone());
            Decision::from_selected(candidates.iter().take(1).cloned().collect())
        }
    }

    fn graph() -> OntologyGraph {
        OntologyGraphBuilder::new()
            .root(OntologyNode::new(OWL_THING, "Thing"))
            .class(OntologyNode::new("ex:Agent", "Agent"))
            .class(OntologyNode::new("ex:Person", "Person"))
            .edge(OWL_THING, "ex:Agent")
            .edge("ex:Agent", "ex:Person")
            .build()
            .unwrap()
    }

    fn label(table_id: &str, column_id: u32, column_name: &str) -> LabelRecord {
        LabelRecord {
            table_id: table_id.to_string(),
            column_id,
            column_name: column_name.to_string(),
            class1_level1_name: None,
            class1_level2_name: None,
            class2_level1_name: None,
            class2_level2_name: None,
        }
    }

    fn dataset() -> Dataset {
        let table = Table {
            table_id: "t1".to_string(),
            table_name: "people".to_string(),
            columns: vec!["name".to_string()],
            rows: vec![vec![json!("Ada")], vec![json!("Alan")]],
        };
        Dataset::new(
            vec![table],
            vec![label("missing", 0, "x"), label("t1", 0, "name")],
        )
        .unwrap()
    }

    #[test]
    fn test_missing_table_is_isolated() {
        let data = dataset();
        let g = graph();
        let strategy = Recording {
            contexts: Mutex::new(Vec::new()),
        };
        let run = Annotator::new(&data, &g, &strategy)
            .max_depth(3)
            .sample_rows(1)
            .annotate_all();

        assert!(!run.cancelled);
        assert_eq!(run.predictions.len(), 2);
        assert!(run.predictions[0].paths.is_empty());
        assert_eq!(
            run.predictions[1].paths,
            vec![vec![ClassId::from("ex:Agent"), ClassId::from("ex:Person")]]
        );
        assert_eq!(run.predictions[1].table_name, "people");

        let contexts = strategy.contexts.lock().unwrap();
        assert_eq!(contexts.len(), 2);
        assert_eq!(contexts[0].table_summary, "| name |\n| --- |\n| Ada |");
    }

    #[test]
    fn test_cancelled_run_stops_early() {
        let data = dataset();
        let g = graph();
        let strategy = Recording {
            contexts: Mutex::new(Vec::new()),
        };
        let token = CancellationToken::new();
        token.cancel();
        let run = Annotator::new(&data, &g, &strategy)
            .with_cancellation(token)
            .annotate_all();
        assert!(run.cancelled);
        assert!(run.predictions.is_empty());
        assert!(strategy.contexts.lock().unwrap().is_empty());
    }
}
