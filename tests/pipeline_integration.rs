//! End-to-end annotation and scoring over the fixture dataset with a
//! scripted oracle standing in for the LLM.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use ontopath::consensus::{EnsembleParams, build_strategy};
use ontopath::data::TableProvider;
use ontopath::eval::{EvaluationRecord, evaluate};
use ontopath::llm::LlmError;
use ontopath::oracle::OracleError;
use ontopath::results;
use ontopath::{
    Annotator, CancellationToken, ColumnContext, Dataset, OntologyGraph, Oracle, PromptMode,
    ontology,
};
use tempfile::TempDir;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn load_fixtures() -> (Dataset, OntologyGraph) {
    let dataset = Dataset::load(&fixture("tables.json"), &fixture("labels.json"))
        .expect("fixture dataset should load");
    let graph = ontology::load(&fixture("ontology.owl")).expect("fixture ontology should load");
    (dataset, graph)
}

/// Knows the right classes for each column and endorses whichever of them
/// it is offered.
struct KnowingOracle {
    truth: HashMap<&'static str, Vec<&'static str>>,
    broken_columns: Vec<&'static str>,
    calls: AtomicUsize,
}

impl KnowingOracle {
    fn new() -> Self {
        let truth = HashMap::from([
            ("name", vec!["Agent", "Person"]),
            ("birthplace", vec!["Place", "City"]),
            ("born", vec!["TemporalEntity", "Instant"]),
            ("company", vec!["Agent", "Organization"]),
            ("country", vec!["Place", "Country"]),
        ]);
        Self {
            truth,
            broken_columns: Vec::new(),
            calls: AtomicUsize::new(0),
        }
    }

    fn failing_on(mut self, column: &'static str) -> Self {
        self.broken_columns.push(column);
        self
    }
}

impl Oracle for KnowingOracle {
    fn query(&self, context: &ColumnContext, candidates: &[String]) -> Result<String, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.broken_columns.contains(&context.column_name.as_str()) {
            return Err(OracleError::Llm(LlmError::Http { status: 503 }));
        }
        let known = self
            .truth
            .get(context.column_name.as_str())
            .cloned()
            .unwrap_or_default();
        let picked: Vec<&str> = candidates
            .iter()
            .map(String::as_str)
            .filter(|c| known.contains(c))
            .collect();
        if picked.is_empty() {
            Ok("<answer>-</answer>".to_string())
        } else {
            Ok(format!("Reasoning first.\n<answer>{}</answer>", picked.join(", ")))
        }
    }
}

fn run_and_score(
    oracle: Arc<KnowingOracle>,
    mode: PromptMode,
) -> (ontopath::EvaluationReport, Vec<EvaluationRecord>) {
    let (dataset, graph) = load_fixtures();
    let strategy = build_strategy(
        mode,
        EnsembleParams::default(),
        Some(11),
        oracle,
        CancellationToken::new(),
    )
    .unwrap();

    let run = Annotator::new(&dataset, &graph, strategy.as_ref())
        .max_depth(2)
        .annotate_all();
    assert!(!run.cancelled);
    assert_eq!(run.predictions.len(), 5);

    // predictions go through disk the way `run` and `eval` hand them over
    let dir = TempDir::new().unwrap();
    results::write_predictions(dir.path(), &run.predictions).unwrap();
    let predictions = results::read_predictions(dir.path()).unwrap();

    let records: Vec<EvaluationRecord> = predictions
        .iter()
        .map(|p| {
            let label = dataset.label_for(&p.table_id, p.column_id).unwrap();
            EvaluationRecord::from_prediction(p, label, &graph)
        })
        .collect();
    (evaluate(&records), records)
}

#[test]
fn test_fixture_ontology_has_expected_shape() {
    let (_, graph) = load_fixtures();
    let stats = graph.stats();
    assert_eq!(stats.classes, 9);
    assert_eq!(stats.max_depth, 2);
    assert_eq!(stats.unreachable, 0);
    assert_eq!(stats.depth_counts.get(&1), Some(&3));
}

#[test]
fn test_single_oracle_run_scores_perfectly() {
    let oracle = Arc::new(KnowingOracle::new());
    let (report, records) = run_and_score(oracle.clone(), PromptMode::Llm);

    assert_eq!(
        records[0].pred_paths,
        vec![vec!["Agent".to_string(), "Person".to_string()]]
    );
    for level in [&report.path, &report.node] {
        assert_eq!(level.macro_avg.f1, 1.0);
        assert_eq!(level.micro_avg.f1, 1.0);
    }
    // two decisions per column
    assert_eq!(oracle.calls.load(Ordering::SeqCst), 10);
}

#[test]
fn test_ensemble_run_reaches_same_annotations() {
    let oracle = Arc::new(KnowingOracle::new());
    let (report, _) = run_and_score(oracle.clone(), PromptMode::Edm);

    assert_eq!(report.path.micro_avg.f1, 1.0);
    assert_eq!(report.node.micro_avg.f1, 1.0);
    assert!(oracle.calls.load(Ordering::SeqCst) > 10);
}

#[test]
fn test_failing_column_is_isolated() {
    let oracle = Arc::new(KnowingOracle::new().failing_on("born"));
    let (report, records) = run_and_score(oracle, PromptMode::Llm);

    let born = records.iter().find(|r| r.column_name == "born").unwrap();
    assert_eq!(born.pred_paths, vec![Vec::<String>::new()]);

    // path level: the empty path is one false positive, the label one false negative
    assert_eq!(report.path.totals.true_positives, 4);
    assert_eq!(report.path.totals.false_positives, 1);
    assert_eq!(report.path.totals.false_negatives, 1);
    assert!((report.path.micro_avg.f1 - 0.8).abs() < 1e-9);
    assert!((report.path.macro_avg.f1 - 0.8).abs() < 1e-9);

    // node level: nothing predicted for the column
    assert_eq!(report.node.micro_avg.precision, 1.0);
    assert!((report.node.micro_avg.recall - 0.8).abs() < 1e-9);
}

#[test]
fn test_results_file_round_trips_report() {
    let oracle = Arc::new(KnowingOracle::new().failing_on("country"));
    let (report, records) = run_and_score(oracle, PromptMode::Cot);

    let dir = TempDir::new().unwrap();
    results::write_results(dir.path(), &records).unwrap();
    results::append_report(dir.path(), &report).unwrap();

    let reread = results::read_results(dir.path()).unwrap();
    assert_eq!(evaluate(&reread), report);

    let text = std::fs::read_to_string(dir.path().join(results::REPORT_FILE)).unwrap();
    assert!(text.contains("Path Level"));
    assert!(text.contains("Node Level"));
}

#[test]
fn test_csv_layout_matches_json_fixtures() {
    let (json, graph) = load_fixtures();
    let csv_dir = fixture("csv");
    let csv = Dataset::load(&csv_dir, &csv_dir.join("ground_truth.csv")).unwrap();
    // a labels directory resolves to its ground_truth.csv
    let by_dir = Dataset::load(&csv_dir, &csv_dir).unwrap();

    assert_eq!(csv.table_count(), json.table_count());
    assert_eq!(csv.get_labels(), json.get_labels());
    assert_eq!(by_dir.get_labels(), json.get_labels());
    for table_id in ["scientists.csv", "companies.csv"] {
        assert_eq!(
            csv.get_table_summary(table_id, 5).unwrap(),
            json.get_table_summary(table_id, 5).unwrap()
        );
        assert_eq!(
            csv.get_table(table_id).unwrap().table_name,
            json.get_table(table_id).unwrap().table_name
        );
    }

    let oracle = Arc::new(KnowingOracle::new());
    let strategy = build_strategy(
        PromptMode::Llm,
        EnsembleParams::default(),
        None,
        oracle,
        CancellationToken::new(),
    )
    .unwrap();
    let run = Annotator::new(&csv, &graph, strategy.as_ref()).annotate_all();
    let records: Vec<EvaluationRecord> = run
        .predictions
        .iter()
        .map(|p| {
            let label = csv.label_for(&p.table_id, p.column_id).unwrap();
            EvaluationRecord::from_prediction(p, label, &graph)
        })
        .collect();
    assert_eq!(evaluate(&records).path.micro_avg.f1, 1.0);
}
