pub mod annotate;
pub mod cancel;
pub mod config;
pub mod consensus;
pub mod data;
pub mod eval;
pub mod llm;
pub mod ontology;
pub mod oracle;
pub mod results;
pub mod search;

pub use annotate::{AnnotationRun, Annotator, PredictionRecord};
pub use cancel::CancellationToken;
pub use config::Config;
pub use consensus::{Decision, DecisionStrategy, Ensemble, EnsembleParams, SingleOracle};
pub use data::{Dataset, LabelRecord, Table, TableProvider};
pub use eval::{EvaluationRecord, EvaluationReport, evaluate};
pub use ontology::{ClassId, OntologyGraph, OntologyNode};
pub use oracle::{ColumnContext, LlmOracle, Oracle, PromptMode};
pub use search::{PathSearch, SearchOutcome};
