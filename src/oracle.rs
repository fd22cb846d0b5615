//! The oracle: a black box asked which candidate classes describe a column.
//!
//! An oracle receives the column context and an ordered list of candidate
//! class names and returns raw text. Callers extract the decision with
//! [`parse_answer`], which understands the `<answer>…</answer>` grammar, and
//! must discard any name that was not offered.

mod answer;
mod llm_oracle;
mod prompt;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::llm::LlmError;

pub use answer::{Answer, AnswerError, parse_answer, partition_offered};
pub use llm_oracle::LlmOracle;
pub use prompt::PromptMode;

/// What the oracle knows about the column being annotated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnContext {
    pub table_name: String,
    /// Rendered table snippet (header plus a few rows).
    pub table_summary: String,
    pub column_name: String,
}

/// Why an oracle call produced no usable text.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("LLM request failed: {0}")]
    Llm(#[from] LlmError),

    #[error("oracle call timed out after {0:?}")]
    TimedOut(Duration),

    #[error("oracle call abandoned: run cancelled")]
    Cancelled,

    #[error("oracle worker exited without answering")]
    WorkerLost,
}

/// A source of class judgements for a column.
///
/// Implementations must be shareable across threads; the ensemble strategy
/// may query one oracle from several agents at once.
pub trait Oracle: Send + Sync {
    /// Asks which of `candidates` describe the column; returns the raw answer text.
    fn query(&self, context: &ColumnContext, candidates: &[String]) -> Result<String, OracleError>;
}
