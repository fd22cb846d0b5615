//! Oracle backed by an LLM client.

use std::sync::Arc;

use super::prompt::PromptMode;
use super::{ColumnContext, Oracle, OracleError};
use crate::llm::LlmClient;

/// Renders a prompt for the configured mode and forwards it to an `LlmClient`.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use ontopath::llm::OllamaClientBuilder;
/// use ontopath::oracle::{ColumnContext, LlmOracle, Oracle, PromptMode};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = OllamaClientBuilder::new().model("llama3.1:8b").build()?;
/// let oracle = LlmOracle::new(Arc::new(client), PromptMode::Llm);
///
/// let context = ColumnContext {
///     table_name: "employees".to_string(),
///     table_summary: "| name | born |\n| --- | --- |\n| Ada | 1815 |".to_string(),
///     column_name: "born".to_string(),
/// };
/// let raw = oracle.query(&context, &["Date".to_string(), "Person".to_string()])?;
/// println!("{raw}");
/// # Ok(())
/// # }
/// ```
pub struct LlmOracle {
    client: Arc<dyn LlmClient>,
    mode: PromptMode,
}

impl LlmOracle {
    #[must_use]
    pub fn new(client: Arc<dyn LlmClient>, mode: PromptMode) -> Self {
        Self { client, mode }
    }

    pub fn mode(&self) -> PromptMode {
        self.mode
    }
}

impl Oracle for LlmOracle {
    fn query(&self, context: &ColumnContext, candidates: &[String]) -> Result<String, OracleError> {
        let prompt = self.mode.render(context, candidates);
        Ok(self.client.complete(&prompt)?)
    }
}
