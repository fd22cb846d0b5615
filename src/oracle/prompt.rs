//! Prompt templates for column-to-class decisions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::ColumnContext;
use crate::llm::Prompt;

const SYSTEM_PROMPT: &str = "You map columns of tabular data to ontology classes. \
You are an expert in semantic table annotation. Choose the ontology class or classes \
that best describe the meaning of a column, using the table name, its header, the \
sample rows, the column name, and the candidate classes you are given.";

/// Shared body; `{instructions}` differs per mode.
const USER_TEMPLATE: &str = r#"Table '{table_name}' has the following header and sample rows (Markdown):

{table}

Candidate ontology classes at the current level of the hierarchy:
{candidates}

Which of these classes best describe the column '{column_name}'?

INSTRUCTIONS:
1. Look at the column name and its sample values.
2. Pick every candidate class that describes the column, or is an ancestor of a class that does.
{instructions}
ANSWER FORMAT:
- Wrap the final answer in <answer></answer> tags.
- Separate several classes with commas: <answer>ClassA, ClassB</answer>
- Copy class names exactly as listed above.
- If no candidate fits, answer <answer>-</answer>
"#;

const DIRECT_INSTRUCTIONS: &str = "3. Reply with the answer block only.\n";

const COT_INSTRUCTIONS: &str = "3. First explain your reasoning inside <reasoning></reasoning> tags, then give the answer block.\n";

const ENSEMBLE_INSTRUCTIONS: &str = "3. You are shown only part of the classes at this level. If none of them fit, say so; another reviewer sees the rest.\n4. Reply with the answer block only.\n";

/// How the oracle is prompted, and by extension which decision strategy runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptMode {
    /// One oracle call sees every candidate.
    Llm,
    /// Like `Llm`, but asks for reasoning before the answer.
    Cot,
    /// Ensemble agent that sees a random share of the candidates.
    Edm,
}

impl PromptMode {
    pub fn as_str(self) -> &'static str {
        match self {
            PromptMode::Llm => "llm",
            PromptMode::Cot => "cot",
            PromptMode::Edm => "edm",
        }
    }

    pub fn is_ensemble(self) -> bool {
        self == PromptMode::Edm
    }

    fn instructions(self) -> &'static str {
        match self {
            PromptMode::Llm => DIRECT_INSTRUCTIONS,
            PromptMode::Cot => COT_INSTRUCTIONS,
            PromptMode::Edm => ENSEMBLE_INSTRUCTIONS,
        }
    }

    /// Renders the prompt for one decision over `candidates`.
    pub fn render(self, context: &ColumnContext, candidates: &[String]) -> Prompt {
        let candidates = candidates.join(", ");
        let user = fill(
            USER_TEMPLATE,
            &[
                ("instructions", self.instructions()),
                ("candidates", &candidates),
                ("table_name", &context.table_name),
                ("column_name", &context.column_name),
                ("table", &context.table_summary),
            ],
        );
        Prompt {
            system: SYSTEM_PROMPT.to_string(),
            user,
        }
    }
}

/// Single-pass `{key}` substitution, so values containing braces stay literal.
fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let hit = values.iter().find(|(key, _)| {
            tail[1..].starts_with(key) && tail[1 + key.len()..].starts_with('}')
        });
        match hit {
            Some((key, value)) => {
                out.push_str(value);
                rest = &tail[key.len() + 2..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

impl fmt::Display for PromptMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PromptMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "llm" => Ok(PromptMode::Llm),
            "cot" => Ok(PromptMode::Cot),
            "edm" => Ok(PromptMode::Edm),
            other => Err(format!("unknown mode '{other}' (expected llm, cot or edm)")),
        }
    }
}
