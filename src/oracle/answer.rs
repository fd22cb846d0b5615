//! Parser for the `<answer>…</answer>` block in oracle output.
//!
//! Grammar:
//!
//! ```text
//! answer := "<answer>" body "</answer>"
//! body   := "-" | name ("," name)*
//! ```
//!
//! Text outside the first answer block (reasoning, chatter) is ignored.
//! Surrounding whitespace is trimmed from the body and from each name; empty
//! elements between commas are dropped. Names are otherwise kept verbatim.

use std::collections::HashSet;

use thiserror::Error;

const OPEN: &str = "<answer>";
const CLOSE: &str = "</answer>";
const NO_MATCH: &str = "-";

/// Parsed oracle answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    /// The oracle found no suitable class.
    NoMatch,
    /// Class names as written by the oracle, in answer order, deduplicated.
    Selected(Vec<String>),
}

/// Why an oracle answer could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnswerError {
    #[error("no <answer> block in oracle output")]
    MissingOpenTag,

    #[error("<answer> block is not closed")]
    MissingCloseTag,

    #[error("<answer> block is empty")]
    EmptyBody,
}

/// Parses the first `<answer>` block in `raw`.
///
/// ```
/// use ontopath::oracle::{parse_answer, Answer};
///
/// let raw = "<reasoning>dates</reasoning><answer>Date, Time</answer>";
/// assert_eq!(
///     parse_answer(raw).unwrap(),
///     Answer::Selected(vec!["Date".to_string(), "Time".to_string()])
/// );
/// assert_eq!(parse_answer("<answer>-</answer>").unwrap(), Answer::NoMatch);
/// ```
pub fn parse_answer(raw: &str) -> Result<Answer, AnswerError> {
    let start = raw.find(OPEN).ok_or(AnswerError::MissingOpenTag)? + OPEN.len();
    let len = raw[start..].find(CLOSE).ok_or(AnswerError::MissingCloseTag)?;
    let body = raw[start..start + len].trim();

    if body == NO_MATCH {
        return Ok(Answer::NoMatch);
    }

    let mut seen = HashSet::new();
    let names: Vec<String> = body
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .filter(|name| seen.insert(*name))
        .map(str::to_string)
        .collect();

    if names.is_empty() {
        return Err(AnswerError::EmptyBody);
    }
    Ok(Answer::Selected(names))
}

/// Splits answered names into those offered as candidates and those that were not.
///
/// Matching is exact and case-sensitive. The returned pair is
/// `(accepted, rejected)`, both in answer order.
pub fn partition_offered<'a>(
    names: &'a [String],
    offered: &[String],
) -> (Vec<&'a str>, Vec<&'a str>) {
    names
        .iter()
        .map(String::as_str)
        .partition(|name| offered.iter().any(|c| c.as_str() == *name))
}
