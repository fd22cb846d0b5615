//! Decision strategies: turn a candidate list into a selected subset.
//!
//! [`SingleOracle`] asks one oracle about every candidate. [`Ensemble`]
//! spreads candidates over several agents and keeps the classes that reach a
//! vote quorum. Both return names in candidate order and never return a name
//! that was not offered.

mod ensemble;
mod sampler;
mod single;

use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;

use crate::cancel::CancellationToken;
use crate::oracle::{ColumnContext, Oracle, PromptMode};

pub use ensemble::{
    AgentPlan, Ensemble, EnsembleParams, plan_assignments, select_by_quorum, tally_votes,
};
pub use sampler::{AgentSampler, RandomSampler};
pub use single::SingleOracle;

#[derive(Debug, Error)]
pub enum ConsensusError {
    #[error("invalid ensemble parameter: {0}")]
    InvalidParameter(String),
}

/// Outcome of one decision call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    NoMatch,
    /// Non-empty, duplicate-free subset of the candidates, in candidate order.
    Selected(Vec<String>),
}

impl Decision {
    /// `NoMatch` when `names` is empty.
    pub fn from_selected(names: Vec<String>) -> Self {
        if names.is_empty() {
            Self::NoMatch
        } else {
            Self::Selected(names)
        }
    }

    pub fn is_no_match(&self) -> bool {
        matches!(self, Self::NoMatch)
    }

    pub fn selected(&self) -> &[String] {
        match self {
            Self::NoMatch => &[],
            Self::Selected(names) => names,
        }
    }
}

/// Chooses which candidate classes describe a column.
///
/// Decisions never fail: oracle errors and unusable answers degrade to
/// [`Decision::NoMatch`] after being logged.
pub trait DecisionStrategy: Send + Sync {
    fn decide(&self, context: &ColumnContext, candidates: &[String]) -> Decision;
}

/// Drops repeated names, keeping the first occurrence.
pub(crate) fn dedup_candidates(candidates: &[String]) -> Vec<String> {
    let mut seen = HashSet::with_capacity(candidates.len());
    candidates
        .iter()
        .filter(|c| seen.insert(c.as_str()))
        .cloned()
        .collect()
}

/// The `accepted` names, reordered to follow `candidates`.
pub(crate) fn in_candidate_order(candidates: &[String], accepted: &[&str]) -> Vec<String> {
    candidates
        .iter()
        .filter(|c| accepted.contains(&c.as_str()))
        .cloned()
        .collect()
}

/// Strategy for a prompt mode: the ensemble for `edm`, a single oracle otherwise.
///
/// # Errors
///
/// Returns [`ConsensusError::InvalidParameter`] when ensemble parameters are
/// out of range. Parameters are validated only for the ensemble mode.
pub fn build_strategy(
    mode: PromptMode,
    params: EnsembleParams,
    seed: Option<u64>,
    oracle: Arc<dyn Oracle>,
    cancel: CancellationToken,
) -> Result<Box<dyn DecisionStrategy>, ConsensusError> {
    if mode.is_ensemble() {
        let ensemble = Ensemble::with_seed(oracle, params, seed)?.with_cancellation(cancel);
        Ok(Box::new(ensemble))
    } else {
        Ok(Box::new(SingleOracle::new(oracle)))
    }
}
