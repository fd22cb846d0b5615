//! Single-oracle decisions: one query sees every candidate.

use std::sync::Arc;

use tracing::{debug, warn};

use super::{Decision, DecisionStrategy, dedup_candidates, in_candidate_order};
use crate::oracle::{Answer, ColumnContext, Oracle, parse_answer, partition_offered};

pub struct SingleOracle {
    oracle: Arc<dyn Oracle>,
}

impl SingleOracle {
    pub fn new(oracle: Arc<dyn Oracle>) -> Self {
        Self { oracle }
    }
}

impl DecisionStrategy for SingleOracle {
    fn decide(&self, context: &ColumnContext, candidates: &[String]) -> Decision {
        if candidates.is_empty() {
            return Decision::NoMatch;
        }
        let candidates = dedup_candidates(candidates);

        let raw = match self.oracle.query(context, &candidates) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(column = %context.column_name, error = %e, "Oracle call failed; treating as no match");
                return Decision::NoMatch;
            }
        };

        let names = match parse_answer(&raw) {
            Ok(Answer::NoMatch) => return Decision::NoMatch,
            Ok(Answer::Selected(names)) => names,
            Err(e) => {
                warn!(column = %context.column_name, error = %e, "Unparsable oracle answer; treating as no match");
                return Decision::NoMatch;
            }
        };

        let (accepted, rejected) = partition_offered(&names, &candidates);
        if !rejected.is_empty() {
            warn!(column = %context.column_name, ?rejected, "Oracle named classes that were not offered");
        }
        debug!(column = %context.column_name, ?accepted, "Single-oracle decision");

        Decision::from_selected(in_candidate_order(&candidates, &accepted))
    }
}
