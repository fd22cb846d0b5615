//! Breadth-first multi-path search over the ontology.
//!
//! One work queue holds every open branch. Each branch asks the decision
//! strategy which children of its frontier describe the column and forks once
//! per accepted child. A branch ends when it reaches `max_depth`, when its
//! frontier is a leaf, or when the decision is a no-match; its path is then
//! recorded, even when empty. Cancellation drops every open branch, including
//! the one whose decision was in flight.

use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::cancel::CancellationToken;
use crate::consensus::{Decision, DecisionStrategy};
use crate::ontology::{ClassId, OntologyGraph};
use crate::oracle::ColumnContext;

/// Sequence of class ids from (excluding) the root to the deepest accepted class.
pub type SearchPath = Vec<ClassId>;

#[derive(Debug)]
struct Branch {
    depth: usize,
    frontier: ClassId,
    path: SearchPath,
}

/// Result of searching one column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchOutcome {
    /// Terminal paths in the order branches ended. Duplicates are kept.
    pub paths: Vec<SearchPath>,
    /// Number of decision calls made.
    pub decisions: usize,
    /// Set when the run was cancelled before the queue drained.
    pub cancelled: bool,
}

/// Search driver for one graph and decision strategy.
///
/// All run state lives inside [`PathSearch::run`], so one `PathSearch` can
/// serve any number of columns, also from several threads.
pub struct PathSearch<'a> {
    graph: &'a OntologyGraph,
    strategy: &'a dyn DecisionStrategy,
    max_depth: usize,
    cancel: CancellationToken,
}

impl<'a> PathSearch<'a> {
    pub fn new(graph: &'a OntologyGraph, strategy: &'a dyn DecisionStrategy, max_depth: usize) -> Self {
        Self {
            graph,
            strategy,
            max_depth,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn run(&self, context: &ColumnContext) -> SearchOutcome {
        let mut outcome = SearchOutcome::default();
        let mut queue = VecDeque::from([Branch {
            depth: 0,
            frontier: self.graph.root_id().clone(),
            path: Vec::new(),
        }]);

        while let Some(branch) = queue.pop_front() {
            let children = self.graph.children_of(&branch.frontier);
            if branch.depth >= self.max_depth || children.is_empty() {
                outcome.paths.push(branch.path);
                continue;
            }

            if self.cancel.is_cancelled() {
                debug!(
                    column = %context.column_name,
                    dropped = queue.len() + 1,
                    "Search cancelled"
                );
                outcome.cancelled = true;
                break;
            }

            let candidates: Vec<String> = children
                .iter()
                .filter_map(|child| self.graph.name_of(child))
                .map(str::to_string)
                .collect();

            let decision = self.strategy.decide(context, &candidates);
            outcome.decisions += 1;

            // a decision finished under cancellation may be built from
            // abandoned agents; it must not end the branch
            if self.cancel.is_cancelled() {
                debug!(
                    column = %context.column_name,
                    dropped = queue.len() + 1,
                    "Search cancelled during decision"
                );
                outcome.cancelled = true;
                break;
            }
            debug!(
                column = %context.column_name,
                depth = branch.depth,
                frontier = %branch.frontier,
                candidates = candidates.len(),
                selected = ?decision.selected(),
                "Level decision"
            );

            let names = match decision {
                Decision::NoMatch => {
                    outcome.paths.push(branch.path);
                    continue;
                }
                Decision::Selected(names) => names,
            };

            let mut expanded = 0;
            for name in &names {
                let Some(child) = self.graph.child_by_name(&branch.frontier, name) else {
                    warn!(
                        column = %context.column_name,
                        frontier = %branch.frontier,
                        name = %name,
                        "Accepted class is not a child of the frontier; skipped"
                    );
                    continue;
                };
                let mut path = branch.path.clone();
                path.push(child.clone());
                queue.push_back(Branch {
                    depth: branch.depth + 1,
                    frontier: child.clone(),
                    path,
                });
                expanded += 1;
            }

            // nothing usable was accepted: end the branch where it stands
            if expanded == 0 {
                outcome.paths.push(branch.path);
            }
        }

        outcome
    }
}

/// Maps a path of ids to display names; unknown ids keep their raw id.
pub fn path_names(graph: &OntologyGraph, path: &[ClassId]) -> Vec<String> {
    path.iter()
        .map(|id| graph.name_of(id).unwrap_or(id.as_str()).to_string())
        .collect()
}
