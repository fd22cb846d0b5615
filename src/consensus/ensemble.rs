//! Multi-agent ensemble decisions.
//!
//! Candidates are sharded across simulated agents so that each candidate is
//! shown to about `avg_agents_per_class` agents and each agent sees about
//! `avg_classes_per_agent` candidates. Every agent is one oracle query over
//! its own share. A candidate is accepted when the fraction of agents that
//! saw it and voted for it reaches `consensus_threshold_ratio`.
//!
//! Agent queries run on worker threads, at most `max_concurrency` at a time.
//! A query that fails, times out, or returns an unparsable answer counts as
//! an abstention for that agent only.

use std::collections::HashSet;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::sampler::{AgentSampler, RandomSampler};
use super::{ConsensusError, Decision, DecisionStrategy, dedup_candidates};
use crate::cancel::CancellationToken;
use crate::oracle::{Answer, ColumnContext, Oracle, OracleError, parse_answer};

/// Upper bound on a single wait, so cancellation is noticed promptly.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Tuning knobs of the ensemble.
#[derive(Debug, Clone, PartialEq)]
pub struct EnsembleParams {
    /// Target number of candidates shown to each agent.
    pub avg_classes_per_agent: usize,
    /// Target number of agents that see each candidate.
    pub avg_agents_per_class: usize,
    /// Fraction of informed agents that must endorse a candidate, in `[0, 1]`.
    pub consensus_threshold_ratio: f64,
    /// Maximum agent queries in flight at once.
    pub max_concurrency: usize,
    /// How long to wait for an agent before counting it as an abstention.
    pub agent_timeout: Option<Duration>,
}

impl Default for EnsembleParams {
    fn default() -> Self {
        Self {
            avg_classes_per_agent: 5,
            avg_agents_per_class: 3,
            consensus_threshold_ratio: 0.5,
            max_concurrency: 4,
            agent_timeout: Some(Duration::from_secs(120)),
        }
    }
}

impl EnsembleParams {
    /// # Errors
    ///
    /// Rejects zero agent parameters, zero concurrency, and ratios outside `[0, 1]`.
    pub fn validate(&self) -> Result<(), ConsensusError> {
        if self.avg_classes_per_agent == 0 {
            return Err(ConsensusError::InvalidParameter(
                "avg_classes_per_agent must be at least 1".to_string(),
            ));
        }
        if self.avg_agents_per_class == 0 {
            return Err(ConsensusError::InvalidParameter(
                "avg_agents_per_class must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.consensus_threshold_ratio) {
            return Err(ConsensusError::InvalidParameter(format!(
                "consensus_threshold_ratio must be within [0, 1], got {}",
                self.consensus_threshold_ratio
            )));
        }
        if self.max_concurrency == 0 {
            return Err(ConsensusError::InvalidParameter(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// `max(A, floor(n * A / C) + 1)` agents for `n` candidates.
    pub fn agent_count(&self, num_candidates: usize) -> usize {
        let a = self.avg_agents_per_class;
        let c = self.avg_classes_per_agent.max(1);
        a.max(num_candidates * a / c + 1)
    }
}

/// Candidate shares for one decision call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentPlan {
    /// Candidate indices shown to each agent, ascending.
    pub assignments: Vec<Vec<usize>>,
    /// Number of distinct agents that saw each candidate.
    pub exposure: Vec<usize>,
}

impl AgentPlan {
    pub fn num_agents(&self) -> usize {
        self.assignments.len()
    }

    /// Agents that were shown at least one candidate.
    pub fn active_agents(&self) -> impl Iterator<Item = usize> + '_ {
        self.assignments
            .iter()
            .enumerate()
            .filter(|(_, shown)| !shown.is_empty())
            .map(|(agent, _)| agent)
    }
}

/// Assigns each of `num_candidates` candidates to a set of agents.
pub fn plan_assignments(
    num_candidates: usize,
    params: &EnsembleParams,
    sampler: &mut dyn AgentSampler,
) -> AgentPlan {
    let num_agents = params.agent_count(num_candidates);
    let mut assignments: Vec<Vec<usize>> = vec![Vec::new(); num_agents];

    for candidate in 0..num_candidates {
        // agent_count() never returns fewer than avg_agents_per_class agents
        let mut agents = sampler.sample(num_agents, params.avg_agents_per_class);
        agents.retain(|&agent| agent < num_agents);
        agents.sort_unstable();
        agents.dedup();
        for agent in agents {
            assignments[agent].push(candidate);
        }
    }

    let mut exposure = vec![0; num_candidates];
    for shown in &assignments {
        for &candidate in shown {
            exposure[candidate] += 1;
        }
    }

    AgentPlan {
        assignments,
        exposure,
    }
}

/// Counts valid votes per candidate.
///
/// An agent's vote only counts for candidates it was shown; anything else is
/// logged and ignored. Failed or unparsable responses contribute nothing.
pub fn tally_votes(
    candidates: &[String],
    plan: &AgentPlan,
    responses: &[(usize, Result<String, OracleError>)],
) -> Vec<usize> {
    let mut votes = vec![0; candidates.len()];

    for (agent, response) in responses {
        let Some(shown) = plan.assignments.get(*agent) else {
            warn!(agent, "Response from unknown agent ignored");
            continue;
        };
        let raw = match response {
            Ok(raw) => raw,
            Err(e) => {
                warn!(agent, error = %e, "Agent abstained");
                continue;
            }
        };
        match parse_answer(raw) {
            Ok(Answer::NoMatch) => {}
            Ok(Answer::Selected(names)) => {
                for name in names {
                    match shown.iter().find(|&&c| candidates[c] == name) {
                        Some(&candidate) => votes[candidate] += 1,
                        None => warn!(agent, name = %name, "Agent voted for a class it was not shown"),
                    }
                }
            }
            Err(e) => warn!(agent, error = %e, "Unparsable agent answer counted as abstention"),
        }
    }
    votes
}

/// Indices of candidates that reach the quorum.
///
/// A candidate needs at least one exposure, at least one vote, and
/// `votes / exposure >= ratio`.
pub fn select_by_quorum(votes: &[usize], exposure: &[usize], ratio: f64) -> Vec<usize> {
    votes
        .iter()
        .zip(exposure)
        .enumerate()
        .filter(|(_, (v, e))| **e > 0 && **v > 0 && (**v as f64 / **e as f64) >= ratio)
        .map(|(i, _)| i)
        .collect()
}

/// Ensemble decision strategy.
pub struct Ensemble {
    oracle: Arc<dyn Oracle>,
    params: EnsembleParams,
    sampler: Mutex<Box<dyn AgentSampler>>,
    cancel: CancellationToken,
}

impl Ensemble {
    /// # Errors
    ///
    /// Fails when `params` do not validate.
    pub fn new(
        oracle: Arc<dyn Oracle>,
        params: EnsembleParams,
        sampler: Box<dyn AgentSampler>,
    ) -> Result<Self, ConsensusError> {
        params.validate()?;
        Ok(Self {
            oracle,
            params,
            sampler: Mutex::new(sampler),
            cancel: CancellationToken::new(),
        })
    }

    /// Ensemble with a [`RandomSampler`], seeded when `seed` is given.
    pub fn with_seed(
        oracle: Arc<dyn Oracle>,
        params: EnsembleParams,
        seed: Option<u64>,
    ) -> Result<Self, ConsensusError> {
        Self::new(oracle, params, Box::new(RandomSampler::new(seed)))
    }

    /// Abandons pending agent queries once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn params(&self) -> &EnsembleParams {
        &self.params
    }

    fn plan(&self, num_candidates: usize) -> AgentPlan {
        let mut sampler = self
            .sampler
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        plan_assignments(num_candidates, &self.params, sampler.as_mut())
    }

    /// Queries every active agent, in waves of `max_concurrency`.
    ///
    /// Each response is tagged with its agent index. Agents that do not answer
    /// before the timeout, or before cancellation, get an error entry.
    fn query_agents(
        &self,
        context: &ColumnContext,
        candidates: &[String],
        plan: &AgentPlan,
    ) -> Vec<(usize, Result<String, OracleError>)> {
        let jobs: Vec<(usize, Vec<String>)> = plan
            .active_agents()
            .map(|agent| {
                let shown = plan.assignments[agent]
                    .iter()
                    .map(|&c| candidates[c].clone())
                    .collect();
                (agent, shown)
            })
            .collect();

        let context = Arc::new(context.clone());
        let mut responses = Vec::with_capacity(jobs.len());

        for wave in jobs.chunks(self.params.max_concurrency) {
            if self.cancel.is_cancelled() {
                responses.extend(wave.iter().map(|(agent, _)| (*agent, Err(OracleError::Cancelled))));
                continue;
            }

            let (tx, rx) = mpsc::channel();
            let mut pending = HashSet::new();
            for (agent, shown) in wave {
                let agent = *agent;
                let tx = tx.clone();
                let oracle = Arc::clone(&self.oracle);
                let context = Arc::clone(&context);
                let shown = shown.clone();
                let spawned = thread::Builder::new()
                    .name(format!("agent-{agent}"))
                    .spawn(move || {
                        let result = oracle.query(&context, &shown);
                        // the collector may have given up on us already
                        let _ = tx.send((agent, result));
                    });
                match spawned {
                    Ok(_) => {
                        pending.insert(agent);
                    }
                    Err(e) => {
                        warn!(agent, error = %e, "Could not start agent worker");
                        responses.push((agent, Err(OracleError::WorkerLost)));
                    }
                }
            }
            drop(tx);

            let deadline = self.params.agent_timeout.map(|t| Instant::now() + t);
            while !pending.is_empty() && !self.cancel.is_cancelled() {
                let wait = match deadline {
                    Some(deadline) => {
                        let now = Instant::now();
                        if now >= deadline {
                            break;
                        }
                        (deadline - now).min(POLL_INTERVAL)
                    }
                    None => POLL_INTERVAL,
                };
                match rx.recv_timeout(wait) {
                    Ok((agent, result)) => {
                        if pending.remove(&agent) {
                            responses.push((agent, result));
                        }
                    }
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }

            let cancelled = self.cancel.is_cancelled();
            let expired = deadline.is_some_and(|d| Instant::now() >= d);
            let mut missing: Vec<usize> = pending.into_iter().collect();
            missing.sort_unstable();
            for agent in missing {
                let error = match self.params.agent_timeout {
                    _ if cancelled => OracleError::Cancelled,
                    Some(timeout) if expired => OracleError::TimedOut(timeout),
                    _ => OracleError::WorkerLost,
                };
                responses.push((agent, Err(error)));
            }
        }
        responses
    }
}

impl DecisionStrategy for Ensemble {
    fn decide(&self, context: &ColumnContext, candidates: &[String]) -> Decision {
        if candidates.is_empty() {
            return Decision::NoMatch;
        }
        let candidates = dedup_candidates(candidates);

        let plan = self.plan(candidates.len());
        let responses = self.query_agents(context, &candidates, &plan);
        let votes = tally_votes(&candidates, &plan, &responses);
        let selected = select_by_quorum(&votes, &plan.exposure, self.params.consensus_threshold_ratio);

        debug!(
            column = %context.column_name,
            candidates = candidates.len(),
            agents = plan.num_agents(),
            responses = responses.iter().filter(|(_, r)| r.is_ok()).count(),
            ?votes,
            exposure = ?plan.exposure,
            selected = selected.len(),
            "Ensemble decision"
        );

        Decision::from_selected(selected.into_iter().map(|i| candidates[i].clone()).collect())
    }
}
