//! Random sources for assigning candidates to agents.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::index;

/// Chooses which agents see a candidate.
///
/// Injected into the ensemble so tests can supply fixed assignments.
pub trait AgentSampler: Send {
    /// Returns `amount` distinct agent indices from `0..num_agents`.
    ///
    /// Callers guarantee `amount <= num_agents`.
    fn sample(&mut self, num_agents: usize, amount: usize) -> Vec<usize>;
}

/// Uniform sampling without replacement.
#[derive(Debug, Clone)]
pub struct RandomSampler {
    rng: StdRng,
}

impl RandomSampler {
    /// Reproducible sampler for a fixed seed.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Seeded when `seed` is given, otherwise from OS entropy.
    pub fn new(seed: Option<u64>) -> Self {
        seed.map_or_else(Self::from_entropy, Self::seeded)
    }
}

impl AgentSampler for RandomSampler {
    fn sample(&mut self, num_agents: usize, amount: usize) -> Vec<usize> {
        index::sample(&mut self.rng, num_agents, amount.min(num_agents)).into_vec()
    }
}
