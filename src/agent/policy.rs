use ndarray::ArrayView1;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{DuelError, Result};
use crate::network::DuelingNetwork;

/// Epsilon-greedy action selection with an episode-driven exploration schedule.
pub struct EpsilonGreedy {
    n_actions: usize,
    rng: StdRng,
}

impl EpsilonGreedy {
    pub fn new(n_actions: usize) -> Self {
        EpsilonGreedy { n_actions, rng: StdRng::from_entropy() }
    }

    pub fn with_seed(n_actions: usize, seed: u64) -> Self {
        EpsilonGreedy { n_actions, rng: StdRng::seed_from_u64(seed) }
    }

    /// `1 / (episode / 5 + 1)`: 1 at episode 0, decaying towards (never reaching) 0.
    pub fn epsilon(episode: u64) -> f64 {
        1.0 / (episode as f64 / 5.0 + 1.0)
    }

    pub fn select_action(&mut self, estimator: &DuelingNetwork, state: ArrayView1<f32>, episode: u64) -> Result<usize> {
        if self.rng.gen::<f64>() < Self::epsilon(episode) {
            return Ok(self.rng.gen_range(0..self.n_actions));
        }
        let q_values = estimator.evaluate(state)?;
        if q_values.iter().any(|q| !q.is_finite()) {
            return Err(DuelError::Numerical(format!("non-finite Q-values {}", q_values)));
        }
        greedy_action(q_values.view())
            .ok_or_else(|| DuelError::Numerical("no Q-values to choose from".to_string()))
    }
}

/// Index of the largest value; ties go to the first index.
pub fn greedy_action(q_values: ArrayView1<f32>) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (action, &q) in q_values.iter().enumerate() {
        match best {
            Some((_, best_q)) if q <= best_q => {}
            _ => best = Some((action, q)),
        }
    }
    best.map(|(action, _)| action)
}
