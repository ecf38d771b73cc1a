use ndarray::{Array1, Array2};
use std::path::Path;
use tracing::debug;

use crate::error::{DuelError, Result};
use crate::loss::{l2_penalty, Loss, MSE, L2_COEFFICIENT};
use crate::network::DuelingNetwork;
use crate::optimizer::{Optimizer, OptimizerWrapper};
use crate::replay_buffer::Transition;

/// Trains the online network against bootstrapped targets from a periodically
/// refreshed target network.
pub struct Learner {
    online: DuelingNetwork,
    target: DuelingNetwork,
    optimizer: OptimizerWrapper,
    gamma: f32,
    learning_rate: f32,
    update_period: u64,
    total_updates: u64,
}

impl Learner {
    /// The target network starts as an exact copy of `online`.
    pub fn new(
        online: DuelingNetwork,
        optimizer: OptimizerWrapper,
        gamma: f32,
        learning_rate: f32,
        update_period: u64,
    ) -> Result<Self> {
        if update_period == 0 {
            return Err(DuelError::invalid_parameter("update_period", "must be greater than 0"));
        }
        let target = online.clone();
        Ok(Learner {
            online,
            target,
            optimizer,
            gamma,
            learning_rate,
            update_period,
            total_updates: 0,
        })
    }

    /// Resume from previously saved online and target networks.
    pub fn with_target(mut self, target: DuelingNetwork) -> Result<Self> {
        self.target.clone_parameters_from(&target)?;
        Ok(self)
    }

    pub fn online(&self) -> &DuelingNetwork {
        &self.online
    }

    pub fn target(&self) -> &DuelingNetwork {
        &self.target
    }

    pub fn total_updates(&self) -> u64 {
        self.total_updates
    }

    pub fn update_period(&self) -> u64 {
        self.update_period
    }

    /// One gradient step on `batch`. Returns the loss, L2 penalty included.
    pub fn train_step(&mut self, batch: &[&Transition]) -> Result<f32> {
        let first = batch
            .first()
            .ok_or_else(|| DuelError::Training("cannot train on an empty batch".to_string()))?;
        let n_states = self.online.n_states();
        let n_actions = self.online.n_actions();
        if first.state.len() != n_states {
            return Err(DuelError::dimension_mismatch(
                format!("{} state features", n_states),
                format!("{} state features", first.state.len()),
            ));
        }

        let batch_size = batch.len();
        let mut states = Array2::zeros((batch_size, n_states));
        let mut next_states = Array2::zeros((batch_size, n_states));
        for (i, transition) in batch.iter().enumerate() {
            if transition.state.len() != n_states || transition.next_state.len() != n_states {
                return Err(DuelError::dimension_mismatch(
                    format!("{} state features", n_states),
                    format!("{}/{} state features", transition.state.len(), transition.next_state.len()),
                ));
            }
            if transition.action >= n_actions {
                return Err(DuelError::InvalidAction { action: transition.action, n_actions });
            }
            states.row_mut(i).assign(&transition.state);
            next_states.row_mut(i).assign(&transition.next_state);
        }

        let next_q_values = self.target.evaluate_batch(next_states.view())?;
        let targets: Array1<f32> = batch
            .iter()
            .zip(next_q_values.rows())
            .map(|(transition, next_q)| {
                let max_next_q = next_q.iter().fold(f32::NEG_INFINITY, |max, &q| max.max(q));
                let continuing = if transition.done { 0.0 } else { 1.0 };
                transition.reward + self.gamma * max_next_q * continuing
            })
            .collect();

        let q_values = self.online.forward_batch(states.view())?;
        let predicted: Array1<f32> = batch
            .iter()
            .enumerate()
            .map(|(i, transition)| q_values[[i, transition.action]])
            .collect();

        let mse = MSE.compute(predicted.view(), targets.view());
        let loss = mse + l2_penalty(self.online.sum_squared_parameters(), L2_COEFFICIENT);
        if !loss.is_finite() {
            return Err(DuelError::Numerical(format!("non-finite training loss {}", loss)));
        }

        // Only the stored action's Q-value receives error.
        let prediction_errors = MSE.gradient(predicted.view(), targets.view());
        let mut q_errors = Array2::zeros((batch_size, n_actions));
        for (i, transition) in batch.iter().enumerate() {
            q_errors[[i, transition.action]] = prediction_errors[i];
        }

        let mut gradients = self.online.backward_batch(q_errors.view())?;
        gradients.add_l2(&self.online, L2_COEFFICIENT);

        self.optimizer.begin_step();
        for (slot, (layer, (weight_grads, bias_grads))) in self
            .online
            .layers_mut()
            .into_iter()
            .zip(gradients.layers.iter())
            .enumerate()
        {
            self.optimizer.update_weights(slot, &mut layer.weights, weight_grads, self.learning_rate);
            self.optimizer.update_biases(slot, &mut layer.biases, bias_grads, self.learning_rate);
        }

        self.total_updates += 1;
        if self.total_updates % self.update_period == 0 {
            self.sync_target()?;
            debug!(total_updates = self.total_updates, "target network synchronized");
        }

        Ok(loss)
    }

    /// Hard-copy the online parameters into the target network.
    pub fn sync_target(&mut self) -> Result<()> {
        self.target.clone_parameters_from(&self.online)
    }

    /// Persist both networks.
    pub fn save<P: AsRef<Path>, Q: AsRef<Path>>(&self, online_path: P, target_path: Q) -> Result<()> {
        self.online.save(online_path)?;
        self.target.save(target_path)?;
        Ok(())
    }
}
