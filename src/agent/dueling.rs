use ndarray::Array1;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{AgentConfig, ArtifactPaths};
use crate::error::{DuelError, Result};
use crate::export::{append_average_loss, write_reward_history};
use crate::metrics::{EpisodeRewards, EpochStats};
use crate::layers::LayerTrait;
use crate::network::DuelingNetwork;
use crate::optimizer::OptimizerWrapper;
use crate::replay_buffer::ReplayBuffer;

use super::episode::EpisodeTracker;
use super::learner::Learner;
use super::policy::EpsilonGreedy;

/// What `end_episode` reports about the episode it closed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpisodeSummary {
    pub episode: u64,
    pub reward: f32,
    pub average_loss: f32,
    pub updates: u64,
}

/// Point-in-time view of the agent's counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentStats {
    pub episode: u64,
    pub transitions: usize,
    pub total_updates: u64,
    pub current_reward: f32,
    pub reward_history: Vec<f32>,
}

/// Online dueling DQN agent driven one environment step at a time.
///
/// The agent owns the replay buffer, the learner (and through it both networks), the
/// exploration policy and the episode bookkeeping. Episodes are numbered from 1.
pub struct DuelingAgent {
    config: AgentConfig,
    artifacts: ArtifactPaths,
    replay_buffer: ReplayBuffer,
    learner: Learner,
    policy: EpsilonGreedy,
    episode: EpisodeTracker,
    episode_index: u64,
    rewards: EpisodeRewards,
    epoch: EpochStats,
    rng: StdRng,
}

impl DuelingAgent {
    pub fn new(config: AgentConfig, artifacts: ArtifactPaths) -> Result<Self> {
        config.validate()?;

        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let policy = match config.seed {
            Some(seed) => EpsilonGreedy::with_seed(config.n_actions, seed.wrapping_add(1)),
            None => EpsilonGreedy::new(config.n_actions),
        };

        let online = if config.resume && artifacts.online_checkpoint.exists() {
            info!(path = %artifacts.online_checkpoint.display(), "resuming online network");
            let network = DuelingNetwork::load(&artifacts.online_checkpoint)?;
            check_shape(&network, &config)?;
            network
        } else {
            DuelingNetwork::with_rng(config.n_states, config.n_hiddens1, config.n_hiddens2, config.n_actions, &mut rng)
        };

        let optimizer = OptimizerWrapper::new(config.optimizer, &online.layers());
        let mut learner = Learner::new(online, optimizer, config.gamma, config.dqn_lr, config.update_period)?;
        if config.resume && artifacts.target_checkpoint.exists() {
            info!(path = %artifacts.target_checkpoint.display(), "resuming target network");
            learner = learner.with_target(DuelingNetwork::load(&artifacts.target_checkpoint)?)?;
        }

        Ok(DuelingAgent {
            replay_buffer: ReplayBuffer::new(config.buffer_size),
            config,
            artifacts,
            learner,
            policy,
            episode: EpisodeTracker::new(),
            episode_index: 1,
            rewards: EpisodeRewards::new(),
            epoch: EpochStats::new(),
            rng,
        })
    }

    /// Consume one observation and return the action to take from `next_state`.
    ///
    /// `reward` and `done` describe the outcome of the previously returned action. On the first
    /// observation of an episode there is no previous action and nothing is recorded.
    pub fn step(&mut self, reward: f32, next_state: Array1<f32>, done: bool) -> Result<usize> {
        if next_state.len() != self.config.n_states {
            return Err(DuelError::dimension_mismatch(
                format!("{} state features", self.config.n_states),
                format!("{} state features", next_state.len()),
            ));
        }
        if !reward.is_finite() {
            return Err(DuelError::invalid_parameter("reward".to_string(), format!("must be finite, got {}", reward)));
        }
        if !next_state.iter().all(|v| v.is_finite()) {
            return Err(DuelError::invalid_parameter("state", "must hold finite features only"));
        }

        if let Some(transition) = self.episode.complete(reward, &next_state, done) {
            self.replay_buffer.add(transition);
            self.rewards.add(reward);

            if self.replay_buffer.len() > self.config.min_size {
                let batch = self.replay_buffer.sample(self.config.batch_size, &mut self.rng)?;
                let loss = self.learner.train_step(&batch)?;
                self.epoch.record_loss(loss);
            }
        }

        let action = self.policy.select_action(self.learner.online(), next_state.view(), self.episode_index)?;
        self.episode.record_action(next_state, action);
        Ok(action)
    }

    /// Close the current episode: report metrics, persist both networks, move to the next index.
    ///
    /// The agent's own bookkeeping is settled before anything touches the filesystem. A
    /// failed checkpoint write is returned; a failed loss-table write is only logged.
    pub fn end_episode(&mut self) -> Result<EpisodeSummary> {
        let episode = self.episode_index;
        let reward = self.rewards.finish_episode();
        self.episode.end();
        self.episode_index += 1;

        let average_loss = self.epoch.average_loss();
        let updates = self.epoch.updates();
        self.epoch.reset();

        self.learner.save(&self.artifacts.online_checkpoint, &self.artifacts.target_checkpoint)?;
        if let Err(e) = append_average_loss(&self.artifacts.loss_history, average_loss) {
            warn!(episode, error = %e, path = %self.artifacts.loss_history.display(), "failed to record average loss");
        }

        info!(episode, reward, average_loss, updates, "episode finished");
        Ok(EpisodeSummary { episode, reward, average_loss, updates })
    }

    /// Forget the pending action of an episode whose connection went away without finishing it.
    pub fn abandon_episode(&mut self) {
        if !self.episode.is_first_step() {
            debug!(episode = self.episode_index, "abandoning pending step");
        }
        self.episode.reset();
    }

    /// Rewrite the reward table from the finished episodes.
    pub fn export_rewards(&self) -> Result<std::path::PathBuf> {
        let path = self.artifacts.reward_history.clone();
        write_reward_history(&path, self.rewards.history())?;
        info!(path = %path.display(), episodes = self.rewards.history().len(), "reward history exported");
        Ok(path)
    }

    pub fn stats(&self) -> AgentStats {
        AgentStats {
            episode: self.episode_index,
            transitions: self.replay_buffer.len(),
            total_updates: self.learner.total_updates(),
            current_reward: self.rewards.current(),
            reward_history: self.rewards.history().to_vec(),
        }
    }

    pub fn episode_index(&self) -> u64 {
        self.episode_index
    }

    pub fn episode(&self) -> &EpisodeTracker {
        &self.episode
    }

    pub fn replay_buffer(&self) -> &ReplayBuffer {
        &self.replay_buffer
    }

    pub fn learner(&self) -> &Learner {
        &self.learner
    }

    pub fn rewards(&self) -> &EpisodeRewards {
        &self.rewards
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }
}

fn check_shape(network: &DuelingNetwork, config: &AgentConfig) -> Result<()> {
    let expected = [config.n_states, config.n_hiddens1, config.n_hiddens2, config.n_actions];
    let actual = [network.n_states(), network.fc1.output_size(), network.fc2.output_size(), network.n_actions()];
    if expected != actual {
        return Err(DuelError::dimension_mismatch(
            format!("layer widths {:?}", expected),
            format!("layer widths {:?}", actual),
        ));
    }
    Ok(())
}
