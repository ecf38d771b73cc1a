//! # Online Dueling DQN Agent
//!
//! This module holds the learning-and-decision engine driven by the service: an
//! epsilon-greedy policy over a dueling Q-network, trained online from a bounded
//! replay buffer against a periodically hard-copied target network.
//!
//! ## Core Concepts
//!
//! - **One-step lag**: the environment reports the reward and termination flag of an
//!   action together with the next observation, so each transition is completed one
//!   message later ([`EpisodeTracker`]).
//! - **Training gate**: a learning step runs on every observation once the replay buffer
//!   holds more than `min_size` transitions.
//! - **Target network**: overwritten with the online parameters every `update_period`
//!   learning steps and frozen in between.
//! - **Exploration**: `epsilon = 1 / (episode / 5 + 1)`.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use duelq::agent::DuelingAgent;
//! use duelq::config::{AgentConfig, ArtifactPaths};
//! use ndarray::array;
//!
//! let mut agent = DuelingAgent::new(AgentConfig::default(), ArtifactPaths::in_dir("runs")).unwrap();
//!
//! // The first observation of an episode only selects an action.
//! let action = agent.step(0.0, array![10.0, 2.1, 3.2, 0.5], false).unwrap();
//! // Later observations carry the reward for the previous action.
//! let action = agent.step(0.8, array![9.5, 2.0, 3.1, 0.4], false).unwrap();
//! let summary = agent.end_episode().unwrap();
//! ```

pub mod episode;
pub mod learner;
pub mod policy;

mod dueling;

pub use dueling::{AgentStats, DuelingAgent, EpisodeSummary};
pub use episode::{EpisodePhase, EpisodeTracker};
pub use learner::Learner;
pub use policy::{greedy_action, EpsilonGreedy};
