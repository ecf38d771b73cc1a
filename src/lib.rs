//! # duelq - Online Dueling DQN Decision Service
//!
//! duelq keeps one learning agent alive for the life of the process and lets an
//! external simulator drive it over TCP, one decision step at a time. The simulator
//! reports an observed state, the reward for the previous action and a termination
//! flag; the service answers with a discrete action and learns from the resulting
//! stream of transitions as it goes.
//!
//! ## Key Features
//!
//! - **Dueling Q-network**: value and mean-centered advantage heads over a two-layer ReLU trunk
//! - **Online training**: replay sampling and one Adam step per observation once the buffer is warm
//! - **Target network**: hard-copied from the online network every `update_period` steps
//! - **Single-owner agent**: every connection is served concurrently, all agent access is serialized
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use duelq::agent::DuelingAgent;
//! use duelq::config::Config;
//! use duelq::server::{AgentService, Server};
//!
//! # async fn run() -> duelq::error::Result<()> {
//! let config = Config::default();
//! let agent = DuelingAgent::new(config.agent.clone(), config.artifacts.clone())?;
//! let (handle, _agent_thread) = AgentService::spawn(agent)?;
//! Server::bind(&config.server, handle).await?.run().await
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`activations`] - Activation functions (ReLU, Linear)
//! - [`agent`] - Agent, learner, policy and episode bookkeeping
//! - [`config`] - Hyperparameters, listener settings and artifact paths
//! - [`error`] - Error types and result handling
//! - [`export`] - Reward and loss tables
//! - [`layers`] - Dense layers and weight initialization
//! - [`loss`] - Loss functions for training
//! - [`metrics`] - Per-episode training metrics
//! - [`network`] - The dueling Q-network
//! - [`optimizer`] - Optimization algorithms
//! - [`replay_buffer`] - Experience replay
//! - [`server`] - Wire protocol, sessions and the TCP listener

pub mod activations;
pub mod agent;
pub mod config;
pub mod error;
pub mod export;
pub mod layers;
pub mod loss;
pub mod metrics;
pub mod network;
pub mod optimizer;
pub mod replay_buffer;
pub mod server;

#[cfg(test)]
mod tests;
