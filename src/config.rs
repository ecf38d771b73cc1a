//! Configuration for the decision service.
//!
//! Values come from built-in defaults, then an optional TOML file, then
//! `DUELQ__SECTION__KEY` environment variables. The binary applies command-line
//! overrides on top and calls [`Config::validate`] before anything is built.

use std::path::{Path, PathBuf};

use config::{Config as ConfigSource, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::{DuelError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: String,
    pub server: ServerConfig,
    pub agent: AgentConfig,
    pub artifacts: ArtifactPaths,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            server: ServerConfig::default(),
            agent: AgentConfig::default(),
            artifacts: ArtifactPaths::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub backlog: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8888".to_string(),
            backlog: 5,
        }
    }
}

/// Hyperparameters of the learner, fixed for the life of the process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub n_states: usize,
    pub n_actions: usize,
    pub n_hiddens1: usize,
    pub n_hiddens2: usize,
    pub dqn_lr: f32,
    pub gamma: f32,
    pub buffer_size: usize,
    /// Training starts once the buffer holds more than this many transitions
    pub min_size: usize,
    pub batch_size: usize,
    /// Learning steps between target-network synchronizations
    pub update_period: u64,
    pub optimizer: OptimizerKind,
    /// Seed for parameter initialization, exploration and sampling
    pub seed: Option<u64>,
    /// Load existing checkpoints at start-up
    pub resume: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            n_states: 4,
            n_actions: 3,
            n_hiddens1: 64,
            n_hiddens2: 64,
            dqn_lr: 1e-3,
            gamma: 0.99,
            buffer_size: 5000,
            min_size: 200,
            batch_size: 64,
            update_period: 100,
            optimizer: OptimizerKind::Adam,
            seed: None,
            resume: false,
        }
    }
}

/// Update rule applied to the online network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerKind {
    #[default]
    Adam,
    Sgd,
}

impl AgentConfig {
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("n_states", self.n_states),
            ("n_actions", self.n_actions),
            ("n_hiddens1", self.n_hiddens1),
            ("n_hiddens2", self.n_hiddens2),
            ("batch_size", self.batch_size),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(DuelError::invalid_parameter(name, "must be greater than 0"));
            }
        }
        if self.update_period == 0 {
            return Err(DuelError::invalid_parameter("update_period", "must be greater than 0"));
        }
        if self.buffer_size < self.batch_size {
            return Err(DuelError::invalid_parameter(
                "buffer_size".to_string(),
                format!("must hold at least one batch ({} transitions)", self.batch_size),
            ));
        }
        if self.min_size >= self.buffer_size {
            return Err(DuelError::invalid_parameter(
                "min_size".to_string(),
                format!("must be below buffer_size ({})", self.buffer_size),
            ));
        }
        if self.min_size.saturating_add(1) < self.batch_size {
            return Err(DuelError::invalid_parameter(
                "min_size".to_string(),
                format!("must be at least batch_size - 1 ({})", self.batch_size - 1),
            ));
        }
        if !(0.0..=1.0).contains(&self.gamma) {
            return Err(DuelError::invalid_parameter("gamma", "must lie in [0, 1]"));
        }
        if !(self.dqn_lr > 0.0 && self.dqn_lr.is_finite()) {
            return Err(DuelError::invalid_parameter("dqn_lr", "must be a positive number"));
        }
        Ok(())
    }
}

/// Files written by the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactPaths {
    pub online_checkpoint: PathBuf,
    pub target_checkpoint: PathBuf,
    pub reward_history: PathBuf,
    pub loss_history: PathBuf,
}

impl Default for ArtifactPaths {
    fn default() -> Self {
        Self::in_dir(".")
    }
}

impl ArtifactPaths {
    /// Default file names placed under `dir`
    pub fn in_dir<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref();
        Self {
            online_checkpoint: dir.join("dueling_dqn.bin"),
            target_checkpoint: dir.join("target_dueling_dqn.bin"),
            reward_history: dir.join("reward_data.csv"),
            loss_history: dir.join("average_loss_data.csv"),
        }
    }
}

impl Config {
    /// Load configuration from defaults, an optional file and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = ConfigSource::builder();

        if let Some(path) = path {
            tracing::info!("Loading config from: {:?}", path);
            builder = builder.add_source(File::from(path.to_path_buf()).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("DUELQ")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: Config = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.backlog == 0 {
            return Err(DuelError::invalid_parameter("backlog", "must be greater than 0"));
        }
        self.agent.validate()
    }
}
