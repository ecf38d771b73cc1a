//! duelq - serves the online dueling DQN agent to a simulator over TCP.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use duelq::agent::DuelingAgent;
use duelq::config::Config;
use duelq::server::{AgentService, Server};

#[derive(Parser, Debug)]
#[command(name = "duelq", version, about = "Online dueling DQN decision server")]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, env = "DUELQ_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on
    #[arg(long)]
    bind: Option<String>,

    /// Pending-connection backlog of the listener
    #[arg(long)]
    backlog: Option<u32>,

    /// Learning rate of DQN
    #[arg(long)]
    dqn_lr: Option<f32>,

    /// Number of neurons in the first hidden layer
    #[arg(long)]
    n_hiddens1: Option<usize>,

    /// Number of neurons in the second hidden layer
    #[arg(long)]
    n_hiddens2: Option<usize>,

    /// Discount factor
    #[arg(long)]
    gamma: Option<f32>,

    /// Capacity of the experience replay buffer
    #[arg(long)]
    buffer_size: Option<usize>,

    /// Start training once the replay buffer holds more than this many transitions
    #[arg(long)]
    min_size: Option<usize>,

    /// Number of samples per training batch
    #[arg(long)]
    batch_size: Option<usize>,

    /// Learning steps between target network updates
    #[arg(long)]
    update_period: Option<u64>,

    /// Seed for initialization, exploration and sampling
    #[arg(long)]
    seed: Option<u64>,

    /// Load existing checkpoints before serving
    #[arg(long)]
    resume: bool,

    /// Directory receiving checkpoints and metric tables
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn apply(self, config: &mut Config) {
        if let Some(bind) = self.bind {
            config.server.bind_address = bind;
        }
        if let Some(backlog) = self.backlog {
            config.server.backlog = backlog;
        }
        let agent = &mut config.agent;
        if let Some(v) = self.dqn_lr {
            agent.dqn_lr = v;
        }
        if let Some(v) = self.n_hiddens1 {
            agent.n_hiddens1 = v;
        }
        if let Some(v) = self.n_hiddens2 {
            agent.n_hiddens2 = v;
        }
        if let Some(v) = self.gamma {
            agent.gamma = v;
        }
        if let Some(v) = self.buffer_size {
            agent.buffer_size = v;
        }
        if let Some(v) = self.min_size {
            agent.min_size = v;
        }
        if let Some(v) = self.batch_size {
            agent.batch_size = v;
        }
        if let Some(v) = self.update_period {
            agent.update_period = v;
        }
        if self.seed.is_some() {
            agent.seed = self.seed;
        }
        if self.resume {
            agent.resume = true;
        }
        if let Some(dir) = self.output_dir {
            config.artifacts = duelq::config::ArtifactPaths::in_dir(dir);
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    cli.apply(&mut config);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("duelq={}", config.log_level).into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    config.validate().context("Invalid configuration")?;
    info!(agent = ?config.agent, "Starting duelq");

    let agent = DuelingAgent::new(config.agent.clone(), config.artifacts.clone())
        .context("Failed to build agent")?;
    let (handle, _agent_thread) = AgentService::spawn(agent)?;
    let server = Server::bind(&config.server, handle).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => info!("Shutting down"),
    }

    Ok(())
}
