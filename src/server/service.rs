//! Single-owner access to the shared agent.
//!
//! The [`DuelingAgent`] lives on one dedicated thread. Sessions talk to it through an
//! [`AgentHandle`], which sends commands over a bounded channel and waits for the reply,
//! so agent operations never interleave. The service also tracks which session owns the
//! current episode: the first session to step claims it, and other sessions are refused
//! until the owner ends the episode or disconnects.

use std::path::PathBuf;
use std::thread::{self, JoinHandle};

use ndarray::Array1;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};

use crate::agent::{AgentStats, DuelingAgent, EpisodeSummary};
use crate::error::{DuelError, Result};

/// Identifies one accepted connection.
pub type SessionId = u64;

const QUEUE_DEPTH: usize = 64;

enum Command {
    Step {
        session: SessionId,
        reward: f32,
        state: Array1<f32>,
        done: bool,
        reply: oneshot::Sender<Result<usize>>,
    },
    EndEpisode {
        session: SessionId,
        reply: oneshot::Sender<Result<EpisodeSummary>>,
    },
    ExportRewards {
        reply: oneshot::Sender<Result<PathBuf>>,
    },
    Stats {
        reply: oneshot::Sender<AgentStats>,
    },
    Release {
        session: SessionId,
    },
}

/// Cloneable front door to the agent service.
#[derive(Clone)]
pub struct AgentHandle {
    tx: mpsc::Sender<Command>,
}

impl AgentHandle {
    pub async fn step(&self, session: SessionId, reward: f32, state: Array1<f32>, done: bool) -> Result<usize> {
        self.request(|reply| Command::Step { session, reward, state, done, reply }).await?
    }

    pub async fn end_episode(&self, session: SessionId) -> Result<EpisodeSummary> {
        self.request(|reply| Command::EndEpisode { session, reply }).await?
    }

    pub async fn export_rewards(&self) -> Result<PathBuf> {
        self.request(|reply| Command::ExportRewards { reply }).await?
    }

    pub async fn stats(&self) -> Result<AgentStats> {
        self.request(|reply| Command::Stats { reply }).await
    }

    /// Give up `session`'s claim on the agent, abandoning its unfinished episode step.
    pub async fn release(&self, session: SessionId) {
        if self.tx.send(Command::Release { session }).await.is_err() {
            debug!(session, "agent service already stopped");
        }
    }

    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(command(reply))
            .await
            .map_err(|_| DuelError::AgentUnavailable)?;
        response.await.map_err(|_| DuelError::AgentUnavailable)
    }
}

/// Owns the agent and executes commands one at a time.
pub struct AgentService {
    agent: DuelingAgent,
    owner: Option<SessionId>,
}

impl AgentService {
    /// Move `agent` onto its own thread.
    ///
    /// The thread exits once every [`AgentHandle`] is dropped and hands the agent back
    /// through the join handle.
    pub fn spawn(agent: DuelingAgent) -> Result<(AgentHandle, JoinHandle<DuelingAgent>)> {
        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
        let service = AgentService { agent, owner: None };
        let join = thread::Builder::new()
            .name("duelq-agent".to_string())
            .spawn(move || service.run(rx))?;
        Ok((AgentHandle { tx }, join))
    }

    fn run(mut self, mut rx: mpsc::Receiver<Command>) -> DuelingAgent {
        while let Some(command) = rx.blocking_recv() {
            self.handle(command);
        }
        debug!("agent service stopped");
        self.agent
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Step { session, reward, state, done, reply } => {
                let result = self
                    .claim(session)
                    .and_then(|()| self.agent.step(reward, state, done));
                if let Err(e) = &result {
                    if !e.is_client_error() {
                        error!(session, error = %e, "agent step failed");
                    }
                }
                let _ = reply.send(result);
            }
            Command::EndEpisode { session, reply } => {
                let result = self.claim(session).and_then(|()| {
                    self.owner = None;
                    self.agent.end_episode()
                });
                let _ = reply.send(result);
            }
            Command::ExportRewards { reply } => {
                let _ = reply.send(self.agent.export_rewards());
            }
            Command::Stats { reply } => {
                let _ = reply.send(self.agent.stats());
            }
            Command::Release { session } => {
                if self.owner == Some(session) {
                    self.agent.abandon_episode();
                    self.owner = None;
                    debug!(session, "session released the agent");
                }
            }
        }
    }

    fn claim(&mut self, session: SessionId) -> Result<()> {
        match self.owner {
            Some(owner) if owner != session => {
                warn!(session, owner, "agent is busy with another session");
                Err(DuelError::SessionBusy { owner })
            }
            _ => {
                self.owner = Some(session);
                Ok(())
            }
        }
    }
}
