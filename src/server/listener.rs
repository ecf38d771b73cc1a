use std::net::SocketAddr;

use tokio::net::{lookup_host, TcpListener, TcpSocket};
use tracing::{error, info, warn, Instrument};

use crate::config::ServerConfig;
use crate::error::{DuelError, Result};

use super::service::{AgentHandle, SessionId};
use super::session::{run_session, SessionEnd};

/// Accepts simulator connections and serves each one on its own task.
pub struct Server {
    listener: TcpListener,
    agent: AgentHandle,
    next_session: SessionId,
}

impl Server {
    /// Bind the listening socket with the configured backlog.
    pub async fn bind(config: &ServerConfig, agent: AgentHandle) -> Result<Self> {
        let addr = lookup_host(config.bind_address.as_str()).await?.next().ok_or_else(|| {
            DuelError::Config(format!("bind address {} did not resolve", config.bind_address))
        })?;

        let socket = if addr.is_ipv4() { TcpSocket::new_v4()? } else { TcpSocket::new_v6()? };
        socket.set_reuseaddr(true)?;
        socket.bind(addr)?;
        let listener = socket.listen(config.backlog)?;

        info!("Decision server listening on {}", listener.local_addr()?);
        Ok(Server { listener, agent, next_session: 1 })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections forever. Accept failures are logged and never stop the loop.
    pub async fn run(mut self) -> Result<()> {
        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!("Failed to accept connection: {}", e);
                    continue;
                }
            };

            let session = self.next_session;
            self.next_session += 1;
            let agent = self.agent.clone();
            let span = tracing::info_span!("session", id = session, %peer);

            tokio::spawn(
                async move {
                    info!("Connected");
                    match run_session(stream, session, agent).await {
                        Ok(SessionEnd::EpisodeEnded(summary)) => {
                            info!(episode = summary.episode, reward = summary.reward, "Closed after episode end");
                        }
                        Ok(end) => info!(?end, "Closed"),
                        Err(e) if e.is_client_error() => warn!("Session terminated: {}", e),
                        Err(e) => error!("Session failed: {}", e),
                    }
                }
                .instrument(span),
            );
        }
    }
}
