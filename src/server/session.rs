use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

use crate::agent::EpisodeSummary;
use crate::error::Result;

use super::protocol::{decode, encode_action, FrameReader, Message};
use super::service::{AgentHandle, SessionId};

/// Why a session stopped.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEnd {
    /// The peer sent the close sentinel
    Closed,
    /// The peer sent the close-and-report sentinel and the reward table was written
    Reported,
    /// The peer reported `done` and the episode was closed
    EpisodeEnded(EpisodeSummary),
    /// The stream ended between frames
    Disconnected,
}

/// Serve one connection until it ends.
///
/// Whatever the outcome, the session's claim on the agent is released before returning, so a
/// session that fails mid-episode does not lock out the next one.
pub async fn run_session<S>(stream: S, session: SessionId, agent: AgentHandle) -> Result<SessionEnd>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let result = drive(stream, session, &agent).await;
    agent.release(session).await;
    result
}

async fn drive<S>(stream: S, session: SessionId, agent: &AgentHandle) -> Result<SessionEnd>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (reader, mut writer) = tokio::io::split(stream);
    let mut frames = FrameReader::new(reader);

    loop {
        let Some(frame) = frames.next_frame().await? else {
            return Ok(SessionEnd::Disconnected);
        };

        match decode(&frame)? {
            Message::Close => return Ok(SessionEnd::Closed),
            Message::CloseAndReport => {
                let path = agent.export_rewards().await?;
                info!(path = %path.display(), "training over, reward history exported");
                return Ok(SessionEnd::Reported);
            }
            Message::Step(step) if step.done => {
                let summary = agent.end_episode(session).await?;
                return Ok(SessionEnd::EpisodeEnded(summary));
            }
            Message::Step(step) => {
                let action = agent.step(session, step.reward, step.state(), false).await?;
                debug!(action, reward = step.reward, "action chosen");
                writer.write_all(&encode_action(action)).await?;
                writer.flush().await?;
            }
        }
    }
}
