//! # Decision Server
//!
//! TCP front end for the agent. Each simulator connection is one episode: the
//! [`listener`] accepts it, a [`session`] task decodes its frames ([`protocol`]) and
//! forwards them to the single agent thread ([`service`]), replying with the chosen
//! action until the episode ends or a sentinel closes the connection.

pub mod listener;
pub mod protocol;
pub mod service;
pub mod session;

pub use listener::Server;
pub use protocol::{decode, encode_action, split_frame, FrameReader, Message, StepMessage};
pub use service::{AgentHandle, AgentService, SessionId};
pub use session::{run_session, SessionEnd};
