//! Tabular text exports of per-episode metrics.

pub mod csv;

pub use self::csv::{append_average_loss, write_reward_history};
