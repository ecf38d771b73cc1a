//! Training metrics kept by the agent between episode reports.

pub mod tracker;

pub use tracker::{EpochStats, EpisodeRewards};
