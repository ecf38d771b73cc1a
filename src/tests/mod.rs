pub mod test_agent;
pub mod test_episode;
pub mod test_session;
