use std::fs;
use std::path::Path;

use ndarray::{array, Array1};
use tempfile::tempdir;
use crate::agent::{DuelingAgent, EpisodePhase};
use crate::config::{AgentConfig, ArtifactPaths, OptimizerKind};
use crate::error::DuelError;

fn small_config() -> AgentConfig {
    AgentConfig {
        n_hiddens1: 8,
        n_hiddens2: 8,
        buffer_size: 100,
        min_size: 4,
        batch_size: 4,
        update_period: 2,
        seed: Some(1),
        ..AgentConfig::default()
    }
}

fn agent_in(dir: &Path, config: AgentConfig) -> DuelingAgent {
    DuelingAgent::new(config, ArtifactPaths::in_dir(dir)).unwrap()
}

fn state(step: usize) -> Array1<f32> {
    let x = step as f32 * 0.1;
    array![x, -x, x * 0.5, 1.0]
}

#[test]
fn test_agent_creation() {
    let dir = tempdir().unwrap();
    let agent = agent_in(dir.path(), small_config());

    assert_eq!(agent.episode_index(), 1);
    assert!(agent.replay_buffer().is_empty());
    assert_eq!(agent.replay_buffer().capacity(), 100);
    assert_eq!(agent.learner().online().n_actions(), 3);
    assert_eq!(agent.config().batch_size, 4);
}

#[test]
fn test_invalid_config_rejected() {
    let dir = tempdir().unwrap();
    let config = AgentConfig { batch_size: 0, ..small_config() };
    assert!(DuelingAgent::new(config, ArtifactPaths::in_dir(dir.path())).is_err());
}

#[test]
fn test_first_step_records_nothing() {
    let dir = tempdir().unwrap();
    let mut agent = agent_in(dir.path(), small_config());

    let action = agent.step(5.0, state(0), false).unwrap();
    assert!(action < 3);
    assert!(agent.replay_buffer().is_empty());
    assert_eq!(agent.rewards().current(), 0.0);
    assert!(matches!(agent.episode().phase(), EpisodePhase::Stepping { .. }));
}

#[test]
fn test_episode_bookkeeping() {
    let dir = tempdir().unwrap();
    let mut agent = agent_in(dir.path(), small_config());

    agent.step(0.0, state(0), false).unwrap();
    let first_action = match agent.episode().phase() {
        EpisodePhase::Stepping { action, .. } => *action,
        other => panic!("unexpected phase {:?}", other),
    };
    agent.step(1.5, state(1), false).unwrap();
    agent.step(2.5, state(2), false).unwrap();

    assert_eq!(agent.replay_buffer().len(), 2);
    let stored: Vec<_> = agent.replay_buffer().iter().collect();
    assert_eq!(stored[0].state, state(0));
    assert_eq!(stored[0].action, first_action);
    assert_eq!(stored[0].reward, 1.5);
    assert_eq!(stored[0].next_state, state(1));
    assert_eq!(stored[1].state, state(1));
    assert_eq!(stored[1].reward, 2.5);

    let summary = agent.end_episode().unwrap();
    assert_eq!(summary.episode, 1);
    assert_eq!(summary.reward, 4.0);
    assert_eq!(summary.updates, 0);
    assert_eq!(summary.average_loss, 0.0);
    assert_eq!(agent.episode_index(), 2);
    assert_eq!(agent.rewards().history(), &[4.0]);
    assert_eq!(agent.rewards().current(), 0.0);
    assert_eq!(agent.episode().phase(), &EpisodePhase::Ended);
}

#[test]
fn test_next_episode_starts_fresh() {
    let dir = tempdir().unwrap();
    let mut agent = agent_in(dir.path(), small_config());

    agent.step(0.0, state(0), false).unwrap();
    agent.step(1.0, state(1), false).unwrap();
    agent.end_episode().unwrap();

    // The first observation of episode 2 must not pair with episode 1's last action
    agent.step(9.0, state(5), false).unwrap();
    assert_eq!(agent.replay_buffer().len(), 1);
    assert_eq!(agent.rewards().current(), 0.0);
}

#[test]
fn test_end_episode_writes_artifacts() {
    let dir = tempdir().unwrap();
    let paths = ArtifactPaths::in_dir(dir.path());
    let mut agent = agent_in(dir.path(), small_config());

    agent.step(0.0, state(0), false).unwrap();
    agent.step(1.0, state(1), false).unwrap();
    agent.end_episode().unwrap();
    agent.step(0.0, state(0), false).unwrap();
    agent.end_episode().unwrap();

    assert!(paths.online_checkpoint.exists());
    assert!(paths.target_checkpoint.exists());
    let losses = fs::read_to_string(&paths.loss_history).unwrap();
    assert_eq!(losses, "average_loss\n0\n0\n");
}

#[test]
fn test_training_starts_above_min_size() {
    let dir = tempdir().unwrap();
    let mut agent = agent_in(dir.path(), small_config());

    // Step k (k >= 2) stores transition k - 1; training needs more than 4 stored
    for step in 0..5 {
        agent.step(1.0, state(step), false).unwrap();
    }
    assert_eq!(agent.replay_buffer().len(), 4);
    assert_eq!(agent.learner().total_updates(), 0);

    agent.step(1.0, state(5), false).unwrap();
    assert_eq!(agent.replay_buffer().len(), 5);
    assert_eq!(agent.learner().total_updates(), 1);

    agent.step(1.0, state(6), false).unwrap();
    assert_eq!(agent.learner().total_updates(), 2);

    let summary = agent.end_episode().unwrap();
    assert_eq!(summary.updates, 2);
    assert!(summary.average_loss > 0.0);
}

#[test]
fn test_update_counter_survives_episode_end() {
    let dir = tempdir().unwrap();
    let mut agent = agent_in(dir.path(), small_config());

    for step in 0..7 {
        agent.step(1.0, state(step), false).unwrap();
    }
    agent.end_episode().unwrap();
    assert_eq!(agent.learner().total_updates(), 2);

    agent.step(1.0, state(0), false).unwrap();
    agent.step(1.0, state(1), false).unwrap();
    assert_eq!(agent.learner().total_updates(), 3);
    assert_eq!(agent.stats().total_updates, 3);
}

#[test]
fn test_replay_buffer_is_bounded() {
    let dir = tempdir().unwrap();
    let config = AgentConfig { buffer_size: 6, min_size: 5, ..small_config() };
    let mut agent = agent_in(dir.path(), config);

    for step in 0..20 {
        agent.step(0.0, state(step), false).unwrap();
    }
    assert_eq!(agent.replay_buffer().len(), 6);
    assert_eq!(agent.replay_buffer().iter().last().unwrap().next_state, state(19));
}

#[test]
fn test_abandon_keeps_reward_and_index() {
    let dir = tempdir().unwrap();
    let mut agent = agent_in(dir.path(), small_config());

    agent.step(0.0, state(0), false).unwrap();
    agent.step(2.0, state(1), false).unwrap();
    agent.abandon_episode();

    assert!(agent.episode().is_first_step());
    assert_eq!(agent.episode_index(), 1);
    assert_eq!(agent.rewards().current(), 2.0);

    agent.step(3.0, state(2), false).unwrap();
    assert_eq!(agent.replay_buffer().len(), 1);
    assert_eq!(agent.rewards().current(), 2.0);
}

#[test]
fn test_wrong_state_size_leaves_agent_untouched() {
    let dir = tempdir().unwrap();
    let mut agent = agent_in(dir.path(), small_config());

    agent.step(0.0, state(0), false).unwrap();
    let result = agent.step(1.0, array![1.0, 2.0, 3.0], false);
    assert!(matches!(result, Err(DuelError::DimensionMismatch { .. })));
    assert!(agent.replay_buffer().is_empty());
    assert!(!agent.episode().is_first_step());
}

#[test]
fn test_non_finite_input_leaves_agent_untouched() {
    let dir = tempdir().unwrap();
    let mut agent = agent_in(dir.path(), small_config());

    agent.step(0.0, state(0), false).unwrap();
    agent.step(1.0, state(1), false).unwrap();
    let pending = agent.episode().phase().clone();

    let result = agent.step(f32::INFINITY, state(2), false);
    assert!(matches!(result, Err(DuelError::InvalidParameter { .. })));
    let result = agent.step(1.0, array![0.0, f32::NAN, 0.0, 0.0], false);
    assert!(matches!(result, Err(DuelError::InvalidParameter { .. })));

    assert_eq!(agent.replay_buffer().len(), 1);
    assert_eq!(agent.rewards().current(), 1.0);
    assert_eq!(agent.episode().phase(), &pending);
}

#[test]
fn test_loss_table_failure_still_checkpoints() {
    let dir = tempdir().unwrap();
    let mut paths = ArtifactPaths::in_dir(dir.path());
    // A directory where the loss table should be makes every append fail
    paths.loss_history = dir.path().join("losses");
    fs::create_dir(&paths.loss_history).unwrap();
    let mut agent = DuelingAgent::new(small_config(), paths.clone()).unwrap();

    for step in 0..7 {
        agent.step(1.0, state(step), false).unwrap();
    }
    let summary = agent.end_episode().unwrap();
    assert_eq!(summary.updates, 2);
    assert!(paths.online_checkpoint.exists());
    assert!(paths.target_checkpoint.exists());
    assert_eq!(agent.episode_index(), 2);

    agent.step(0.0, state(0), false).unwrap();
    let summary = agent.end_episode().unwrap();
    assert_eq!(summary.updates, 0);
    assert_eq!(summary.average_loss, 0.0);
}

#[test]
fn test_sgd_optimizer_trains() {
    let dir = tempdir().unwrap();
    let config = AgentConfig { optimizer: OptimizerKind::Sgd, ..small_config() };
    let mut agent = agent_in(dir.path(), config);
    let untrained = agent.learner().online().clone();

    for step in 0..8 {
        agent.step(1.0, state(step), false).unwrap();
    }
    assert_eq!(agent.learner().total_updates(), 3);
    assert!(!agent.learner().online().same_parameters(&untrained));
}

#[test]
fn test_export_rewards() {
    let dir = tempdir().unwrap();
    let mut agent = agent_in(dir.path(), small_config());

    for reward in [1.0, 2.0] {
        agent.step(0.0, state(0), false).unwrap();
        agent.step(reward, state(1), false).unwrap();
        agent.step(reward, state(2), false).unwrap();
        agent.end_episode().unwrap();
    }

    let path = agent.export_rewards().unwrap();
    assert_eq!(path, dir.path().join("reward_data.csv"));
    assert_eq!(fs::read_to_string(path).unwrap(), "Reward\n2\n4\n");
}

#[test]
fn test_stats() {
    let dir = tempdir().unwrap();
    let mut agent = agent_in(dir.path(), small_config());

    agent.step(0.0, state(0), false).unwrap();
    agent.step(1.0, state(1), false).unwrap();
    let stats = agent.stats();

    assert_eq!(stats.episode, 1);
    assert_eq!(stats.transitions, 1);
    assert_eq!(stats.total_updates, 0);
    assert_eq!(stats.current_reward, 1.0);
    assert!(stats.reward_history.is_empty());
}

#[test]
fn test_resume_loads_checkpoints() {
    let dir = tempdir().unwrap();
    let mut agent = agent_in(dir.path(), small_config());
    for step in 0..8 {
        agent.step(1.0, state(step), false).unwrap();
    }
    agent.end_episode().unwrap();

    let resumed = agent_in(dir.path(), AgentConfig { resume: true, seed: Some(77), ..small_config() });
    assert!(resumed.learner().online().same_parameters(agent.learner().online()));
    assert!(resumed.learner().target().same_parameters(agent.learner().target()));

    let fresh = agent_in(dir.path(), AgentConfig { seed: Some(77), ..small_config() });
    assert!(!fresh.learner().online().same_parameters(agent.learner().online()));
}

#[test]
fn test_resume_rejects_other_shape() {
    let dir = tempdir().unwrap();
    let mut agent = agent_in(dir.path(), small_config());
    agent.step(0.0, state(0), false).unwrap();
    agent.end_episode().unwrap();

    let config = AgentConfig { n_actions: 4, resume: true, ..small_config() };
    assert!(DuelingAgent::new(config, ArtifactPaths::in_dir(dir.path())).is_err());

    for config in [
        AgentConfig { n_hiddens1: 16, resume: true, ..small_config() },
        AgentConfig { n_hiddens2: 16, resume: true, ..small_config() },
    ] {
        let result = DuelingAgent::new(config, ArtifactPaths::in_dir(dir.path()));
        assert!(matches!(result, Err(DuelError::DimensionMismatch { .. })));
    }
}

#[test]
fn test_seeded_agents_are_reproducible() {
    let first_dir = tempdir().unwrap();
    let second_dir = tempdir().unwrap();
    let mut first = agent_in(first_dir.path(), small_config());
    let mut second = agent_in(second_dir.path(), small_config());

    for step in 0..30 {
        assert_eq!(
            first.step(0.5, state(step), false).unwrap(),
            second.step(0.5, state(step), false).unwrap()
        );
    }
    assert!(first.learner().online().same_parameters(second.learner().online()));
}
