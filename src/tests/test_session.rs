use std::fs;
use std::path::Path;

use tempfile::tempdir;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::task::JoinHandle;
use crate::agent::DuelingAgent;
use crate::config::{AgentConfig, ArtifactPaths};
use crate::error::{DuelError, Result};
use crate::server::protocol::{CLOSE_AND_REPORT_SENTINEL, CLOSE_SENTINEL};
use crate::server::{run_session, AgentHandle, AgentService, SessionEnd, SessionId};

fn spawn_agent(dir: &Path) -> AgentHandle {
    let config = AgentConfig {
        n_hiddens1: 8,
        n_hiddens2: 8,
        buffer_size: 100,
        min_size: 4,
        batch_size: 4,
        update_period: 2,
        seed: Some(3),
        ..AgentConfig::default()
    };
    let agent = DuelingAgent::new(config, ArtifactPaths::in_dir(dir)).unwrap();
    let (handle, _thread) = AgentService::spawn(agent).unwrap();
    handle
}

fn connect(session: SessionId, agent: &AgentHandle) -> (DuplexStream, JoinHandle<Result<SessionEnd>>) {
    let (client, server) = tokio::io::duplex(1024);
    let task = tokio::spawn(run_session(server, session, agent.clone()));
    (client, task)
}

fn step_frame(x: f32, reward: f32, done: bool) -> Vec<u8> {
    format!(r#"{{"a":{},"b":0.5,"c":-0.5,"d":1.0,"reward":{},"done":{}}}"#, x, reward, done).into_bytes()
}

async fn read_action<R: AsyncRead + Unpin>(reader: &mut R) -> usize {
    let mut digits = Vec::new();
    loop {
        let byte = reader.read_u8().await.unwrap();
        if byte == 0 {
            break;
        }
        digits.push(byte);
    }
    String::from_utf8(digits).unwrap().parse().unwrap()
}

async fn send_step(client: &mut DuplexStream, x: f32, reward: f32) -> usize {
    client.write_all(&step_frame(x, reward, false)).await.unwrap();
    read_action(client).await
}

#[tokio::test]
async fn test_full_episode() {
    let dir = tempdir().unwrap();
    let agent = spawn_agent(dir.path());
    let (mut client, task) = connect(1, &agent);

    for (i, reward) in [0.0, 1.5, 2.5].into_iter().enumerate() {
        let action = send_step(&mut client, i as f32, reward).await;
        assert!(action < 3);
    }
    // The reward carried by the terminal message is not recorded
    client.write_all(&step_frame(3.0, 7.0, true)).await.unwrap();

    match task.await.unwrap().unwrap() {
        SessionEnd::EpisodeEnded(summary) => {
            assert_eq!(summary.episode, 1);
            assert_eq!(summary.reward, 4.0);
        }
        other => panic!("unexpected end {:?}", other),
    }

    let stats = agent.stats().await.unwrap();
    assert_eq!(stats.episode, 2);
    assert_eq!(stats.transitions, 2);
    assert_eq!(stats.reward_history, vec![4.0]);
    assert!(dir.path().join("dueling_dqn.bin").exists());
    assert!(dir.path().join("average_loss_data.csv").exists());
}

#[tokio::test]
async fn test_close_sentinel() {
    let dir = tempdir().unwrap();
    let agent = spawn_agent(dir.path());
    let (mut client, task) = connect(1, &agent);

    send_step(&mut client, 0.0, 0.0).await;
    client.write_all(CLOSE_SENTINEL).await.unwrap();

    assert_eq!(task.await.unwrap().unwrap(), SessionEnd::Closed);
    assert!(!dir.path().join("reward_data.csv").exists());
    assert_eq!(agent.stats().await.unwrap().episode, 1);
}

#[tokio::test]
async fn test_close_and_report() {
    let dir = tempdir().unwrap();
    let agent = spawn_agent(dir.path());

    let (mut client, task) = connect(1, &agent);
    send_step(&mut client, 0.0, 0.0).await;
    send_step(&mut client, 1.0, 2.0).await;
    client.write_all(&step_frame(2.0, 0.0, true)).await.unwrap();
    task.await.unwrap().unwrap();

    let (mut client, task) = connect(2, &agent);
    client.write_all(CLOSE_AND_REPORT_SENTINEL).await.unwrap();
    assert_eq!(task.await.unwrap().unwrap(), SessionEnd::Reported);

    let table = fs::read_to_string(dir.path().join("reward_data.csv")).unwrap();
    assert_eq!(table, "Reward\n2\n");
}

#[tokio::test]
async fn test_disconnect_releases_agent() {
    let dir = tempdir().unwrap();
    let agent = spawn_agent(dir.path());

    let (mut client, task) = connect(1, &agent);
    send_step(&mut client, 0.0, 0.0).await;
    send_step(&mut client, 1.0, 1.0).await;
    drop(client);
    assert_eq!(task.await.unwrap().unwrap(), SessionEnd::Disconnected);

    let stats = agent.stats().await.unwrap();
    assert_eq!(stats.transitions, 1);
    assert_eq!(stats.current_reward, 1.0);
    assert_eq!(stats.episode, 1);

    // A new connection starts from a fresh first step
    let (mut client, task) = connect(2, &agent);
    send_step(&mut client, 5.0, 9.0).await;
    assert_eq!(agent.stats().await.unwrap().transitions, 1);
    client.write_all(CLOSE_SENTINEL).await.unwrap();
    assert_eq!(task.await.unwrap().unwrap(), SessionEnd::Closed);
}

#[tokio::test]
async fn test_second_session_is_refused_while_busy() {
    let dir = tempdir().unwrap();
    let agent = spawn_agent(dir.path());

    let (mut first, first_task) = connect(1, &agent);
    send_step(&mut first, 0.0, 0.0).await;

    let (mut second, second_task) = connect(2, &agent);
    second.write_all(&step_frame(0.0, 0.0, false)).await.unwrap();
    match second_task.await.unwrap() {
        Err(DuelError::SessionBusy { owner }) => assert_eq!(owner, 1),
        other => panic!("expected SessionBusy, got {:?}", other),
    }

    // The owner is unaffected
    send_step(&mut first, 1.0, 1.0).await;
    drop(first);
    first_task.await.unwrap().unwrap();

    let (mut third, third_task) = connect(3, &agent);
    assert!(send_step(&mut third, 0.0, 0.0).await < 3);
    drop(third);
    third_task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_malformed_message_ends_session() {
    let dir = tempdir().unwrap();
    let agent = spawn_agent(dir.path());

    let (mut client, task) = connect(1, &agent);
    send_step(&mut client, 0.0, 0.0).await;
    client.write_all(b"garbage\0").await.unwrap();
    let result = task.await.unwrap();
    assert!(matches!(result, Err(DuelError::MalformedMessage(_))));

    // The failed session does not keep the agent
    let (mut client, task) = connect(2, &agent);
    send_step(&mut client, 0.0, 0.0).await;
    client.write_all(CLOSE_SENTINEL).await.unwrap();
    assert_eq!(task.await.unwrap().unwrap(), SessionEnd::Closed);
}

#[tokio::test]
async fn test_done_on_first_message() {
    let dir = tempdir().unwrap();
    let agent = spawn_agent(dir.path());

    let (mut client, task) = connect(1, &agent);
    client.write_all(&step_frame(0.0, 3.0, true)).await.unwrap();
    match task.await.unwrap().unwrap() {
        SessionEnd::EpisodeEnded(summary) => assert_eq!(summary.reward, 0.0),
        other => panic!("unexpected end {:?}", other),
    }
    assert_eq!(agent.stats().await.unwrap().transitions, 0);
}

#[tokio::test]
async fn test_out_of_range_reward_is_not_stored() {
    let dir = tempdir().unwrap();
    let agent = spawn_agent(dir.path());

    let (mut client, task) = connect(1, &agent);
    send_step(&mut client, 0.0, 0.0).await;
    client
        .write_all(br#"{"a":0.1,"b":0.5,"c":-0.5,"d":1.0,"reward":1e39,"done":false}"#)
        .await
        .unwrap();
    let result = task.await.unwrap();
    assert!(matches!(result, Err(DuelError::MalformedMessage(_))));

    let stats = agent.stats().await.unwrap();
    assert_eq!(stats.transitions, 0);
    assert_eq!(stats.current_reward, 0.0);
}
