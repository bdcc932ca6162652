//! End-to-end scenarios against real OS processes

#![cfg(unix)]

use std::time::Duration;

use proctest_process::{ProcessControl, ProcessState, StreamKind, TimeoutKind};
use proctest_scenario::{CompletionError, HarnessConfig, RunOptions, Scenario, ScenarioError};
use tempfile::TempDir;

fn scenario() -> Scenario {
    Scenario::new(HarnessConfig {
        exit_timeout_secs: 10,
        io_wait_secs: 5,
        ..Default::default()
    })
    .unwrap()
}

#[tokio::test]
async fn test_echo_completes_normally() {
    let mut scenario = scenario();
    let outcome = scenario.execute("hi", "echo hi").await.unwrap();

    assert_eq!(outcome.state, ProcessState::Exited);
    assert!(!outcome.timed_out);
    assert_eq!(outcome.exit_status, Some(0));

    let handle = scenario.registry().get_by_label("hi").unwrap();
    assert_eq!(handle.stdout(), b"hi\n");
    assert!(handle.successfully_executed());
    assert!(handle.has_exit_status(0));
}

#[tokio::test]
async fn test_exit_timeout_kills_sleeper() {
    let mut scenario = scenario();
    let handle = scenario
        .spawn_with(
            "sleeper",
            "sleep 5",
            RunOptions::default().exit_timeout(Duration::from_secs(1)),
        )
        .await
        .unwrap();

    let outcome = handle.stop().await.unwrap();
    assert!(outcome.timed_out);
    assert_eq!(outcome.state, ProcessState::TimedOut);
    assert_eq!(outcome.timeout, Some(TimeoutKind::Exit));
    assert_eq!(handle.exit_status(), None);
    assert!(outcome.elapsed < Duration::from_secs(4));
}

#[tokio::test]
async fn test_overrun_seen_after_exit_is_still_a_hang() {
    let mut scenario = scenario();
    scenario
        .spawn_with(
            "overrun",
            "sleep 1",
            RunOptions::default().exit_timeout(Duration::from_millis(300)),
        )
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(1600)).await;

    let outcome = scenario.registry_mut().stop_all().await.unwrap().remove(0);
    assert!(outcome.timed_out);
    assert_eq!(outcome.state, ProcessState::TimedOut);
    match scenario.expect_completed("overrun") {
        Err(ScenarioError::Completion(err)) => assert!(err.is_hang()),
        other => panic!("unexpected: {other:?}"),
    }
}

#[tokio::test]
async fn test_silent_process_hits_io_wait() {
    let mut scenario = scenario();
    let handle = scenario
        .spawn_with(
            "silent",
            "sleep 5",
            RunOptions::default().io_wait(Duration::from_millis(300)),
        )
        .await
        .unwrap();

    let outcome = handle.stop().await.unwrap();
    assert_eq!(outcome.timeout, Some(TimeoutKind::IoWait));
}

#[tokio::test]
async fn test_repeated_labels_keep_order() {
    let mut scenario = scenario();
    scenario.execute("a", "echo first").await.unwrap();
    scenario.execute("b", "echo second").await.unwrap();
    scenario.execute("a", "echo third").await.unwrap();

    let registry = scenario.registry();
    assert_eq!(registry.len(), 3);
    assert_eq!(registry.all_stdout(), b"first\nsecond\nthird\n");
    assert_eq!(registry.stdout_from("a").unwrap(), b"third\n");
    assert_eq!(registry.last().unwrap().label(), "a");
    assert_eq!(registry.labels().collect::<Vec<_>>(), vec!["a", "b", "a"]);
}

#[tokio::test]
async fn test_all_output_interleaves_streams_per_entry() {
    let mut scenario = scenario();
    scenario.execute("one", "echo out1; echo err1 >&2").await.unwrap();
    scenario.execute("two", "echo out2").await.unwrap();

    let registry = scenario.registry();
    assert_eq!(registry.all_output(), b"out1\nerr1\nout2\n");
    assert_eq!(registry.all_stderr(), b"err1\n");
    assert_eq!(registry.stderr_from("one").unwrap(), b"err1\n");
}

#[tokio::test]
async fn test_interactive_session() {
    let mut scenario = scenario();
    let handle = scenario.spawn("cat", "cat").await.unwrap();

    handle.write(b"ping\n").await.unwrap();
    handle.close_stream(StreamKind::Input);
    let err = handle.write(b"late\n").await.unwrap_err();
    assert!(err.is_input_closed());

    let outcome = handle.stop().await.unwrap();
    assert!(outcome.success());
    assert_eq!(handle.stdout(), b"ping\n");
}

#[tokio::test]
async fn test_terminate_all_twice_is_harmless() {
    let mut scenario = scenario();
    scenario.execute("done", "true").await.unwrap();
    scenario.spawn("s1", "sleep 30").await.unwrap();
    scenario.spawn("s2", "sleep 30").await.unwrap();

    scenario.registry_mut().terminate_all().await.unwrap();
    let first: Vec<_> = scenario
        .registry()
        .outcomes()
        .into_iter()
        .map(|(label, outcome)| (label, outcome.state))
        .collect();

    scenario.registry_mut().terminate_all().await.unwrap();
    let second: Vec<_> = scenario
        .registry()
        .outcomes()
        .into_iter()
        .map(|(label, outcome)| (label, outcome.state))
        .collect();

    assert_eq!(first, second);
    assert_eq!(first[0].1, ProcessState::Exited);
    assert_eq!(first[1].1, ProcessState::Terminated);
    assert_eq!(first[2].1, ProcessState::Terminated);
}

#[tokio::test]
async fn test_stop_all_after_completion() {
    let mut scenario = scenario();
    scenario.spawn("x", "echo x").await.unwrap();
    scenario.spawn("y", "sh -c 'exit 3'").await.unwrap();

    let outcomes = scenario.registry_mut().stop_all().await.unwrap();
    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[1].exit_status, Some(3));
    assert_eq!(scenario.registry().last_exit_status().unwrap(), 3);
}

#[tokio::test]
async fn test_last_exit_status_while_running() {
    let mut scenario = scenario();
    scenario.spawn("live", "sleep 30").await.unwrap();

    assert!(matches!(
        scenario.registry().last_exit_status(),
        Err(ScenarioError::NoExitStatus { .. })
    ));
    scenario.teardown().await.unwrap();
}

#[tokio::test]
async fn test_environment_isolation() {
    let mut scenario = scenario();
    scenario.env_mut().set("PROCTEST_E2E_VALUE", "before");
    scenario
        .spawn("reader", "read line; echo \"$PROCTEST_E2E_VALUE\"")
        .await
        .unwrap();

    // Edits after spawn must not reach the running child
    scenario.env_mut().set("PROCTEST_E2E_VALUE", "after");
    assert!(std::env::var("PROCTEST_E2E_VALUE").is_err());

    let handle = scenario.registry_mut().get_by_label_mut("reader").unwrap();
    handle.write(b"go\n").await.unwrap();
    handle.stop().await.unwrap();
    assert_eq!(handle.stdout(), b"before\n");

    scenario.execute("later", "echo \"$PROCTEST_E2E_VALUE\"").await.unwrap();
    assert_eq!(scenario.registry().stdout_from("later").unwrap(), b"after\n");
}

#[tokio::test]
async fn test_hung_and_failed_are_distinguished() {
    let mut scenario = scenario();
    scenario.execute("fails", "sh -c 'exit 1'").await.unwrap();
    scenario
        .spawn_with(
            "hangs",
            "sleep 5",
            RunOptions::default().io_wait(Duration::from_millis(200)),
        )
        .await
        .unwrap()
        .stop()
        .await
        .unwrap();

    match scenario.expect_completed("fails") {
        Err(ScenarioError::Completion(CompletionError::Failed { status, .. })) => {
            assert_eq!(status, 1)
        }
        other => panic!("unexpected: {other:?}"),
    }
    match scenario.expect_completed("hangs") {
        Err(ScenarioError::Completion(err)) => assert!(err.is_hang()),
        other => panic!("unexpected: {other:?}"),
    }
    assert!(scenario.expect_completed("missing").unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_scenario_directory_from_config() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("marker.txt"), "found\n").unwrap();

    let mut scenario = Scenario::new(HarnessConfig {
        working_dir: Some(dir.path().to_path_buf()),
        ..Default::default()
    })
    .unwrap();
    scenario.execute("cat", "cat marker.txt").await.unwrap();

    assert_eq!(scenario.registry().stdout_from("cat").unwrap(), b"found\n");
}
