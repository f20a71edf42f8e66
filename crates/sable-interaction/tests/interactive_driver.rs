#![cfg(unix)]

//! Interactive session driver behavior against scripted subprocesses
//! that pause for permission, fault on stderr, hang, or get cancelled.

mod common;

use common::{fast_budget, tool_config, tool_script};
use sable_core::config::BudgetConfig;
use sable_interaction::InteractiveSessionDriver;
use sable_interaction::driver::{AutoResolver, ResolutionSource};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn driver(tool: &std::path::Path, budget: BudgetConfig) -> InteractiveSessionDriver {
    InteractiveSessionDriver::new(tool_config(tool), budget, Box::new(AutoResolver))
}

#[tokio::test]
async fn permission_request_is_answered_and_session_completes() {
    let dir = TempDir::new().unwrap();
    let tool = tool_script(
        &dir,
        r#"read prompt
echo "Planning changes"
echo "Do you want me to proceed? (y/n)"
read answer
if [ "$answer" = "yes" ]; then
  echo "done"
  exit 0
fi
exit 1"#,
    );
    let driver = driver(&tool, fast_budget());

    let outcome = driver
        .run("make it so", dir.path(), CancellationToken::new())
        .await
        .unwrap();

    assert!(!outcome.timed_out);
    assert!(outcome.transcript.contains("done"));
    assert_eq!(outcome.exchanges.len(), 1);
    assert_eq!(outcome.exchanges[0].answer, "yes");
    assert_eq!(outcome.exchanges[0].source, ResolutionSource::Auto);
    assert!(outcome.exchanges[0].question.contains("proceed"));
}

#[tokio::test]
async fn destructive_question_is_refused() {
    let dir = TempDir::new().unwrap();
    let tool = tool_script(
        &dir,
        r#"read prompt
echo "Do you want me to delete the old migrations? (y/n)"
read answer
if [ "$answer" = "no" ]; then
  echo "skipped"
  exit 0
fi
exit 1"#,
    );
    let driver = driver(&tool, fast_budget());

    let outcome = driver
        .run("tidy up", dir.path(), CancellationToken::new())
        .await
        .unwrap();

    assert!(outcome.transcript.contains("skipped"));
    assert_eq!(outcome.exchanges[0].answer, "no");
}

#[tokio::test]
async fn stderr_fault_terminates_the_session() {
    let dir = TempDir::new().unwrap();
    let tool = tool_script(
        &dir,
        r#"read prompt
echo "Error: model backend exploded" >&2
sleep 30"#,
    );
    let driver = driver(&tool, fast_budget());

    let start = Instant::now();
    let result = driver
        .run("anything", dir.path(), CancellationToken::new())
        .await;

    assert!(result.is_err());
    // Terminated on the fault, not on the deadline.
    assert!(start.elapsed() < Duration::from_secs(4));
}

#[tokio::test]
async fn informational_stderr_is_ignored() {
    let dir = TempDir::new().unwrap();
    let tool = tool_script(
        &dir,
        r#"read prompt
echo "loading model weights" >&2
echo "fine"
exit 0"#,
    );
    let driver = driver(&tool, fast_budget());

    let outcome = driver
        .run("anything", dir.path(), CancellationToken::new())
        .await
        .unwrap();

    assert!(outcome.transcript.contains("fine"));
}

#[tokio::test]
async fn hung_session_returns_partial_transcript() {
    let dir = TempDir::new().unwrap();
    let tool = tool_script(
        &dir,
        r#"read prompt
echo "partial output"
sleep 30"#,
    );
    let budget = BudgetConfig {
        interactive_timeout_secs: 1,
        ..fast_budget()
    };
    let driver = driver(&tool, budget);

    let outcome = driver
        .run("anything", dir.path(), CancellationToken::new())
        .await
        .unwrap();

    assert!(outcome.timed_out);
    assert!(outcome.transcript.contains("partial output"));
    assert_eq!(
        outcome.token_estimate,
        outcome.transcript.len() / 4
    );
}

#[tokio::test]
async fn nonzero_exit_is_an_error() {
    let dir = TempDir::new().unwrap();
    let tool = tool_script(
        &dir,
        r#"read prompt
echo "oops"
exit 3"#,
    );
    let driver = driver(&tool, fast_budget());

    let result = driver
        .run("anything", dir.path(), CancellationToken::new())
        .await;

    assert!(result.is_err());
}

#[tokio::test]
async fn cancellation_kills_the_subprocess() {
    let dir = TempDir::new().unwrap();
    let tool = tool_script(
        &dir,
        r#"read prompt
sleep 30"#,
    );
    let driver = driver(&tool, fast_budget());

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let start = Instant::now();
    let result = driver.run("anything", dir.path(), cancel).await;

    assert!(result.is_err());
    assert!(start.elapsed() < Duration::from_secs(4));
}
