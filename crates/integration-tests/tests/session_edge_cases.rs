//! Session Edge Case Tests
//!
//! Timeouts, hook failures, interrupts and signal deaths: in every case the
//! child must be gone by the time join returns.
#![cfg(unix)]

use procwarden_core::config::{KillMode, SupervisorConfig};
use procwarden_core::domain::SpawnRequest;
use procwarden_core::port::DefaultHooks;
use procwarden_core::{ProcessHooks, Session, SupervisorError};
use procwarden_infra_system::{is_alive, ProcessLauncher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
#[error("refused line {0:?}")]
struct Refused(String);

/// Fails on one specific stdout line; counts exit-code calls
struct RefuseHooks {
    word: &'static str,
    exit_calls: AtomicUsize,
}

impl RefuseHooks {
    fn new(word: &'static str) -> Self {
        Self {
            word,
            exit_calls: AtomicUsize::new(0),
        }
    }
}

impl ProcessHooks for RefuseHooks {
    type Error = Refused;

    fn handle_output(&self, line: String, lines: &mut Vec<String>) -> Result<(), Refused> {
        if line == self.word {
            return Err(Refused(line));
        }
        lines.push(line);
        Ok(())
    }

    fn handle_exit_code(&self, _code: i32) -> Result<(), Refused> {
        self.exit_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn sh<H: ProcessHooks>(launcher: &ProcessLauncher, hooks: H, script: &str) -> Session<H> {
    launcher
        .spawn(hooks, SpawnRequest::new(["sh", "-c", script]))
        .unwrap()
}

#[tokio::test]
async fn test_timeout_kills_child_without_exit_hook() {
    let launcher = ProcessLauncher::default();
    let mut session = sh(&launcher, RefuseHooks::new("never"), "echo started; exec sleep 10");
    let pid = session.pid().unwrap();

    let started = Instant::now();
    let err = session
        .join_timeout(Duration::from_millis(200))
        .await
        .unwrap_err();

    assert!(matches!(err, SupervisorError::Timeout(t) if t == Duration::from_millis(200)));
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(!is_alive(pid), "child must be reaped after timeout");
    assert_eq!(session.hooks().exit_calls.load(Ordering::SeqCst), 0);
    assert_eq!(session.output().unwrap(), ["started"]);
}

#[tokio::test]
async fn test_hook_error_surfaces_and_kills_child() {
    let launcher = ProcessLauncher::default();
    let mut session = sh(
        &launcher,
        RefuseHooks::new("boom"),
        "echo fine; echo boom; exec sleep 10",
    );
    let pid = session.pid().unwrap();

    let err = session.join().await.unwrap_err();

    assert_eq!(err.into_hook_error(), Some(Refused("boom".to_string())));
    assert!(!is_alive(pid));
    assert_eq!(session.output().unwrap(), ["fine"]);
    assert_eq!(session.hooks().exit_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_interrupt_during_join() {
    let launcher = ProcessLauncher::default();
    let mut session = sh(&launcher, DefaultHooks, "exec sleep 10");
    let pid = session.pid().unwrap();

    let handle = session.interrupt_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.interrupt();
    });

    let err = session.join().await.unwrap_err();

    assert!(err.is_interrupted());
    assert!(!is_alive(pid));
}

#[tokio::test]
async fn test_interrupt_before_join() {
    let launcher = ProcessLauncher::default();
    let mut session = sh(&launcher, DefaultHooks, "exec sleep 10");

    session.interrupt_handle().interrupt();

    assert!(matches!(
        session.join().await,
        Err(SupervisorError::Interrupted)
    ));
}

#[tokio::test]
async fn test_signal_death_maps_to_128_plus_signal() {
    let launcher = ProcessLauncher::default();
    let mut session = sh(&launcher, DefaultHooks, "kill -9 $$");

    assert_eq!(session.join().await.unwrap(), 137);
}

#[tokio::test]
async fn test_graceful_termination_on_timeout() {
    let launcher = ProcessLauncher::new(SupervisorConfig::default().graceful());
    let mut session = sh(&launcher, DefaultHooks, "exec sleep 10");
    let pid = session.pid().unwrap();

    let started = Instant::now();
    let err = session
        .join_timeout(Duration::from_millis(100))
        .await
        .unwrap_err();

    assert!(err.is_timeout());
    // sleep honours SIGTERM, so the grace period is not used up
    assert!(started.elapsed() < Duration::from_secs(4));
    assert!(!is_alive(pid));
}

#[tokio::test]
async fn test_ignored_sigterm_escalates_to_sigkill() {
    let launcher = ProcessLauncher::new(SupervisorConfig::default().with_kill_mode(
        KillMode::Terminate {
            grace: Duration::from_millis(200),
        },
    ));
    // An ignored signal stays ignored across exec
    let mut session = sh(&launcher, DefaultHooks, "trap '' TERM; exec sleep 10");
    let pid = session.pid().unwrap();

    let started = Instant::now();
    let err = session
        .join_timeout(Duration::from_millis(200))
        .await
        .unwrap_err();

    assert!(err.is_timeout());
    assert!(started.elapsed() >= Duration::from_millis(400));
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(!is_alive(pid));
}

#[tokio::test]
async fn test_drop_without_join_kills_child() {
    let launcher = ProcessLauncher::default();
    let session = sh(&launcher, DefaultHooks, "exec sleep 10");
    let pid = session.pid().unwrap();

    drop(session);

    let deadline = Instant::now() + Duration::from_secs(5);
    while is_alive(pid) && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(!is_alive(pid), "dropped session must not leak its process");
}

#[tokio::test]
async fn test_drain_failure_checked_after_natural_exit() {
    // Child exits 0 on its own, but a hook refused a line first
    let launcher = ProcessLauncher::default();
    let mut session = sh(&launcher, RefuseHooks::new("bad"), "echo bad");

    let err = session.join().await.unwrap_err();

    assert!(matches!(err, SupervisorError::Hook(Refused(ref line)) if line == "bad"));
}

#[tokio::test]
async fn test_abandoned_join_future_kills_child() {
    let launcher = ProcessLauncher::default();
    let mut session = sh(&launcher, DefaultHooks, "exec sleep 30");
    let pid = session.pid().unwrap();

    // Outer deadline drops the join future mid-wait
    let abandoned = tokio::time::timeout(Duration::from_millis(100), session.join()).await;
    assert!(abandoned.is_err());
    drop(session);

    let deadline = Instant::now() + Duration::from_secs(5);
    while is_alive(pid) && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(!is_alive(pid), "abandoned join must not leak its process");
}
