//! Integration tests for turn supervision and bounded-wait cancellation.
//!
//! Covers:
//! - a completed turn returns its output and frees the session
//! - a second turn on a busy session is rejected
//! - cancel with no turn running is idle
//! - a turn that stops within the wait finishes normally
//! - a turn that ignores the wait is aborted and reported as such
//! - sessions are supervised independently

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;

use acp_adapter::session::supervisor::{CancelOutcome, TaskSupervisor, TurnEnd};
use acp_adapter::AppError;

// ── Running turns ───────────────────────────────────────────────────────────

#[tokio::test]
async fn completed_turn_returns_output() {
    let supervisor = TaskSupervisor::new();
    let end = supervisor
        .run("s1", async { 42 })
        .await
        .expect("turn runs");
    assert_eq!(end, TurnEnd::Completed(42));
    assert!(!supervisor.is_busy("s1"));
}

#[tokio::test]
async fn second_turn_on_busy_session_is_rejected() {
    let supervisor = Arc::new(TaskSupervisor::new());
    let (release_tx, release_rx) = oneshot::channel::<()>();

    let first = {
        let supervisor = Arc::clone(&supervisor);
        tokio::spawn(async move {
            supervisor
                .run("s1", async move {
                    let _ = release_rx.await;
                })
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(supervisor.is_busy("s1"));

    let second = supervisor.run("s1", async {}).await;
    assert!(matches!(second, Err(AppError::InvalidRequest(_))));

    release_tx.send(()).expect("release first turn");
    let end = first.await.expect("join").expect("first turn");
    assert_eq!(end, TurnEnd::Completed(()));

    // The slot is free again.
    let third = supervisor.run("s1", async { "again" }).await.expect("run");
    assert_eq!(third, TurnEnd::Completed("again"));
}

#[tokio::test]
async fn sessions_are_independent() {
    let supervisor = Arc::new(TaskSupervisor::new());
    let (_hold_tx, hold_rx) = oneshot::channel::<()>();
    let busy = {
        let supervisor = Arc::clone(&supervisor);
        tokio::spawn(async move {
            supervisor
                .run("busy", async move {
                    let _ = hold_rx.await;
                })
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    let other = supervisor.run("other", async { 1 }).await.expect("run");
    assert_eq!(other, TurnEnd::Completed(1));
    busy.abort();
}

// ── Cancellation ────────────────────────────────────────────────────────────

#[tokio::test]
async fn cancel_without_turn_is_idle() {
    let supervisor = TaskSupervisor::new();
    let outcome = supervisor
        .wait_or_abort("s1", Duration::from_millis(10))
        .await
        .expect("wait");
    assert_eq!(outcome, CancelOutcome::Idle);
}

#[tokio::test]
async fn turn_stopping_within_wait_finishes() {
    let supervisor = Arc::new(TaskSupervisor::new());
    let (stop_tx, stop_rx) = oneshot::channel::<()>();

    let turn = {
        let supervisor = Arc::clone(&supervisor);
        tokio::spawn(async move {
            supervisor
                .run("s1", async move {
                    let _ = stop_rx.await;
                    "paused"
                })
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    // Simulates the engine reacting to a pause shortly after the request.
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        let _ = stop_tx.send(());
    });

    let outcome = supervisor
        .wait_or_abort("s1", Duration::from_secs(2))
        .await
        .expect("wait");
    assert_eq!(outcome, CancelOutcome::Finished);
    assert_eq!(
        turn.await.expect("join").expect("turn"),
        TurnEnd::Completed("paused")
    );
}

#[tokio::test]
async fn turn_ignoring_wait_is_aborted() {
    let supervisor = Arc::new(TaskSupervisor::new());

    let turn = {
        let supervisor = Arc::clone(&supervisor);
        tokio::spawn(async move {
            supervisor
                .run("s1", async {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                })
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    let started = tokio::time::Instant::now();
    let outcome = supervisor
        .wait_or_abort("s1", Duration::from_millis(100))
        .await
        .expect("wait");
    assert_eq!(outcome, CancelOutcome::Aborted);
    assert!(started.elapsed() < Duration::from_secs(5));

    assert_eq!(turn.await.expect("join").expect("turn"), TurnEnd::Aborted);
    assert!(!supervisor.is_busy("s1"));
}

#[tokio::test]
async fn abort_all_stops_every_turn() {
    let supervisor = Arc::new(TaskSupervisor::new());
    let mut turns = Vec::new();
    for id in ["a", "b"] {
        let supervisor = Arc::clone(&supervisor);
        turns.push(tokio::spawn(async move {
            supervisor
                .run(id, async {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                })
                .await
        }));
    }
    tokio::time::sleep(Duration::from_millis(20)).await;

    supervisor.abort_all();
    for turn in turns {
        assert_eq!(turn.await.expect("join").expect("turn"), TurnEnd::Aborted);
    }
}
