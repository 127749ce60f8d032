//! Run-loop behavior observed from outside the engine.

use std::time::Duration;

use serde_json::{Value, json};
use stateful_engine::{Chain, Operation, Step};
use tokio::sync::{mpsc, oneshot};

use crate::common::{Journal, chain, reject_after, resolve_after};

#[tokio::test]
async fn initial_state_reaches_the_first_step() {
    let (tx, rx) = oneshot::channel();
    chain(json!({"foo": "bar"}))
        .then(move |ctx| {
            let _ = tx.send(ctx.get("foo"));
        })
        .spawn();
    assert_eq!(rx.await.expect("step ran"), Some(json!("bar")));
}

#[tokio::test]
async fn steps_returning_nothing_still_advance() {
    let journal = Journal::default();
    let log = journal.clone();
    Chain::new()
        .then(|_| ())
        .then(move |_| log.note("second step"))
        .await;
    assert_eq!(journal.entries(), vec!["second step"]);
}

#[tokio::test]
async fn then_blocks_after_a_rejection_are_skipped() {
    let journal = Journal::default();
    let (skipped, caught) = (journal.clone(), journal.clone());
    let ctx = chain(json!({}))
        .then(|ctx| ctx.set("foo", reject_after(5, "fail")))
        .then(move |_| skipped.note("should not run"))
        .catch(move |_, errors| caught.note(Value::Array(errors).to_string()))
        .await;
    assert_eq!(journal.entries(), vec![r#"["fail"]"#]);
    assert_eq!(ctx.get("foo"), None);
}

#[tokio::test]
async fn chained_catch_blocks_each_run_once() {
    let journal = Journal::default();
    let (first, second) = (journal.clone(), journal.clone());
    chain(json!({}))
        .then(|ctx| ctx.handle(Operation::err("fail")))
        .catch(move |_, errors| first.note(format!("first saw {}", errors.len())))
        .catch(move |_, errors| second.note(format!("second saw {}", errors.len())))
        .await;
    assert_eq!(journal.entries(), vec!["first saw 1", "second saw 1"]);
}

#[tokio::test]
async fn catch_position_does_not_matter() {
    let journal = Journal::default();
    let (caught, skipped) = (journal.clone(), journal.clone());
    chain(json!({}))
        .catch(move |_, errors| caught.note(Value::Array(errors).to_string()))
        .then(|ctx| ctx.set("foo", Operation::err("boom")))
        .then(move |_| skipped.note("should not run"))
        .await;
    assert_eq!(journal.entries(), vec![r#"["boom"]"#]);
}

#[tokio::test]
async fn catch_handlers_can_wait() {
    let ctx = chain(json!({}))
        .then(|ctx| ctx.reject_if(true).or_error(404))
        .catch(|ctx, _| ctx.set("recovered", resolve_after(10, true)))
        .await;
    assert_eq!(ctx.get("recovered"), Some(json!(true)));
    assert_eq!(ctx.errors(), vec![json!(404)]);
}

#[tokio::test]
async fn step_futures_are_awaited() {
    let ctx = chain(json!({}))
        .then(|ctx| {
            Step::wait(async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                ctx.insert("late", true);
            })
        })
        .then(|ctx| {
            let seen = ctx.get("late").is_some();
            ctx.set("saw_late", Operation::ok(seen))
        })
        .await;
    assert_eq!(ctx.get("saw_late"), Some(json!(true)));
}

#[tokio::test]
async fn independent_chains_run_concurrently() {
    let first = chain(json!({})).then(|ctx| ctx.set("foo", resolve_after(20, "bar")));
    let second = chain(json!({})).then(|ctx| ctx.set("baz", resolve_after(5, "quux")));
    let (a, b) = tokio::join!(first.run(), second.run());
    assert_eq!(a.get("foo"), Some(json!("bar")));
    assert_eq!(b.get("baz"), Some(json!("quux")));
}

#[tokio::test]
async fn first_finished_chain_wins_a_race() {
    let slow = chain(json!({})).then(|ctx| ctx.set("foo", resolve_after(200, "bar")));
    let fast = chain(json!({})).then(|ctx| ctx.set("baz", resolve_after(5, "quux")));
    let winner = tokio::select! {
        ctx = slow.run() => ctx,
        ctx = fast.run() => ctx,
    };
    assert_eq!(winner.get("baz"), Some(json!("quux")));
}

#[tokio::test]
async fn spawned_chains_report_through_channels() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    for n in 0..3 {
        let tx = tx.clone();
        chain(json!({"n": n}))
            .then(move |ctx| ctx.set("doubled", resolve_after(5, n * 2)))
            .then(move |ctx| {
                let _ = tx.send(ctx.get("doubled"));
            })
            .spawn();
    }
    drop(tx);

    let mut seen = Vec::new();
    while let Some(doubled) = rx.recv().await {
        seen.push(doubled.and_then(|v| v.as_i64()).unwrap_or_default());
    }
    seen.sort_unstable();
    assert_eq!(seen, vec![0, 2, 4]);
}

#[test]
fn non_object_state_is_rejected_synchronously() {
    let err = Chain::from_value(json!(4)).expect_err("numbers are not state");
    assert_eq!(
        err.to_string(),
        "the initial state of a chain must be an object of some kind (got number)"
    );
}
