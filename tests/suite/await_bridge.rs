//! Awaiting safe operations directly, without catch handlers.

use std::sync::{Arc, Mutex};

use serde_json::{Value, json};
use stateful_engine::{AggregateError, Chain, Operation};

use crate::common::{reject_after, resolve_after};

#[tokio::test]
async fn awaited_sets_resolve() -> anyhow::Result<()> {
    let ctx = Chain::new().context();
    ctx.set("foo", resolve_after(5, "bar")).await?;
    ctx.set("baz", Operation::ok("quux")).await?;
    assert_eq!(ctx.get("foo"), Some(json!("bar")));
    assert_eq!(ctx.get("baz"), Some(json!("quux")));
    Ok(())
}

#[tokio::test]
async fn first_failure_stops_the_sequence() {
    let ctx = Chain::new().context();

    let outcome: Result<(), AggregateError> = async {
        ctx.set("a", Operation::ok(1)).await?;
        ctx.set("b", Operation::ok(2)).await?;
        ctx.set("c", reject_after(5, 3)).await?;
        ctx.set("d", Operation::ok(4)).await?;
        Ok::<(), AggregateError>(())
    }
    .await;

    let err = outcome.expect_err("`c` failed");
    assert_eq!(err.first_error, json!(3));
    assert_eq!(err.all_errors, vec![json!(3)]);
    assert!(err.context.same_as(&ctx));
    assert_eq!(ctx.get("a"), Some(json!(1)));
    assert_eq!(ctx.get("b"), Some(json!(2)));
    assert_eq!(ctx.get("c"), None);
    assert_eq!(ctx.get("d"), None);
}

#[tokio::test]
async fn manual_rejection_surfaces_its_error() {
    let ctx = Chain::new().context();
    let missing = ctx.get("foo").is_none();
    let AggregateError {
        first_error,
        all_errors,
        ..
    } = ctx
        .reject_if(missing)
        .or_error(404)
        .await
        .expect_err("foo is missing");
    assert_eq!(first_error, json!(404));
    assert_eq!(all_errors, vec![json!(404)]);
}

#[tokio::test]
async fn settled_inner_writes_do_not_bail_a_sequential_filter() {
    let values = Arc::new(Mutex::new(vec![1, 100, 1]));
    let ctx = Chain::from_value(json!({"foo": [{}, {}, {}]}))
        .expect("object state")
        .context();
    let inner = ctx.clone();

    let err = ctx
        .filter_sync("foo", move |item| {
            let error = values.lock().expect("lock").remove(0);
            let write = inner.set_to(item.pointer(), "bar", Operation::err(error)).settled();
            Operation::from_future(async move {
                let result = write.await;
                Ok::<Value, Value>(json!(result.as_i64().is_some_and(|n| n < 10)))
            })
        })
        .await
        .expect_err("every write failed");

    assert_eq!(err.all_errors, vec![json!(1), json!(100), json!(1)]);
    assert_eq!(ctx.get("foo"), Some(json!([])));
}

#[tokio::test]
async fn bridged_inner_failures_bail_a_sequential_filter() {
    let ctx = Chain::from_value(json!({"foo": [{}, {}, {}]}))
        .expect("object state")
        .context();
    let inner = ctx.clone();

    let err = ctx
        .filter_sync("foo", move |item| {
            inner.set_to(item.pointer(), "bar", Operation::err(item.index as i64))
        })
        .await
        .expect_err("first write failed");

    assert_eq!(err.all_errors, vec![json!(0)]);
    assert_eq!(ctx.get("foo"), Some(json!([{}, {}, {}])));
}

#[tokio::test]
async fn catch_handlers_disable_the_bridge() -> anyhow::Result<()> {
    let chain = Chain::new().catch(|_, _| ());
    let ctx = chain.context();
    let settled = ctx.set("c", Operation::err(3)).await?;
    assert_eq!(settled.errors(), vec![json!(3)]);
    Ok(())
}
