//! Callback, hook and shared-document adapters used from chains.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Value, json};
use stateful_engine::interop::{add_prop, hook, wrap};

use crate::common::{Journal, chain, resolve_after};

#[tokio::test]
async fn wrapped_callbacks_feed_set() {
    let ctx = chain(json!({}))
        .then(|ctx| {
            let op = wrap(|callback| {
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    callback.node(None, "success");
                });
            });
            ctx.set("success", op)
        })
        .await;
    assert_eq!(ctx.get("success"), Some(json!("success")));
}

#[tokio::test]
async fn wrapped_callback_errors_reach_catch() {
    let journal = Journal::default();
    let (skipped, caught) = (journal.clone(), journal.clone());
    chain(json!({}))
        .then(|ctx| {
            let op = wrap(|callback| {
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    callback.node(Some(json!("fail")), Value::Null);
                });
            });
            ctx.set("success", op)
        })
        .then(move |_| skipped.note("should not run"))
        .catch(move |_, errors| caught.note(errors[0].to_string()))
        .await;
    assert_eq!(journal.entries(), vec![r#""fail""#]);
}

#[tokio::test]
async fn wrapped_blocking_work() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("a.txt"), "a").expect("write");
    std::fs::write(dir.path().join("b.txt"), "b").expect("write");
    let path = dir.path().to_path_buf();

    let ctx = chain(json!({}))
        .then(move |ctx| {
            let op = wrap(|callback| {
                tokio::task::spawn_blocking(move || match std::fs::read_dir(&path) {
                    Ok(entries) => callback.call(Ok::<Value, Value>(json!(entries.count()))),
                    Err(err) => callback.call(Err::<Value, Value>(json!(err.to_string()))),
                });
            });
            ctx.set("files", op)
        })
        .await;
    assert_eq!(ctx.get("files"), Some(json!(2)));
}

#[tokio::test]
async fn hooks_observe_results_before_they_land() {
    let seen = Arc::new(Mutex::new(None));
    let recorder = seen.clone();
    let ctx = chain(json!({}))
        .then(move |ctx| {
            ctx.set(
                "foo",
                hook(resolve_after(10, "foo"), move |value, resume| {
                    *recorder.lock().expect("lock") = Some(value.clone());
                    resume.resume();
                }),
            )
        })
        .await;
    assert_eq!(ctx.get("foo"), Some(json!("foo")));
    assert_eq!(*seen.lock().expect("lock"), Some(json!("foo")));
}

#[tokio::test]
async fn add_prop_fills_elements_from_for_each() {
    let ctx = chain(json!({"foo": [{}, {}, {}]})).context();
    let shared = Arc::new(Mutex::new(json!({"foo": [{}, {}, {}]})));
    let doc = shared.clone();
    ctx.for_each("foo", move |item| {
        add_prop(doc.clone(), format!("/foo/{}", item.index), "name", resolve_after(10, "bar"))
    })
    .await
    .expect("every write succeeded");

    assert_eq!(
        *shared.lock().expect("lock"),
        json!({"foo": [{"name": "bar"}, {"name": "bar"}, {"name": "bar"}]})
    );
}

#[tokio::test]
async fn add_prop_cooperates_with_map() {
    let shared = Arc::new(Mutex::new(json!({"bar": [{}, {}, {}]})));
    let doc = shared.clone();
    let ctx = chain(json!({"foo": [{}, {}, {}]}))
        .then(move |ctx| {
            ctx.map("foo", move |item| {
                let target = format!("/bar/{}", item.index);
                add_prop(doc.clone(), target, "name", resolve_after(10, json!({"name": "baz"})))
            })
        })
        .await;

    assert_eq!(ctx.get("foo"), Some(json!([{"name": "baz"}, {"name": "baz"}, {"name": "baz"}])));
    let bar = shared.lock().expect("lock")["bar"].clone();
    assert_eq!(
        bar,
        json!([
            {"name": {"name": "baz"}},
            {"name": {"name": "baz"}},
            {"name": {"name": "baz"}}
        ])
    );
}
