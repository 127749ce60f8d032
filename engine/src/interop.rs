//! Adapters for code that does not speak [`Operation`].

use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;
use tokio::sync::oneshot;

use stateful_types::document;
use stateful_types::truthy;

use crate::operation::{IntoOperation, Operation, Rejection};

/// Completion handle passed to the callee of [`wrap`].
#[derive(Debug)]
pub struct Callback(oneshot::Sender<Result<Value, Value>>);

impl Callback {
    pub fn call<T, E>(self, result: Result<T, E>)
    where
        T: Into<Value>,
        E: Into<Value>,
    {
        if self.0.send(result.map(Into::into).map_err(Into::into)).is_err() {
            tracing::trace!("Callback result discarded; operation was dropped");
        }
    }

    /// Node-style completion: a truthy `err` fails, anything else succeeds
    /// with `result`.
    pub fn node(self, err: Option<Value>, result: impl Into<Value>) {
        match err.filter(truthy) {
            Some(err) => self.call(Err::<Value, _>(err)),
            None => self.call(Ok::<Value, Value>(result.into())),
        }
    }
}

/// Turn callback-style completion into an [`Operation`].
///
/// `start` runs immediately. A callback dropped without being called settles
/// as a failure.
pub fn wrap<F>(start: F) -> Operation
where
    F: FnOnce(Callback),
{
    let (tx, rx) = oneshot::channel();
    start(Callback(tx));
    Operation::from_outcome(async move {
        match rx.await {
            Ok(result) => result.map_err(Rejection::Error),
            Err(_) => Err(Rejection::error("callback dropped without being called")),
        }
    })
}

/// Lets a [`hook`] side effect release the original result.
#[derive(Debug)]
pub struct Resume(oneshot::Sender<()>);

impl Resume {
    pub fn resume(self) {
        if self.0.send(()).is_err() {
            tracing::trace!("Resume ignored; operation was dropped");
        }
    }
}

/// Run `side_effect` once `op` succeeds, settling with the original result
/// after the side effect calls [`Resume::resume`]. Failures pass through
/// without running it.
pub fn hook<F>(op: impl IntoOperation, side_effect: F) -> Operation
where
    F: FnOnce(&Value, Resume) + Send + 'static,
{
    let op = op.into_operation();
    Operation::from_outcome(async move {
        let value = match op.settle().await {
            Ok(value) => value,
            Err(rejection) => return Err(rejection),
        };
        let (tx, rx) = oneshot::channel();
        side_effect(&value, Resume(tx));
        match rx.await {
            Ok(()) => Ok(value),
            Err(_) => Err(Rejection::error("hook dropped its resume handle")),
        }
    })
}

/// Assign the result of `op` to `target[name]` inside a shared document,
/// `target` being a JSON pointer. Settles with the assigned value; a failed
/// write fails the operation.
pub fn add_prop(
    shared: Arc<Mutex<Value>>,
    target: impl Into<String>,
    name: impl Into<String>,
    op: impl IntoOperation,
) -> Operation {
    let target = target.into();
    let name = name.into();
    let op = op.into_operation();
    Operation::from_outcome(async move {
        let value = match op.settle().await {
            Ok(value) => value,
            Err(rejection) => return Err(rejection),
        };
        let mut root = shared.lock().unwrap_or_else(PoisonError::into_inner);
        match document::assign_in(&mut root, &target, &name, value.clone()) {
            Ok(()) => Ok(value),
            Err(err) => Err(Rejection::Error(err.into_value())),
        }
    })
}
