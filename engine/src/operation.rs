//! Operation normalization.
//!
//! Every input a context method accepts is normalized into one [`Operation`]:
//! either a value that has already settled or a deferred future that will.
//! This module is the single place foreign deferred types are adapted.

use std::fmt;
use std::future::Future;

use futures_util::future::{BoxFuture, FutureExt};
use serde_json::Value;

use crate::bridge::AggregateError;
use crate::context::Context;
use crate::safe_op::SafeOp;

/// Why an operation failed.
#[derive(Debug)]
pub enum Rejection {
    /// A raw failure; the adapter records it (or its override).
    Error(Value),
    /// A failure the await bridge already reported. Its errors are in the
    /// context already, so the adapter records nothing unless overridden.
    Recorded(AggregateError),
}

impl Rejection {
    #[must_use]
    pub fn error(value: impl Into<Value>) -> Self {
        Self::Error(value.into())
    }
}

pub type Outcome = Result<Value, Rejection>;

/// A possibly failing asynchronous input.
pub enum Operation {
    Settled(Outcome),
    Deferred(BoxFuture<'static, Outcome>),
}

impl Operation {
    #[must_use]
    pub fn ok(value: impl Into<Value>) -> Self {
        Self::Settled(Ok(value.into()))
    }

    #[must_use]
    pub fn err(error: impl Into<Value>) -> Self {
        Self::Settled(Err(Rejection::error(error)))
    }

    /// Adapt any future yielding a `Result`.
    pub fn from_future<F, T, E>(future: F) -> Self
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        T: Into<Value>,
        E: Into<Value>,
    {
        Self::Deferred(
            future
                .map(|result| result.map(Into::into).map_err(Rejection::error))
                .boxed(),
        )
    }

    pub(crate) fn from_outcome<F>(future: F) -> Self
    where
        F: Future<Output = Outcome> + Send + 'static,
    {
        Self::Deferred(future.boxed())
    }

    #[must_use]
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Settled(_))
    }

    pub async fn settle(self) -> Outcome {
        match self {
            Self::Settled(outcome) => outcome,
            Self::Deferred(future) => future.await,
        }
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Settled(outcome) => f.debug_tuple("Settled").field(outcome).finish(),
            Self::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

/// Conversion into an [`Operation`].
///
/// Plain values are already-settled successes. Safe operations go through
/// the await bridge, so a bridge failure surfaces as [`Rejection::Recorded`].
pub trait IntoOperation {
    fn into_operation(self) -> Operation;
}

impl IntoOperation for Operation {
    fn into_operation(self) -> Operation {
        self
    }
}

impl IntoOperation for Value {
    fn into_operation(self) -> Operation {
        Operation::Settled(Ok(self))
    }
}

impl IntoOperation for () {
    fn into_operation(self) -> Operation {
        Operation::Settled(Ok(Value::Null))
    }
}

impl<T: Into<Value>, E: Into<Value>> IntoOperation for Result<T, E> {
    fn into_operation(self) -> Operation {
        Operation::Settled(self.map(Into::into).map_err(Rejection::error))
    }
}

impl<T> IntoOperation for SafeOp<T>
where
    T: IntoValue + Send + 'static,
{
    fn into_operation(self) -> Operation {
        Operation::from_outcome(async move {
            self.await
                .map(IntoValue::into_value)
                .map_err(Rejection::Recorded)
        })
    }
}

/// The value a settled safe operation contributes when used as an iterator
/// result.
pub trait IntoValue {
    fn into_value(self) -> Value;
}

impl IntoValue for Value {
    fn into_value(self) -> Value {
        self
    }
}

impl IntoValue for () {
    fn into_value(self) -> Value {
        Value::Null
    }
}

impl IntoValue for bool {
    fn into_value(self) -> Value {
        Value::Bool(self)
    }
}

/// A context contributes a snapshot of its fields.
impl IntoValue for Context {
    fn into_value(self) -> Value {
        Value::Object(self.to_object(&stateful_types::Projection::default()))
    }
}
