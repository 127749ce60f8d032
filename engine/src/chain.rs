//! The step/catch run loop.
//!
//! A chain owns one [`Context`], an ordered queue of steps and an ordered
//! queue of catch handlers. Steps run one at a time. As soon as a step leaves
//! errors in the context, the remaining steps are abandoned and every catch
//! handler runs in registration order, each receiving the full error list.
//! Nothing runs until the chain is driven, so catch handlers registered after
//! the last step still count.

use std::fmt;
use std::future::{Future, IntoFuture};
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};
use serde_json::{Map, Value};

use stateful_types::{StateError, initial_fields};

use crate::context::Context;
use crate::executor::{EngineConfig, Executor};
use crate::iteration::Sequential;
use crate::safe_op::SafeOp;

/// What a step or catch handler hands back to the run loop.
#[must_use]
pub enum Step {
    /// Nothing to wait for.
    Done,
    /// Wait for this before branching.
    Wait(BoxFuture<'static, ()>),
}

impl Step {
    /// Wait for an arbitrary future; its output is discarded.
    pub fn wait<F>(future: F) -> Self
    where
        F: Future + Send + 'static,
    {
        Self::Wait(future.map(drop).boxed())
    }

    async fn finish(self) {
        if let Self::Wait(future) = self {
            future.await;
        }
    }
}

impl From<()> for Step {
    fn from((): ()) -> Self {
        Self::Done
    }
}

impl From<Context> for Step {
    fn from(_: Context) -> Self {
        Self::Done
    }
}

impl<T: Send + 'static> From<SafeOp<T>> for Step {
    fn from(op: SafeOp<T>) -> Self {
        Self::wait(op.settled())
    }
}

impl From<Sequential> for Step {
    fn from(op: Sequential) -> Self {
        Self::wait(op.settled())
    }
}

impl<S: Into<Step>> From<Option<S>> for Step {
    fn from(step: Option<S>) -> Self {
        step.map_or(Self::Done, Into::into)
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Done => f.write_str("Done"),
            Self::Wait(_) => f.write_str("Wait(..)"),
        }
    }
}

type StepFn = Box<dyn FnOnce(Context) -> Step + Send>;
type CatchFn = Box<dyn FnOnce(Context, Vec<Value>) -> Step + Send>;

#[must_use = "chains do nothing unless run, awaited or spawned"]
pub struct Chain {
    context: Context,
    steps: Vec<StepFn>,
    catchers: Vec<CatchFn>,
    executor: Arc<dyn Executor>,
}

impl Chain {
    pub fn new() -> Self {
        Self::from_fields(Map::new())
    }

    pub fn from_fields(fields: Map<String, Value>) -> Self {
        Self::with_config(&EngineConfig::default(), fields)
    }

    /// Build a chain over an initial state. `null` means no fields; any other
    /// non-object value is rejected.
    pub fn from_value(value: Value) -> Result<Self, StateError> {
        Ok(Self::from_fields(initial_fields(value)?))
    }

    pub fn with_config(config: &EngineConfig, fields: Map<String, Value>) -> Self {
        Self {
            context: Context::new(fields, config.settings().clone()),
            steps: Vec::new(),
            catchers: Vec::new(),
            executor: Arc::clone(config.executor()),
        }
    }

    /// A handle to the chain's context.
    #[must_use]
    pub fn context(&self) -> Context {
        self.context.clone()
    }

    pub fn then<F, S>(mut self, step: F) -> Self
    where
        F: FnOnce(Context) -> S + Send + 'static,
        S: Into<Step>,
    {
        self.steps.push(Box::new(move |ctx| step(ctx).into()));
        self
    }

    /// Register a catch handler. It receives the context and the error list
    /// as it stands when the handler runs.
    pub fn catch<F, S>(mut self, handler: F) -> Self
    where
        F: FnOnce(Context, Vec<Value>) -> S + Send + 'static,
        S: Into<Step>,
    {
        self.context.register_catch_handler();
        self.catchers
            .push(Box::new(move |ctx, errors| handler(ctx, errors).into()));
        self
    }

    /// Drive the chain to completion and hand back its context.
    pub async fn run(self) -> Context {
        let Self {
            context,
            steps,
            catchers,
            ..
        } = self;
        tracing::debug!(
            steps = steps.len(),
            catchers = catchers.len(),
            "Running chain"
        );

        let mut failed_at = None;
        for (index, step) in steps.into_iter().enumerate() {
            step(context.clone()).finish().await;
            if context.has_errors() {
                failed_at = Some(index);
                break;
            }
        }

        if let Some(index) = failed_at {
            tracing::debug!(
                step = index,
                errors = context.error_count(),
                "Step recorded errors; running catch handlers"
            );
            for catcher in catchers {
                let errors = context.errors();
                catcher(context.clone(), errors).finish().await;
            }
        }

        tracing::debug!(errors = context.error_count(), "Chain finished");
        context
    }

    /// Run the chain on the configured executor without waiting for it.
    pub fn spawn(self) {
        let executor = Arc::clone(&self.executor);
        executor.spawn(self.run().map(drop).boxed());
    }
}

impl Default for Chain {
    fn default() -> Self {
        Self::new()
    }
}

impl IntoFuture for Chain {
    type Output = Context;
    type IntoFuture = BoxFuture<'static, Context>;

    fn into_future(self) -> Self::IntoFuture {
        self.run().boxed()
    }
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("context", &self.context)
            .field("steps", &self.steps.len())
            .field("catchers", &self.catchers.len())
            .finish_non_exhaustive()
    }
}
