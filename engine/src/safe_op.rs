//! Safe operations: deferred values that always settle successfully.

use std::fmt;
use std::future::{Future, IntoFuture};

use futures_util::future::{BoxFuture, FutureExt};
use serde_json::Value;

use stateful_types::Bail;

use crate::bridge::{self, AggregateError};
use crate::context::Context;

/// Per-call knobs read by the adapter when the operation runs.
#[derive(Debug, Clone, Default)]
pub(crate) struct OpSettings {
    /// Recorded instead of the raw failure value.
    pub(crate) error: Option<Value>,
    /// Only read by the sequential combinators; `None` means the context default.
    pub(crate) bail: Option<Bail>,
}

type Run<T> = Box<dyn FnOnce(Context, OpSettings) -> BoxFuture<'static, T> + Send>;

/// A deferred value guaranteed to settle exactly once, always as success.
///
/// Failures of the underlying operation are diverted into the context's
/// error list. Nothing runs until the operation is awaited, batched, or
/// returned from a chain step.
///
/// Awaiting a `SafeOp` directly goes through the await bridge and yields
/// `Result<T, AggregateError>`; use [`SafeOp::settled`] to opt out of it.
#[must_use = "safe operations do nothing unless awaited"]
pub struct SafeOp<T = Context> {
    context: Context,
    pub(crate) settings: OpSettings,
    run: Run<T>,
}

impl<T: Send + 'static> SafeOp<T> {
    pub(crate) fn new<F, Fut>(context: Context, run: F) -> Self
    where
        F: FnOnce(Context, OpSettings) -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        Self {
            context,
            settings: OpSettings::default(),
            run: Box::new(move |context, settings| run(context, settings).boxed()),
        }
    }

    /// Record `error` instead of the raw failure value.
    ///
    /// For `reject_if*` this is the error recorded when a condition holds.
    /// `batch` records nothing itself and ignores it.
    pub fn or_error(mut self, error: impl Into<Value>) -> Self {
        self.settings.error = Some(error.into());
        self
    }

    /// The context this operation writes into.
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Run the operation without the await bridge. Never fails.
    pub fn settled(self) -> BoxFuture<'static, T> {
        (self.run)(self.context, self.settings)
    }

    pub fn map<U, F>(self, f: F) -> SafeOp<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        let Self {
            context,
            settings,
            run,
        } = self;
        SafeOp {
            context,
            settings,
            run: Box::new(move |context, settings| run(context, settings).map(f).boxed()),
        }
    }
}

impl<T: Send + 'static> IntoFuture for SafeOp<T> {
    type Output = Result<T, AggregateError>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        let context = self.context.clone();
        let settled = self.settled();
        async move {
            let value = settled.await;
            bridge::check(&context)?;
            Ok(value)
        }
        .boxed()
    }
}

impl<T> fmt::Debug for SafeOp<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SafeOp")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// A type-erased safe operation accepted by [`Context::batch`].
pub struct Batched(pub(crate) BoxFuture<'static, ()>);

impl<T: Send + 'static> From<SafeOp<T>> for Batched {
    fn from(op: SafeOp<T>) -> Self {
        Self(op.settled().map(drop).boxed())
    }
}

impl fmt::Debug for Batched {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Batched(..)")
    }
}
