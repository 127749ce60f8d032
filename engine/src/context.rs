//! The shared mutable store a chain's steps operate on.
//!
//! A [`Context`] is a cheap handle: clones observe the same fields and the
//! same error list. Every mutating method returns a [`SafeOp`] that swallows
//! failures into the error list and still resolves. No method of `Context`
//! fails on behalf of the caller's operation.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::future;
use serde_json::{Map, Value};

use stateful_config::ChainSettings;
use stateful_types::document::{self, End};
use stateful_types::{Bail, Check, ContextError, Projection};

use crate::operation::{IntoOperation, Operation, Rejection};
use crate::safe_op::{OpSettings, SafeOp};

struct State {
    fields: Map<String, Value>,
    errors: Vec<Value>,
}

struct Shared {
    state: Mutex<State>,
    /// Catch handlers registered on the owning chain; read by the await bridge.
    catch_handlers: AtomicUsize,
    settings: ChainSettings,
}

#[derive(Clone)]
pub struct Context {
    shared: Arc<Shared>,
}

impl Context {
    pub(crate) fn new(fields: Map<String, Value>, settings: ChainSettings) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    fields,
                    errors: Vec::new(),
                }),
                catch_handlers: AtomicUsize::new(0),
                settings,
            }),
        }
    }

    // The lock is only ever held for a single read or write, never across an await.
    fn lock(&self) -> MutexGuard<'_, State> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Value> {
        self.lock().fields.get(name).cloned()
    }

    /// Clone the value at a JSON pointer; `""` yields every field.
    #[must_use]
    pub fn pointer(&self, pointer: &str) -> Option<Value> {
        document::lookup(&self.lock().fields, pointer)
    }

    /// Write a field directly, returning the previous value.
    pub fn insert(&self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.lock().fields.insert(name.into(), value.into())
    }

    #[must_use]
    pub fn errors(&self) -> Vec<Value> {
        self.lock().errors.clone()
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.lock().errors.is_empty()
    }

    #[must_use]
    pub fn error_count(&self) -> usize {
        self.lock().errors.len()
    }

    /// Number of catch handlers registered on the owning chain.
    #[must_use]
    pub fn catch_handlers(&self) -> usize {
        self.shared.catch_handlers.load(Ordering::Acquire)
    }

    /// Whether both handles refer to the same context.
    #[must_use]
    pub fn same_as(&self, other: &Context) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    pub(crate) fn register_catch_handler(&self) {
        self.shared.catch_handlers.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn default_bail(&self) -> Bail {
        self.shared.settings.bail
    }

    fn condition_error(&self) -> Value {
        Value::String(self.shared.settings.condition_error.clone())
    }

    // ========================================================================
    // Error recording
    // ========================================================================

    pub(crate) fn record(&self, error: Value) {
        tracing::debug!(%error, "Recorded operation error");
        self.lock().errors.push(error);
    }

    pub(crate) fn record_rejection(&self, rejection: Rejection, error_override: Option<&Value>) {
        match (rejection, error_override) {
            (_, Some(error)) => self.record(error.clone()),
            (Rejection::Error(error), None) => self.record(error),
            // Already in the list; the bridge reported it.
            (Rejection::Recorded(_), None) => {}
        }
    }

    pub(crate) fn record_structural(&self, err: ContextError) {
        tracing::warn!("{err}");
        self.record(err.into_value());
    }

    /// The safe-operation adapter: settle `op`, diverting a failure into the
    /// error list. `None` means the operation failed.
    pub(crate) async fn adapt(&self, op: Operation, settings: &OpSettings) -> Option<Value> {
        match op.settle().await {
            Ok(value) => Some(value),
            Err(rejection) => {
                self.record_rejection(rejection, settings.error.as_ref());
                None
            }
        }
    }

    /// Apply a write to the field map, recording a structural failure.
    pub(crate) fn write<F>(&self, apply: F) -> bool
    where
        F: FnOnce(&mut Map<String, Value>) -> Result<(), ContextError>,
    {
        let result = apply(&mut self.lock().fields);
        match result {
            Ok(()) => true,
            Err(err) => {
                self.record_structural(err);
                false
            }
        }
    }

    pub(crate) fn sequence(&self, field: &str) -> Result<Vec<Value>, ContextError> {
        document::sequence(&self.lock().fields, field)
    }

    // ========================================================================
    // Safe mutations
    // ========================================================================

    /// Settle `op`, recording a failure. Resolves with the context.
    pub fn handle(&self, op: impl IntoOperation) -> SafeOp<Context> {
        let op = op.into_operation();
        SafeOp::new(self.clone(), move |ctx, settings| async move {
            ctx.adapt(op, &settings).await;
            ctx
        })
    }

    /// Assign the result of `op` to the field `name`. Resolves with the context.
    pub fn set(&self, name: impl Into<String>, op: impl IntoOperation) -> SafeOp<Context> {
        let ctx = self.clone();
        self.set_to("", name, op).map(move |_| ctx)
    }

    /// Assign the result of `op` to `target[name]`, `target` being a JSON
    /// pointer into the fields. Resolves with the result, or `null` when the
    /// operation or the write failed.
    pub fn set_to(
        &self,
        target: impl Into<String>,
        name: impl Into<String>,
        op: impl IntoOperation,
    ) -> SafeOp<Value> {
        let target = target.into();
        let name = name.into();
        let op = op.into_operation();
        SafeOp::new(self.clone(), move |ctx, settings| async move {
            let Some(value) = ctx.adapt(op, &settings).await else {
                return Value::Null;
            };
            if ctx.write(|fields| document::assign(fields, &target, &name, value.clone())) {
                value
            } else {
                Value::Null
            }
        })
    }

    /// Append the result of `op` to the sequence field `name`.
    pub fn push(&self, name: &str, op: impl IntoOperation) -> SafeOp<Context> {
        self.insert_into(document::field_pointer(name), End::Back, op.into_operation())
    }

    /// Prepend the result of `op` to the sequence field `name`.
    pub fn unshift(&self, name: &str, op: impl IntoOperation) -> SafeOp<Context> {
        self.insert_into(document::field_pointer(name), End::Front, op.into_operation())
    }

    /// Append the result of `op` to the array at the JSON pointer `target`.
    pub fn push_to(&self, target: impl Into<String>, op: impl IntoOperation) -> SafeOp<Context> {
        self.insert_into(target.into(), End::Back, op.into_operation())
    }

    /// Prepend the result of `op` to the array at the JSON pointer `target`.
    pub fn unshift_to(&self, target: impl Into<String>, op: impl IntoOperation) -> SafeOp<Context> {
        self.insert_into(target.into(), End::Front, op.into_operation())
    }

    fn insert_into(&self, target: String, end: End, op: Operation) -> SafeOp<Context> {
        SafeOp::new(self.clone(), move |ctx, settings| async move {
            if let Some(value) = ctx.adapt(op, &settings).await {
                ctx.write(|fields| document::insert(fields, &target, end, value));
            }
            ctx
        })
    }

    // ========================================================================
    // Conditional rejections
    // ========================================================================

    /// Record an error when `condition` holds: the `or_error` value, or the
    /// configured default ("Condition failed.").
    pub fn reject_if(&self, condition: bool) -> SafeOp<Context> {
        SafeOp::new(self.clone(), move |ctx, settings| {
            if condition {
                let error = settings.error.unwrap_or_else(|| ctx.condition_error());
                ctx.record(error);
            }
            future::ready(ctx)
        })
    }

    /// Record the error of the first check whose condition holds, then stop.
    ///
    /// A check without an error of its own falls back to `or_error`, then to
    /// the configured default.
    pub fn reject_if_any<I>(&self, checks: I) -> SafeOp<Context>
    where
        I: IntoIterator,
        I::Item: Into<Check>,
    {
        let checks: Vec<Check> = checks.into_iter().map(Into::into).collect();
        SafeOp::new(self.clone(), move |ctx, settings| {
            if let Some(check) = checks.into_iter().find(|check| check.condition) {
                let error = check
                    .error
                    .or(settings.error)
                    .unwrap_or_else(|| ctx.condition_error());
                ctx.record(error);
            }
            future::ready(ctx)
        })
    }

    /// Record an error only when every condition holds. An empty list records
    /// nothing.
    pub fn reject_if_all<I>(&self, conditions: I) -> SafeOp<Context>
    where
        I: IntoIterator<Item = bool>,
    {
        let mut conditions = conditions.into_iter().peekable();
        let all = conditions.peek().is_some() && conditions.all(|condition| condition);
        SafeOp::new(self.clone(), move |ctx, settings| {
            if all {
                let error = settings.error.unwrap_or_else(|| ctx.condition_error());
                ctx.record(error);
            }
            future::ready(ctx)
        })
    }

    // ========================================================================
    // Projections
    // ========================================================================

    /// Project the fields into a plain map. The error list is left out unless
    /// the projection asks for it.
    #[must_use]
    pub fn to_object(&self, projection: &Projection) -> Map<String, Value> {
        let state = self.lock();
        projection.apply(&state.fields, Some(&state.errors))
    }

    /// Project only the named fields that exist.
    #[must_use]
    pub fn to_partial_object<I, S>(&self, keys: I) -> Map<String, Value>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let state = self.lock();
        keys.into_iter()
            .filter_map(|key| {
                let key = key.as_ref();
                state
                    .fields
                    .get(key)
                    .map(|value| (key.to_string(), value.clone()))
            })
            .collect()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("Context")
            .field("fields", &state.fields)
            .field("errors", &state.errors)
            .field("catch_handlers", &self.catch_handlers())
            .finish()
    }
}
