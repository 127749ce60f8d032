//! Iteration combinators over a sequence field of a context.
//!
//! Parallel combinators invoke the iterator for every element in index order
//! before awaiting any of them and observe settlements in completion order.
//! Sequential combinators start element `i + 1` only after element `i` settled.
//!
//! `filter` accumulates kept elements in settlement order, so the parallel
//! variant does not preserve the original order. `filter_sync` does.

use std::future::IntoFuture;

use futures_util::StreamExt;
use futures_util::future::BoxFuture;
use futures_util::stream::FuturesUnordered;
use serde_json::Value;

use stateful_types::document::{self, child_pointer, field_pointer};
use stateful_types::{Bail, truthy};

use crate::bridge::AggregateError;
use crate::context::Context;
use crate::operation::{IntoOperation, Operation};
use crate::safe_op::{Batched, OpSettings, SafeOp};

/// One element handed to an iterator.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    /// Snapshot of the element when the combinator started.
    pub value: Value,
    pub index: usize,
    pointer: String,
}

impl Item {
    fn new(value: Value, index: usize, parent: &str) -> Self {
        Self {
            value,
            index,
            pointer: child_pointer(parent, &index.to_string()),
        }
    }

    /// JSON pointer of the element inside the context, for in-place writes
    /// such as `ctx.set_to(item.pointer(), "name", op)`.
    #[must_use]
    pub fn pointer(&self) -> &str {
        &self.pointer
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Collect {
    Nothing,
    Map,
    Filter,
}

/// What the collector sees each time an iteration settles.
#[derive(Debug)]
struct Settlement {
    index: usize,
    /// `None` when the iteration failed.
    result: Option<Value>,
    is_first_result: bool,
    is_last_result: bool,
}

struct Collector {
    field: String,
    field_pointer: String,
    collect: Collect,
    kept: Vec<Value>,
}

impl Collector {
    fn new(field: &str, collect: Collect) -> Self {
        Self {
            field: field.to_string(),
            field_pointer: field_pointer(field),
            collect,
            kept: Vec::new(),
        }
    }

    fn observe(&mut self, ctx: &Context, settlement: Settlement) {
        match self.collect {
            Collect::Nothing => {}
            Collect::Map => {
                if let Some(result) = settlement.result {
                    let index = settlement.index.to_string();
                    ctx.write(|fields| document::assign(fields, &self.field_pointer, &index, result));
                }
            }
            Collect::Filter => {
                // Failed settlements still count toward first and last, but
                // neither seed nor replace the field.
                let Some(result) = settlement.result else {
                    return;
                };
                if settlement.is_first_result {
                    self.kept.clear();
                }
                if truthy(&result) {
                    // Read the element as it is now, so writes made by the
                    // iterator through `Item::pointer` are kept.
                    let pointer = child_pointer(&self.field_pointer, &settlement.index.to_string());
                    if let Some(current) = ctx.pointer(&pointer) {
                        self.kept.push(current);
                    }
                }
                if settlement.is_last_result {
                    ctx.insert(self.field.clone(), Value::Array(std::mem::take(&mut self.kept)));
                }
            }
        }
    }
}

async fn fan_out<F, O>(
    ctx: Context,
    field: String,
    mut iterator: F,
    collect: Collect,
    settings: OpSettings,
) -> Context
where
    F: FnMut(Item) -> O,
    O: IntoOperation + 'static,
{
    let items = match ctx.sequence(&field) {
        Ok(items) => items,
        Err(err) => {
            ctx.record_structural(err);
            return ctx;
        }
    };
    let total = items.len();
    let base = field_pointer(&field);

    let mut pending: FuturesUnordered<_> = items
        .into_iter()
        .enumerate()
        .map(|(index, value)| {
            let op = iterator(Item::new(value, index, &base)).into_operation();
            async move { (index, op.settle().await) }
        })
        .collect();

    let mut collector = Collector::new(&field, collect);
    let mut settled = 0;
    while let Some((index, outcome)) = pending.next().await {
        settled += 1;
        let result = match outcome {
            Ok(value) => Some(value),
            Err(rejection) => {
                ctx.record_rejection(rejection, settings.error.as_ref());
                None
            }
        };
        collector.observe(
            &ctx,
            Settlement {
                index,
                result,
                is_first_result: settled == 1,
                is_last_result: settled == total,
            },
        );
    }
    ctx
}

async fn in_sequence<F, O>(
    ctx: Context,
    field: String,
    mut iterator: F,
    collect: Collect,
    settings: OpSettings,
) -> Context
where
    F: FnMut(Item) -> O,
    O: IntoOperation + 'static,
{
    let items = match ctx.sequence(&field) {
        Ok(items) => items,
        Err(err) => {
            ctx.record_structural(err);
            return ctx;
        }
    };
    let bail = settings.bail.unwrap_or_else(|| ctx.default_bail());
    let total = items.len();
    let base = field_pointer(&field);
    let mut collector = Collector::new(&field, collect);

    for (index, value) in items.into_iter().enumerate() {
        let op: Operation = iterator(Item::new(value, index, &base)).into_operation();
        let outcome = op.settle().await;
        let failed = outcome.is_err();
        let result = match outcome {
            Ok(value) => Some(value),
            Err(rejection) => {
                ctx.record_rejection(rejection, settings.error.as_ref());
                None
            }
        };
        collector.observe(
            &ctx,
            Settlement {
                index,
                result,
                is_first_result: index == 0,
                is_last_result: index + 1 == total,
            },
        );
        if failed && bail.stops_on_failure() {
            tracing::debug!(field = %field, index, total, "Bailing out of sequential iteration");
            break;
        }
    }
    ctx
}

/// A sequential combinator; bails on the first failure unless told otherwise.
#[must_use = "safe operations do nothing unless awaited"]
#[derive(Debug)]
pub struct Sequential(SafeOp<Context>);

impl Sequential {
    /// Visit every element regardless of failures.
    pub fn no_bail(self) -> Self {
        self.bail(Bail::Never)
    }

    pub fn bail(mut self, bail: Bail) -> Self {
        self.0.settings.bail = Some(bail);
        self
    }

    pub fn or_error(self, error: impl Into<Value>) -> Self {
        Self(self.0.or_error(error))
    }

    pub fn settled(self) -> BoxFuture<'static, Context> {
        self.0.settled()
    }

    pub fn into_safe_op(self) -> SafeOp<Context> {
        self.0
    }
}

impl From<Sequential> for SafeOp<Context> {
    fn from(sequential: Sequential) -> Self {
        sequential.0
    }
}

impl From<Sequential> for Batched {
    fn from(sequential: Sequential) -> Self {
        sequential.0.into()
    }
}

impl IntoFuture for Sequential {
    type Output = Result<Context, AggregateError>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        self.0.into_future()
    }
}

impl IntoOperation for Sequential {
    fn into_operation(self) -> Operation {
        self.0.into_operation()
    }
}

impl Context {
    fn parallel<F, O>(&self, field: String, iterator: F, collect: Collect) -> SafeOp<Context>
    where
        F: FnMut(Item) -> O + Send + 'static,
        O: IntoOperation + 'static,
    {
        SafeOp::new(self.clone(), move |ctx, settings| {
            fan_out(ctx, field, iterator, collect, settings)
        })
    }

    fn sequential<F, O>(&self, field: String, iterator: F, collect: Collect) -> Sequential
    where
        F: FnMut(Item) -> O + Send + 'static,
        O: IntoOperation + 'static,
    {
        Sequential(SafeOp::new(self.clone(), move |ctx, settings| {
            in_sequence(ctx, field, iterator, collect, settings)
        }))
    }

    /// Run `iterator` over every element of `field` concurrently.
    pub fn for_each<F, O>(&self, field: impl Into<String>, iterator: F) -> SafeOp<Context>
    where
        F: FnMut(Item) -> O + Send + 'static,
        O: IntoOperation + 'static,
    {
        self.parallel(field.into(), iterator, Collect::Nothing)
    }

    /// Like [`Context::for_each`], writing each result back over its element.
    pub fn map<F, O>(&self, field: impl Into<String>, iterator: F) -> SafeOp<Context>
    where
        F: FnMut(Item) -> O + Send + 'static,
        O: IntoOperation + 'static,
    {
        self.parallel(field.into(), iterator, Collect::Map)
    }

    /// Keep the elements whose result is truthy, in settlement order. A
    /// failing last settlement leaves the field unchanged.
    pub fn filter<F, O>(&self, field: impl Into<String>, iterator: F) -> SafeOp<Context>
    where
        F: FnMut(Item) -> O + Send + 'static,
        O: IntoOperation + 'static,
    {
        self.parallel(field.into(), iterator, Collect::Filter)
    }

    pub fn for_each_sync<F, O>(&self, field: impl Into<String>, iterator: F) -> Sequential
    where
        F: FnMut(Item) -> O + Send + 'static,
        O: IntoOperation + 'static,
    {
        self.sequential(field.into(), iterator, Collect::Nothing)
    }

    pub fn map_sync<F, O>(&self, field: impl Into<String>, iterator: F) -> Sequential
    where
        F: FnMut(Item) -> O + Send + 'static,
        O: IntoOperation + 'static,
    {
        self.sequential(field.into(), iterator, Collect::Map)
    }

    /// Keep the elements whose result is truthy, preserving index order. A
    /// bail, or a failing last element, leaves the field unchanged.
    pub fn filter_sync<F, O>(&self, field: impl Into<String>, iterator: F) -> Sequential
    where
        F: FnMut(Item) -> O + Send + 'static,
        O: IntoOperation + 'static,
    {
        self.sequential(field.into(), iterator, Collect::Filter)
    }
}
