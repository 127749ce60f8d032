//! Await-compatibility bridge.
//!
//! Chain-style consumers observe failures through catch handlers and never see
//! a failing future. Await-style consumers have no catch handler, so a safe
//! operation that settles while the context holds errors is converted into a
//! hard [`AggregateError`] instead.

use serde_json::Value;
use thiserror::Error;

use crate::context::Context;

/// Failure synthesized at the await boundary.
#[derive(Debug, Clone, Error)]
#[error("chain failed: {first_error} ({} error(s) recorded)", .all_errors.len())]
pub struct AggregateError {
    pub first_error: Value,
    pub all_errors: Vec<Value>,
    pub context: Context,
}

/// Fail when the context holds errors nobody else would observe.
pub(crate) fn check(context: &Context) -> Result<(), AggregateError> {
    if context.catch_handlers() > 0 {
        return Ok(());
    }
    let all_errors = context.errors();
    let Some(first_error) = all_errors.first().cloned() else {
        return Ok(());
    };
    tracing::debug!(
        errors = all_errors.len(),
        "No catch handler registered; raising aggregate error"
    );
    Err(AggregateError {
        first_error,
        all_errors,
        context: context.clone(),
    })
}
