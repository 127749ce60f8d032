//! Core domain types for stateful chains.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the workspace.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory

mod check;
pub mod document;
mod projection;

pub use check::Check;
pub use document::ContextError;
pub use projection::{ERRORS_KEY, Projection, project};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Default error recorded by a conditional rejection that carries no error of its own.
pub const DEFAULT_CONDITION_ERROR: &str = "Condition failed.";

// ============================================================================
// Initial State
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("the initial state of a chain must be an object of some kind (got {kind})")]
    NotAnObject { kind: &'static str },
}

/// Validate the initial state handed to a chain.
///
/// `null` is treated as an absent state and yields an empty field map.
pub fn initial_fields(value: Value) -> Result<Map<String, Value>, StateError> {
    match value {
        Value::Null => Ok(Map::new()),
        Value::Object(fields) => Ok(fields),
        other => Err(StateError::NotAnObject {
            kind: value_kind(&other),
        }),
    }
}

#[must_use]
pub const fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Loose truthiness used by `filter` and friends.
///
/// `null`, `false`, `0`, `NaN` and `""` are falsy; everything else is truthy.
#[must_use]
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

// ============================================================================
// Bail Policy
// ============================================================================

/// What a sequential combinator does after an iteration fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bail {
    /// Stop at the first failure; remaining items are never visited.
    #[default]
    OnFailure,
    /// Visit every item and record one error per failure.
    Never,
}

impl Bail {
    #[must_use]
    pub const fn stops_on_failure(self) -> bool {
        matches!(self, Self::OnFailure)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OnFailure => "on_failure",
            Self::Never => "never",
        }
    }
}
