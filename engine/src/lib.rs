//! Stateful chains: ordered async steps over one shared, mutable context.
//!
//! A [`Chain`] runs its steps one at a time. Steps mutate the chain's
//! [`Context`] through safe operations that never fail; a failing input is
//! recorded in the context's error list instead. Once a step leaves errors
//! behind, the remaining steps are skipped and the catch handlers run.
//!
//! ```no_run
//! use serde_json::json;
//! use stateful_engine::{Chain, Operation};
//!
//! # async fn demo() {
//! let ctx = Chain::from_value(json!({"items": [1, 2, 3]}))
//!     .expect("object state")
//!     .then(|ctx| ctx.map("items", |item| json!(item.value.as_i64().unwrap_or_default() * 2)))
//!     .then(|ctx| ctx.set("done", Operation::ok(true)))
//!     .catch(|_, errors| eprintln!("chain failed: {errors:?}"))
//!     .await;
//! # }
//! ```

mod batch;
mod bridge;
mod chain;
mod context;
mod executor;
pub mod interop;
mod iteration;
mod operation;
mod safe_op;

pub use bridge::AggregateError;
pub use chain::{Chain, Step};
pub use context::Context;
pub use executor::{EngineConfig, Executor, TokioExecutor};
pub use iteration::{Item, Sequential};
pub use operation::{IntoOperation, IntoValue, Operation, Outcome, Rejection};
pub use safe_op::{Batched, SafeOp};

pub use stateful_config::{ChainSettings, ConfigError};
pub use stateful_types::{Bail, Check, ContextError, ERRORS_KEY, Projection, StateError};
