//! Waiting on a group of safe operations at once.

use futures_util::future::join_all;

use crate::context::Context;
use crate::safe_op::{Batched, SafeOp};

impl Context {
    /// Resolve with the context once every operation has settled.
    ///
    /// The operations run concurrently and record their own failures, so the
    /// error list follows settlement order. `or_error` on the batch itself has
    /// no effect.
    pub fn batch<I>(&self, ops: I) -> SafeOp<Context>
    where
        I: IntoIterator,
        I::Item: Into<Batched>,
    {
        let ops: Vec<Batched> = ops.into_iter().map(Into::into).collect();
        SafeOp::new(self.clone(), move |ctx, _settings| async move {
            let total = ops.len();
            join_all(ops.into_iter().map(|batched| batched.0)).await;
            tracing::trace!(total, "Batch settled");
            ctx
        })
    }
}
