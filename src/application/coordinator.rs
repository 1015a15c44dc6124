use super::context::Context;
use crate::domain::ports::{LedgerStoreRef, LedgerTx};
use crate::error::{LedgerError, Result};
use futures::future::BoxFuture;
use tracing::{debug, warn};

/// Runs units of work inside a single begin/commit/rollback scope.
///
/// Exactly one of commit or rollback is issued per [`TxCoordinator::exec_tx`]
/// call. Nested scopes are not supported: a unit of work only ever sees the
/// handle it was given.
#[derive(Clone)]
pub struct TxCoordinator {
    store: LedgerStoreRef,
}

impl TxCoordinator {
    pub fn new(store: LedgerStoreRef) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &LedgerStoreRef {
        &self.store
    }

    /// Executes `unit_of_work` with a transaction-scoped handle.
    ///
    /// On success the scope is committed and the value returned. On error,
    /// cancellation or deadline the scope is rolled back and the original error
    /// returned; if the rollback itself fails the result is
    /// [`LedgerError::RollbackFailed`] carrying both causes.
    pub async fn exec_tx<T, F>(&self, ctx: &Context, unit_of_work: F) -> Result<T>
    where
        T: Send,
        F: for<'t> FnOnce(&'t mut dyn LedgerTx) -> BoxFuture<'t, Result<T>> + Send,
    {
        if let Some(reason) = ctx.err() {
            return Err(reason.into());
        }

        let mut tx = tokio::select! {
            biased;
            reason = ctx.done() => return Err(reason.into()),
            tx = self.store.begin_with_deadline(ctx.deadline()) => tx?,
        };

        let outcome = tokio::select! {
            biased;
            reason = ctx.done() => Err(LedgerError::from(reason)),
            result = unit_of_work(&mut *tx) => result,
        };

        // A context that ran out while the work was finishing must not commit.
        let outcome = match (outcome, ctx.err()) {
            (Ok(_), Some(reason)) => Err(LedgerError::from(reason)),
            (outcome, _) => outcome,
        };

        match outcome {
            Ok(value) => {
                tx.commit().await?;
                debug!("transaction committed");
                Ok(value)
            }
            Err(err) => {
                warn!(error = %err, "rolling back transaction");
                match tx.rollback().await {
                    Ok(()) => Err(err),
                    Err(rollback) => Err(LedgerError::RollbackFailed {
                        source: Box::new(err),
                        rollback,
                    }),
                }
            }
        }
    }
}
