use super::balance::add_money;
use super::context::Context;
use super::coordinator::TxCoordinator;
use crate::domain::account::{Account, AccountId};
use crate::domain::lock_order::lock_order;
use crate::domain::ports::{LedgerStoreRef, LedgerTx};
use crate::domain::transfer::{
    CreateEntryParams, CreateTransferParams, TransferState, TransferTxParams, TransferTxResult,
};
use crate::error::{LedgerError, Result};
use futures::FutureExt;
use tracing::{debug, instrument};

/// Moves money between two accounts atomically.
///
/// The engine holds no shared mutable state of its own; concurrent transfers
/// serialize on the store's row locks, always taken in ascending account id
/// order.
#[derive(Clone)]
pub struct TransferEngine {
    coordinator: TxCoordinator,
}

impl TransferEngine {
    pub fn new(store: LedgerStoreRef) -> Self {
        Self {
            coordinator: TxCoordinator::new(store),
        }
    }

    pub fn store(&self) -> &LedgerStoreRef {
        self.coordinator.store()
    }

    /// Transfers `params.amount` from one account to another.
    ///
    /// Creates one transfer record and two entries and updates both balances,
    /// or leaves no trace at all.
    #[instrument(
        name = "transfer_tx",
        skip(self, ctx),
        fields(
            from = %params.from_account_id,
            to = %params.to_account_id,
            amount = params.amount,
        )
    )]
    pub async fn transfer_tx(
        &self,
        ctx: &Context,
        params: TransferTxParams,
    ) -> Result<TransferTxResult> {
        let amount = params.validate()?;
        let from_id = params.from_account_id;
        let to_id = params.to_account_id;

        let result = self
            .coordinator
            .exec_tx(ctx, move |tx| {
                async move {
                    let mut state = Progress::new();

                    let (from_account, _) = lock_two_accounts(tx, from_id, to_id).await?;
                    state.advance(TransferState::LocksAcquired);

                    if !from_account.can_cover(amount) {
                        return Err(LedgerError::InsufficientFunds {
                            account_id: from_id,
                            balance: from_account.balance,
                            amount: amount.value(),
                        });
                    }
                    state.advance(TransferState::FundsValidated);

                    let transfer = tx
                        .create_transfer(CreateTransferParams {
                            from_account_id: from_id,
                            to_account_id: to_id,
                            amount: amount.value(),
                        })
                        .await?;
                    let from_entry = tx
                        .create_entry(CreateEntryParams {
                            account_id: from_id,
                            amount: amount.debit(),
                        })
                        .await?;
                    let to_entry = tx
                        .create_entry(CreateEntryParams {
                            account_id: to_id,
                            amount: amount.credit(),
                        })
                        .await?;
                    state.advance(TransferState::RecordsWritten);

                    let (from_account, to_account) =
                        add_money(tx, (from_id, amount.debit()), (to_id, amount.credit()))
                            .await?;
                    state.advance(TransferState::BalancesUpdated);

                    Ok(TransferTxResult {
                        transfer,
                        from_account,
                        to_account,
                        from_entry,
                        to_entry,
                    })
                }
                .boxed()
            })
            .await;

        match &result {
            Ok(res) => debug!(
                state = ?TransferState::Committed,
                transfer_id = res.transfer.id,
                "transfer committed"
            ),
            Err(err) => debug!(state = ?TransferState::RolledBack, error = %err, "transfer failed"),
        }
        result
    }
}

/// Takes exclusive locks on both accounts, lower id first.
///
/// Returns the locked rows in argument order.
pub async fn lock_two_accounts(
    tx: &mut dyn LedgerTx,
    id1: AccountId,
    id2: AccountId,
) -> Result<(Account, Account)> {
    let order = lock_order(id1, id2);
    let first = lock_account(tx, order.first).await?;
    let second = lock_account(tx, order.second).await?;
    Ok(order.restore(first, second))
}

async fn lock_account(tx: &mut dyn LedgerTx, id: AccountId) -> Result<Account> {
    tx.get_account_for_update(id)
        .await?
        .ok_or(LedgerError::NotFound(id))
}

/// Tracks the in-flight part of the transfer state machine for logging.
struct Progress {
    state: TransferState,
}

impl Progress {
    fn new() -> Self {
        debug!(state = ?TransferState::Started);
        Self {
            state: TransferState::Started,
        }
    }

    fn advance(&mut self, next: TransferState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid transfer transition {:?} -> {:?}",
            self.state,
            next
        );
        debug!(state = ?next);
        self.state = next;
    }
}
