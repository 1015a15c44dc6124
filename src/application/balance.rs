use crate::domain::account::{Account, AccountId};
use crate::domain::lock_order::lock_order;
use crate::domain::ports::LedgerTx;
use crate::error::{LedgerError, Result};
use tracing::trace;

/// Adds `delta` to an account's balance inside an open scope.
///
/// The caller must already hold the row lock; this function never decides
/// lock order on its own.
pub async fn add_account_balance(
    tx: &mut dyn LedgerTx,
    id: AccountId,
    delta: i64,
) -> Result<Account> {
    let account = tx.add_account_balance(id, delta).await?;
    trace!(account = %id, delta, balance = account.balance, "balance adjusted");
    Ok(account)
}

/// Applies two balance adjustments, lower account id first.
///
/// Returns the updated rows in argument order.
pub async fn add_money(
    tx: &mut dyn LedgerTx,
    (id1, delta1): (AccountId, i64),
    (id2, delta2): (AccountId, i64),
) -> Result<(Account, Account)> {
    if id1 == id2 {
        return Err(LedgerError::ValidationError(format!(
            "Balance pair must name two accounts, got {} twice",
            id1
        )));
    }

    let order = lock_order(id1, id2);
    let (first_delta, second_delta) = order.arrange(delta1, delta2);
    let first = add_account_balance(tx, order.first, first_delta).await?;
    let second = add_account_balance(tx, order.second, second_delta).await?;
    Ok(order.restore(first, second))
}
