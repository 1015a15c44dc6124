use super::context::Context;
use super::engine::TransferEngine;
use crate::domain::account::{Account, AccountId, CreateAccountParams};
use crate::domain::ports::LedgerStoreRef;
use crate::domain::transfer::{TransferTxParams, TransferTxResult};
use crate::error::{LedgerError, Result};
use tracing::info;

/// The calling layer in front of the transfer engine.
///
/// Owns the checks the engine leaves to its callers, such as making sure both
/// accounts share the transfer currency.
pub struct Ledger {
    engine: TransferEngine,
}

impl Ledger {
    pub fn new(store: LedgerStoreRef) -> Self {
        Self {
            engine: TransferEngine::new(store),
        }
    }

    pub fn engine(&self) -> &TransferEngine {
        &self.engine
    }

    pub async fn open_account(&self, params: CreateAccountParams) -> Result<Account> {
        params.validate()?;
        let account = self.engine.store().create_account(params).await?;
        info!(account = %account.id, owner = %account.owner, currency = %account.currency, "account opened");
        Ok(account)
    }

    /// Transfers money after checking both accounts exist and hold `currency`.
    pub async fn transfer(
        &self,
        ctx: &Context,
        params: TransferTxParams,
        currency: Option<&str>,
    ) -> Result<TransferTxResult> {
        let from = self.valid_account(params.from_account_id, currency).await?;
        self.valid_account(params.to_account_id, Some(from.currency.as_str()))
            .await?;
        self.engine.transfer_tx(ctx, params).await
    }

    async fn valid_account(&self, id: AccountId, currency: Option<&str>) -> Result<Account> {
        let account = self
            .engine
            .store()
            .get_account(id)
            .await?
            .ok_or(LedgerError::NotFound(id))?;

        if let Some(currency) = currency
            && account.currency != currency
        {
            return Err(LedgerError::ValidationError(format!(
                "Account {} currency mismatch: {} with {}",
                id, account.currency, currency
            )));
        }
        Ok(account)
    }

    /// Final state of every account, ordered by id.
    pub async fn into_results(self) -> Result<Vec<Account>> {
        let mut accounts = self.engine.store().list_accounts().await?;
        accounts.sort_by_key(|a| a.id);
        Ok(accounts)
    }
}
