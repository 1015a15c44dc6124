use super::account::{Account, AccountId, CreateAccountParams};
use super::transfer::{CreateEntryParams, CreateTransferParams, Entry, Transfer};
use crate::error::StoreError;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::time::Instant;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// A persistent (or in-process) store of accounts, entries and transfers.
///
/// Implementations must provide exclusive row locks on accounts inside a
/// transaction scope opened with [`LedgerStore::begin`].
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Opens a transaction scope. Dropping the returned handle without
    /// committing rolls the scope back.
    async fn begin<'a>(&'a self) -> StoreResult<Box<dyn LedgerTx + 'a>>;

    /// Opens a transaction scope whose lock waits give up once `deadline`
    /// passes, failing with [`StoreError::DeadlineExceeded`].
    ///
    /// Stores whose lock waits are plain awaits can rely on the caller racing
    /// the scope against the deadline and keep this default.
    async fn begin_with_deadline<'a>(
        &'a self,
        deadline: Option<Instant>,
    ) -> StoreResult<Box<dyn LedgerTx + 'a>> {
        let _ = deadline;
        self.begin().await
    }

    /// Provisions an account, recording a non-zero opening balance as an entry.
    async fn create_account(&self, params: CreateAccountParams) -> StoreResult<Account>;

    /// Unlocked read of committed state.
    async fn get_account(&self, id: AccountId) -> StoreResult<Option<Account>>;
    async fn list_accounts(&self) -> StoreResult<Vec<Account>>;

    async fn get_entry(&self, id: i64) -> StoreResult<Option<Entry>>;
    async fn list_entries(&self, account_id: AccountId) -> StoreResult<Vec<Entry>>;

    async fn get_transfer(&self, id: i64) -> StoreResult<Option<Transfer>>;
    /// Transfers where `account_id` is either the sender or the receiver.
    async fn list_transfers(&self, account_id: AccountId) -> StoreResult<Vec<Transfer>>;
}

/// A transaction-scoped data-access handle.
///
/// Writes are only visible to other scopes after [`LedgerTx::commit`].
#[async_trait]
pub trait LedgerTx: Send {
    /// Reads an account and takes its exclusive row lock for the rest of the scope.
    async fn get_account_for_update(&mut self, id: AccountId) -> StoreResult<Option<Account>>;

    async fn create_transfer(&mut self, params: CreateTransferParams) -> StoreResult<Transfer>;

    async fn create_entry(&mut self, params: CreateEntryParams) -> StoreResult<Entry>;

    /// Adds `delta` to the stored balance and returns the updated row.
    async fn add_account_balance(&mut self, id: AccountId, delta: i64) -> StoreResult<Account>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;

    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}

pub type LedgerStoreRef = Arc<dyn LedgerStore>;
