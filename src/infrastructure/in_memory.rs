use crate::domain::account::{Account, AccountId, CreateAccountParams};
use crate::domain::ports::{LedgerStore, LedgerTx, StoreResult};
use crate::domain::transfer::{CreateEntryParams, CreateTransferParams, Entry, Transfer};
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::trace;

pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Default)]
struct LedgerState {
    accounts: BTreeMap<AccountId, Account>,
    entries: BTreeMap<i64, Entry>,
    transfers: BTreeMap<i64, Transfer>,
}

struct Shared {
    /// Committed rows only.
    state: RwLock<LedgerState>,
    row_locks: Mutex<HashMap<AccountId, Arc<Mutex<()>>>>,
    account_seq: AtomicI64,
    entry_seq: AtomicI64,
    transfer_seq: AtomicI64,
    lock_timeout: Duration,
}

impl Shared {
    async fn row_lock(&self, id: AccountId) -> Arc<Mutex<()>> {
        let mut locks = self.row_locks.lock().await;
        locks.entry(id).or_default().clone()
    }

    async fn committed_account(&self, id: AccountId) -> Option<Account> {
        self.state.read().await.accounts.get(&id).cloned()
    }
}

fn next_id(seq: &AtomicI64) -> i64 {
    seq.fetch_add(1, Ordering::Relaxed) + 1
}

/// A thread-safe in-memory ledger store with per-account exclusive row locks.
///
/// Writes made inside a transaction are staged and become visible only on
/// commit, while the scope still holds its row locks. Lock waits are bounded by
/// a lock timeout; identifiers consumed by a rolled back scope are not reused.
#[derive(Clone)]
pub struct InMemoryLedgerStore {
    shared: Arc<Shared>,
}

impl InMemoryLedgerStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: RwLock::new(LedgerState::default()),
                row_locks: Mutex::new(HashMap::new()),
                account_seq: AtomicI64::new(0),
                entry_seq: AtomicI64::new(0),
                transfer_seq: AtomicI64::new(0),
                lock_timeout,
            }),
        }
    }
}

impl Default for InMemoryLedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn begin<'a>(&'a self) -> StoreResult<Box<dyn LedgerTx + 'a>> {
        Ok(Box::new(InMemoryTx {
            shared: Arc::clone(&self.shared),
            locks: HashMap::new(),
            accounts: BTreeMap::new(),
            entries: Vec::new(),
            transfers: Vec::new(),
        }))
    }

    async fn create_account(&self, params: CreateAccountParams) -> StoreResult<Account> {
        if params.balance < 0 {
            return Err(StoreError::ConstraintViolation(
                "account balance cannot be negative".to_string(),
            ));
        }

        let mut state = self.shared.state.write().await;
        let now = Utc::now();
        let account = Account {
            id: AccountId(next_id(&self.shared.account_seq)),
            owner: params.owner,
            currency: params.currency,
            balance: params.balance,
            created_at: now,
        };
        if account.balance != 0 {
            let entry = Entry {
                id: next_id(&self.shared.entry_seq),
                account_id: account.id,
                amount: account.balance,
                created_at: now,
            };
            state.entries.insert(entry.id, entry);
        }
        state.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn get_account(&self, id: AccountId) -> StoreResult<Option<Account>> {
        Ok(self.shared.committed_account(id).await)
    }

    async fn list_accounts(&self) -> StoreResult<Vec<Account>> {
        let state = self.shared.state.read().await;
        Ok(state.accounts.values().cloned().collect())
    }

    async fn get_entry(&self, id: i64) -> StoreResult<Option<Entry>> {
        let state = self.shared.state.read().await;
        Ok(state.entries.get(&id).cloned())
    }

    async fn list_entries(&self, account_id: AccountId) -> StoreResult<Vec<Entry>> {
        let state = self.shared.state.read().await;
        Ok(state
            .entries
            .values()
            .filter(|e| e.account_id == account_id)
            .cloned()
            .collect())
    }

    async fn get_transfer(&self, id: i64) -> StoreResult<Option<Transfer>> {
        let state = self.shared.state.read().await;
        Ok(state.transfers.get(&id).cloned())
    }

    async fn list_transfers(&self, account_id: AccountId) -> StoreResult<Vec<Transfer>> {
        let state = self.shared.state.read().await;
        Ok(state
            .transfers
            .values()
            .filter(|t| t.from_account_id == account_id || t.to_account_id == account_id)
            .cloned()
            .collect())
    }
}

/// Transaction scope over [`InMemoryLedgerStore`].
///
/// Dropping it releases every row lock and discards staged writes.
pub struct InMemoryTx {
    shared: Arc<Shared>,
    locks: HashMap<AccountId, OwnedMutexGuard<()>>,
    accounts: BTreeMap<AccountId, Account>,
    entries: Vec<Entry>,
    transfers: Vec<Transfer>,
}

impl InMemoryTx {
    async fn lock(&mut self, id: AccountId) -> StoreResult<()> {
        if self.locks.contains_key(&id) {
            return Ok(());
        }
        let row = self.shared.row_lock(id).await;
        let guard = tokio::time::timeout(self.shared.lock_timeout, row.lock_owned())
            .await
            .map_err(|_| StoreError::LockTimeout(id))?;
        trace!(account = %id, "row lock acquired");
        self.locks.insert(id, guard);
        Ok(())
    }

    /// The row as this scope sees it: staged write first, committed state otherwise.
    async fn current(&self, id: AccountId) -> Option<Account> {
        match self.accounts.get(&id) {
            Some(account) => Some(account.clone()),
            None => self.shared.committed_account(id).await,
        }
    }
}

#[async_trait]
impl LedgerTx for InMemoryTx {
    async fn get_account_for_update(&mut self, id: AccountId) -> StoreResult<Option<Account>> {
        if self.current(id).await.is_none() {
            return Ok(None);
        }
        self.lock(id).await?;
        // Re-read: the previous lock holder may have committed meanwhile.
        Ok(self.current(id).await)
    }

    async fn create_transfer(&mut self, params: CreateTransferParams) -> StoreResult<Transfer> {
        if params.from_account_id == params.to_account_id {
            return Err(StoreError::ConstraintViolation(
                "transfer accounts must differ".to_string(),
            ));
        }
        if params.amount <= 0 {
            return Err(StoreError::ConstraintViolation(
                "transfer amount must be positive".to_string(),
            ));
        }
        for id in [params.from_account_id, params.to_account_id] {
            if self.current(id).await.is_none() {
                return Err(StoreError::ConstraintViolation(format!(
                    "transfer references unknown account {}",
                    id
                )));
            }
        }

        let transfer = Transfer {
            id: next_id(&self.shared.transfer_seq),
            from_account_id: params.from_account_id,
            to_account_id: params.to_account_id,
            amount: params.amount,
            created_at: Utc::now(),
        };
        self.transfers.push(transfer.clone());
        Ok(transfer)
    }

    async fn create_entry(&mut self, params: CreateEntryParams) -> StoreResult<Entry> {
        if self.current(params.account_id).await.is_none() {
            return Err(StoreError::ConstraintViolation(format!(
                "entry references unknown account {}",
                params.account_id
            )));
        }

        let entry = Entry {
            id: next_id(&self.shared.entry_seq),
            account_id: params.account_id,
            amount: params.amount,
            created_at: Utc::now(),
        };
        self.entries.push(entry.clone());
        Ok(entry)
    }

    async fn add_account_balance(&mut self, id: AccountId, delta: i64) -> StoreResult<Account> {
        // Like an UPDATE, this takes the row lock if the scope does not hold it yet.
        self.lock(id).await?;
        let mut account = self.current(id).await.ok_or_else(|| {
            StoreError::ConstraintViolation(format!("account {} does not exist", id))
        })?;

        let balance = account.balance_after(delta).ok_or_else(|| {
            StoreError::ConstraintViolation(format!("balance of account {} overflows", id))
        })?;
        if balance < 0 {
            return Err(StoreError::ConstraintViolation(format!(
                "balance of account {} cannot go negative",
                id
            )));
        }

        account.balance = balance;
        self.accounts.insert(id, account.clone());
        Ok(account)
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let InMemoryTx {
            shared,
            locks,
            accounts,
            entries,
            transfers,
        } = *self;

        {
            let mut state = shared.state.write().await;
            state.accounts.extend(accounts);
            state.entries.extend(entries.into_iter().map(|e| (e.id, e)));
            state
                .transfers
                .extend(transfers.into_iter().map(|t| (t.id, t)));
        }

        // Locks are released only once the writes are visible.
        drop(locks);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        trace!(
            locks = self.locks.len(),
            staged_entries = self.entries.len(),
            "discarding staged writes"
        );
        Ok(())
    }
}
