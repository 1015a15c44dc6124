use crate::domain::account::{Account, AccountId, CreateAccountParams};
use crate::domain::ports::{LedgerStore, LedgerTx, StoreResult};
use crate::domain::transfer::{CreateEntryParams, CreateTransferParams, Entry, Transfer};
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::Utc;
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, ErrorKind, IteratorMode, Options, Transaction,
    TransactionDB, TransactionDBOptions, TransactionOptions, WriteOptions,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::time::Instant;

/// Column Family for account rows.
pub const CF_ACCOUNTS: &str = "accounts";
/// Column Family for entry rows.
pub const CF_ENTRIES: &str = "entries";
/// Column Family for transfer rows.
pub const CF_TRANSFERS: &str = "transfers";

pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// A persistent ledger store on a RocksDB `TransactionDB`.
///
/// Row locks are RocksDB's pessimistic key locks taken with `get_for_update`;
/// lock waits are bounded by the lock timeout and deadlock detection is on.
/// Rows are stored as JSON under big-endian id keys, one Column Family per table.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<TransactionDB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<TransactionDB>,
    account_seq: Arc<AtomicI64>,
    entry_seq: Arc<AtomicI64>,
    transfer_seq: Arc<AtomicI64>,
    lock_timeout: Duration,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        Self::open_with_lock_timeout(path, DEFAULT_LOCK_TIMEOUT)
    }

    /// Opens the store, creating missing Column Families, and resumes the id
    /// sequences from the highest stored keys.
    pub fn open_with_lock_timeout<P: AsRef<Path>>(
        path: P,
        lock_timeout: Duration,
    ) -> StoreResult<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let mut txn_db_opts = TransactionDBOptions::default();
        txn_db_opts.set_txn_lock_timeout(millis(lock_timeout));

        let cfs = [CF_ACCOUNTS, CF_ENTRIES, CF_TRANSFERS]
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()));
        let db: TransactionDB = TransactionDB::open_cf_descriptors(&opts, &txn_db_opts, path, cfs)?;

        let account_seq = last_id(&db, CF_ACCOUNTS)?;
        let entry_seq = last_id(&db, CF_ENTRIES)?;
        let transfer_seq = last_id(&db, CF_TRANSFERS)?;

        Ok(Self {
            db: Arc::new(db),
            account_seq: Arc::new(AtomicI64::new(account_seq)),
            entry_seq: Arc::new(AtomicI64::new(entry_seq)),
            transfer_seq: Arc::new(AtomicI64::new(transfer_seq)),
            lock_timeout,
        })
    }

    fn cf(&self, name: &str) -> StoreResult<&ColumnFamily> {
        cf_handle(&self.db, name)
    }

    fn scan<T: DeserializeOwned>(&self, cf_name: &str) -> StoreResult<Vec<T>> {
        let cf = self.cf(cf_name)?;
        let mut rows = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            rows.push(decode(&value)?);
        }
        Ok(rows)
    }

    fn read<T: DeserializeOwned>(&self, cf_name: &str, key: [u8; 8]) -> StoreResult<Option<T>> {
        let cf = self.cf(cf_name)?;
        self.db
            .get_cf(cf, key)?
            .map(|bytes| decode(&bytes))
            .transpose()
    }
}

fn cf_handle<'a>(db: &'a TransactionDB, name: &str) -> StoreResult<&'a ColumnFamily> {
    db.cf_handle(name)
        .ok_or_else(|| StoreError::Internal(format!("{} column family not found", name)))
}

fn last_id(db: &TransactionDB, cf_name: &str) -> StoreResult<i64> {
    let cf = cf_handle(db, cf_name)?;
    match db.iterator_cf(cf, IteratorMode::End).next() {
        Some(item) => {
            let (key, _value) = item?;
            let bytes: [u8; 8] = key[..].try_into().map_err(|_| {
                StoreError::Internal(format!("malformed key in {} column family", cf_name))
            })?;
            Ok(i64::from_be_bytes(bytes))
        }
        None => Ok(0),
    }
}

fn millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

fn next_id(seq: &AtomicI64) -> i64 {
    seq.fetch_add(1, Ordering::Relaxed) + 1
}

fn encode<T: Serialize>(value: &T) -> StoreResult<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StoreResult<T> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Runs a call that may block on a RocksDB lock wait or write.
///
/// On a multi-threaded runtime the worker hands its other tasks off first.
fn blocking<T>(f: impl FnOnce() -> T) -> T {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(f)
        }
        _ => f(),
    }
}

#[async_trait]
impl LedgerStore for RocksDBStore {
    async fn begin<'a>(&'a self) -> StoreResult<Box<dyn LedgerTx + 'a>> {
        self.begin_with_deadline(None).await
    }

    /// Lock waits inside the scope are capped by the time left until `deadline`.
    async fn begin_with_deadline<'a>(
        &'a self,
        deadline: Option<Instant>,
    ) -> StoreResult<Box<dyn LedgerTx + 'a>> {
        let remaining = deadline.map(|d| d.saturating_duration_since(Instant::now()));
        if remaining.is_some_and(|r| r.is_zero()) {
            return Err(StoreError::DeadlineExceeded);
        }
        // When the deadline is nearer than the lock timeout, a timed out lock
        // wait means the deadline passed.
        let deadline_bound = remaining.is_some_and(|r| r < self.lock_timeout);
        let lock_timeout = remaining.map_or(self.lock_timeout, |r| r.min(self.lock_timeout));

        let mut txn_opts = TransactionOptions::default();
        txn_opts.set_deadlock_detect(true);
        txn_opts.set_lock_timeout(millis(lock_timeout).max(1));
        let txn = self.db.transaction_opt(&WriteOptions::default(), &txn_opts);
        Ok(Box::new(RocksDBTx {
            store: self,
            txn,
            deadline_bound,
        }))
    }

    async fn create_account(&self, params: CreateAccountParams) -> StoreResult<Account> {
        if params.balance < 0 {
            return Err(StoreError::ConstraintViolation(
                "account balance cannot be negative".to_string(),
            ));
        }

        let now = Utc::now();
        let account = Account {
            id: AccountId(next_id(&self.account_seq)),
            owner: params.owner,
            currency: params.currency,
            balance: params.balance,
            created_at: now,
        };

        let txn = self.db.transaction();
        txn.put_cf(self.cf(CF_ACCOUNTS)?, account.id.to_key(), encode(&account)?)?;
        if account.balance != 0 {
            let entry = Entry {
                id: next_id(&self.entry_seq),
                account_id: account.id,
                amount: account.balance,
                created_at: now,
            };
            txn.put_cf(self.cf(CF_ENTRIES)?, entry.id.to_be_bytes(), encode(&entry)?)?;
        }
        txn.commit()?;
        Ok(account)
    }

    async fn get_account(&self, id: AccountId) -> StoreResult<Option<Account>> {
        self.read(CF_ACCOUNTS, id.to_key())
    }

    async fn list_accounts(&self) -> StoreResult<Vec<Account>> {
        self.scan(CF_ACCOUNTS)
    }

    async fn get_entry(&self, id: i64) -> StoreResult<Option<Entry>> {
        self.read(CF_ENTRIES, id.to_be_bytes())
    }

    async fn list_entries(&self, account_id: AccountId) -> StoreResult<Vec<Entry>> {
        let entries: Vec<Entry> = self.scan(CF_ENTRIES)?;
        Ok(entries
            .into_iter()
            .filter(|e| e.account_id == account_id)
            .collect())
    }

    async fn get_transfer(&self, id: i64) -> StoreResult<Option<Transfer>> {
        self.read(CF_TRANSFERS, id.to_be_bytes())
    }

    async fn list_transfers(&self, account_id: AccountId) -> StoreResult<Vec<Transfer>> {
        let transfers: Vec<Transfer> = self.scan(CF_TRANSFERS)?;
        Ok(transfers
            .into_iter()
            .filter(|t| t.from_account_id == account_id || t.to_account_id == account_id)
            .collect())
    }
}

/// Transaction scope over [`RocksDBStore`]. Dropping it rolls back.
pub struct RocksDBTx<'a> {
    store: &'a RocksDBStore,
    txn: Transaction<'a, TransactionDB>,
    deadline_bound: bool,
}

impl RocksDBTx<'_> {
    fn account(&self, id: AccountId) -> StoreResult<Option<Account>> {
        let cf = self.store.cf(CF_ACCOUNTS)?;
        self.txn
            .get_cf(cf, id.to_key())?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    fn account_for_update(&self, id: AccountId) -> StoreResult<Option<Account>> {
        let cf = self.store.cf(CF_ACCOUNTS)?;
        blocking(|| self.txn.get_for_update_cf(cf, id.to_key(), true))
            .map_err(|e| self.lock_error(id, e))?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    fn lock_error(&self, id: AccountId, err: rocksdb::Error) -> StoreError {
        match err.kind() {
            ErrorKind::TimedOut if self.deadline_bound => StoreError::DeadlineExceeded,
            ErrorKind::TimedOut => StoreError::LockTimeout(id),
            ErrorKind::Busy | ErrorKind::TryAgain => StoreError::Conflict(err.into_string()),
            _ => StoreError::RocksDb(err),
        }
    }
}

#[async_trait]
impl<'a> LedgerTx for RocksDBTx<'a> {
    async fn get_account_for_update(&mut self, id: AccountId) -> StoreResult<Option<Account>> {
        self.account_for_update(id)
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
            if self.account(id)?.is_none() {
                return Err(StoreError::ConstraintViolation(format!(
                    "transfer references unknown account {}",
                    id
                )));
            }
        }

        let transfer = Transfer {
            id: next_id(&self.store.transfer_seq),
            from_account_id: params.from_account_id,
            to_account_id: params.to_account_id,
            amount: params.amount,
            created_at: Utc::now(),
        };
        let cf = self.store.cf(CF_TRANSFERS)?;
        self.txn
            .put_cf(cf, transfer.id.to_be_bytes(), encode(&transfer)?)?;
        Ok(transfer)
    }

    async fn create_entry(&mut self, params: CreateEntryParams) -> StoreResult<Entry> {
        if self.account(params.account_id)?.is_none() {
            return Err(StoreError::ConstraintViolation(format!(
                "entry references unknown account {}",
                params.account_id
            )));
        }

        let entry = Entry {
            id: next_id(&self.store.entry_seq),
            account_id: params.account_id,
            amount: params.amount,
            created_at: Utc::now(),
        };
        let cf = self.store.cf(CF_ENTRIES)?;
        self.txn.put_cf(cf, entry.id.to_be_bytes(), encode(&entry)?)?;
        Ok(entry)
    }

    async fn add_account_balance(&mut self, id: AccountId, delta: i64) -> StoreResult<Account> {
        let mut account = self.account_for_update(id)?.ok_or_else(|| {
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
        let cf = self.store.cf(CF_ACCOUNTS)?;
        self.txn.put_cf(cf, id.to_key(), encode(&account)?)?;
        Ok(account)
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let txn = self.txn;
        blocking(|| txn.commit()).map_err(|e| match e.kind() {
            ErrorKind::Busy | ErrorKind::TryAgain => StoreError::Conflict(e.into_string()),
            _ => StoreError::RocksDb(e),
        })
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        self.txn.rollback()?;
        Ok(())
    }
}
