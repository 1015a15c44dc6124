#![allow(dead_code)]

use async_trait::async_trait;
use ledger_engine::domain::account::{Account, AccountId, CreateAccountParams};
use ledger_engine::domain::ports::{LedgerStore, LedgerTx, StoreResult};
use ledger_engine::domain::transfer::{
    CreateEntryParams, CreateTransferParams, Entry, Transfer,
};
use ledger_engine::error::StoreError;
use ledger_engine::infrastructure::in_memory::InMemoryLedgerStore;
use rand::Rng;
use std::fs::File;
use std::io::Error;
use std::path::Path;

pub fn random_owner() -> String {
    let mut rng = rand::thread_rng();
    (0..10)
        .map(|_| rng.gen_range(b'a'..=b'z') as char)
        .collect()
}

pub fn random_money() -> i64 {
    rand::thread_rng().gen_range(500..1000)
}

pub async fn create_account(store: &dyn LedgerStore, balance: i64) -> Account {
    store
        .create_account(CreateAccountParams {
            owner: random_owner(),
            currency: "USD".to_string(),
            balance,
        })
        .await
        .unwrap()
}

/// Sum of an account's entries; must equal its balance.
pub async fn entries_total(store: &dyn LedgerStore, id: AccountId) -> i64 {
    store
        .list_entries(id)
        .await
        .unwrap()
        .iter()
        .map(|e| e.amount)
        .sum()
}

/// Where [`FaultyStore`] breaks a transaction scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// The second `create_entry` fails with a constraint violation.
    SecondEntry,
    /// The second balance update reports a lost connection.
    SecondBalanceUpdate,
    /// Commit reports a lost connection and nothing is applied.
    Commit,
    /// The second entry fails and the rollback that follows fails too.
    SecondEntryAndRollback,
}

/// An in-memory store that injects store-level failures into its scopes.
#[derive(Clone)]
pub struct FaultyStore {
    inner: InMemoryLedgerStore,
    fault: Fault,
}

impl FaultyStore {
    pub fn new(fault: Fault) -> Self {
        Self {
            inner: InMemoryLedgerStore::new(),
            fault,
        }
    }
}

#[async_trait]
impl LedgerStore for FaultyStore {
    async fn begin<'a>(&'a self) -> StoreResult<Box<dyn LedgerTx + 'a>> {
        let inner = self.inner.begin().await?;
        Ok(Box::new(FaultyTx {
            inner,
            fault: self.fault,
            entries: 0,
            balance_updates: 0,
        }))
    }

    async fn create_account(&self, params: CreateAccountParams) -> StoreResult<Account> {
        self.inner.create_account(params).await
    }

    async fn get_account(&self, id: AccountId) -> StoreResult<Option<Account>> {
        self.inner.get_account(id).await
    }

    async fn list_accounts(&self) -> StoreResult<Vec<Account>> {
        self.inner.list_accounts().await
    }

    async fn get_entry(&self, id: i64) -> StoreResult<Option<Entry>> {
        self.inner.get_entry(id).await
    }

    async fn list_entries(&self, account_id: AccountId) -> StoreResult<Vec<Entry>> {
        self.inner.list_entries(account_id).await
    }

    async fn get_transfer(&self, id: i64) -> StoreResult<Option<Transfer>> {
        self.inner.get_transfer(id).await
    }

    async fn list_transfers(&self, account_id: AccountId) -> StoreResult<Vec<Transfer>> {
        self.inner.list_transfers(account_id).await
    }
}

struct FaultyTx<'a> {
    inner: Box<dyn LedgerTx + 'a>,
    fault: Fault,
    entries: usize,
    balance_updates: usize,
}

#[async_trait]
impl<'a> LedgerTx for FaultyTx<'a> {
    async fn get_account_for_update(&mut self, id: AccountId) -> StoreResult<Option<Account>> {
        self.inner.get_account_for_update(id).await
    }

    async fn create_transfer(&mut self, params: CreateTransferParams) -> StoreResult<Transfer> {
        self.inner.create_transfer(params).await
    }

    async fn create_entry(&mut self, params: CreateEntryParams) -> StoreResult<Entry> {
        self.entries += 1;
        if self.entries == 2
            && matches!(
                self.fault,
                Fault::SecondEntry | Fault::SecondEntryAndRollback
            )
        {
            return Err(StoreError::ConstraintViolation(
                "injected entry failure".to_string(),
            ));
        }
        self.inner.create_entry(params).await
    }

    async fn add_account_balance(&mut self, id: AccountId, delta: i64) -> StoreResult<Account> {
        self.balance_updates += 1;
        if self.balance_updates == 2 && self.fault == Fault::SecondBalanceUpdate {
            return Err(StoreError::ConnectionLost(
                "injected connection loss".to_string(),
            ));
        }
        self.inner.add_account_balance(id, delta).await
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        if self.fault == Fault::Commit {
            return Err(StoreError::ConnectionLost(
                "injected commit failure".to_string(),
            ));
        }
        self.inner.commit().await
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        let fault = self.fault;
        self.inner.rollback().await?;
        if fault == Fault::SecondEntryAndRollback {
            return Err(StoreError::Internal("injected rollback failure".to_string()));
        }
        Ok(())
    }
}

pub fn generate_transfers_csv(path: &Path, accounts: usize, transfers: usize) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);

    wtr.write_record(["type", "from", "to", "amount", "owner", "currency"])?;
    for i in 1..=accounts {
        wtr.write_record(["open", "", "", "1000000", &format!("owner{}", i), "USD"])?;
    }

    let mut rng = rand::thread_rng();
    for _ in 0..transfers {
        let from = rng.gen_range(1..=accounts);
        let mut to = rng.gen_range(1..=accounts);
        if to == from {
            to = from % accounts + 1;
        }
        wtr.write_record([
            "transfer",
            &from.to_string(),
            &to.to_string(),
            &rng.gen_range(1..100).to_string(),
            "",
            "",
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
