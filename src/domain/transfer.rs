use super::account::{Account, AccountId, Amount};
use crate::error::LedgerError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A committed movement of money between two accounts. Immutable once created.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct Transfer {
    pub id: i64,
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    /// Always positive.
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

/// One side of a double-entry record. Negative amounts are debits.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct Entry {
    pub id: i64,
    pub account_id: AccountId,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateTransferParams {
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub amount: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateEntryParams {
    pub account_id: AccountId,
    pub amount: i64,
}

/// Input of a transfer as handed over by the calling layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferTxParams {
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub amount: i64,
}

impl TransferTxParams {
    pub fn new(from: impl Into<AccountId>, to: impl Into<AccountId>, amount: i64) -> Self {
        Self {
            from_account_id: from.into(),
            to_account_id: to.into(),
            amount,
        }
    }

    /// Checks that need no store access: distinct accounts and a positive amount.
    pub fn validate(&self) -> Result<Amount, LedgerError> {
        if self.from_account_id == self.to_account_id {
            return Err(LedgerError::ValidationError(format!(
                "Cannot transfer from account {} to itself",
                self.from_account_id
            )));
        }
        Amount::new(self.amount)
    }
}

/// Everything one successful transfer produced, returned as a unit.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct TransferTxResult {
    pub transfer: Transfer,
    pub from_account: Account,
    pub to_account: Account,
    pub from_entry: Entry,
    pub to_entry: Entry,
}

impl TransferTxResult {
    /// Double-entry check: the two entries cancel out exactly.
    pub fn is_balanced(&self) -> bool {
        self.from_entry.amount.checked_add(self.to_entry.amount) == Some(0)
    }
}

/// Progress of a single transfer invocation.
///
/// `Committed` and `RolledBack` are terminal; every other state may fall
/// through to `RolledBack`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    Started,
    LocksAcquired,
    FundsValidated,
    RecordsWritten,
    BalancesUpdated,
    Committed,
    RolledBack,
}

impl TransferState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferState::Committed | TransferState::RolledBack)
    }

    pub fn can_transition_to(&self, next: TransferState) -> bool {
        use TransferState::*;
        match (self, next) {
            (Started, LocksAcquired)
            | (LocksAcquired, FundsValidated)
            | (FundsValidated, RecordsWritten)
            | (RecordsWritten, BalancesUpdated)
            | (BalancesUpdated, Committed) => true,
            (current, RolledBack) => !current.is_terminal(),
            _ => false,
        }
    }
}
