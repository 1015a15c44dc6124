use crate::domain::account::AccountId;
use thiserror::Error;

/// Failures reported by a ledger store while a transaction scope is open.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Lock wait timed out on account {0}")]
    LockTimeout(AccountId),
    #[error("Write conflict: {0}")]
    Conflict(String),
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
    #[error("Connection lost: {0}")]
    ConnectionLost(String),
    #[error("Transaction cancelled by caller")]
    Cancelled,
    #[error("Transaction deadline exceeded")]
    DeadlineExceeded,
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),
    #[error("Internal storage error: {0}")]
    Internal(String),
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Account {0} not found")]
    NotFound(AccountId),
    #[error("Insufficient funds in account {account_id}: balance {balance}, requested {amount}")]
    InsufficientFunds {
        account_id: AccountId,
        balance: i64,
        amount: i64,
    },
    #[error("Transaction error: {0}")]
    TransactionError(#[from] StoreError),
    #[error("{source}; rollback also failed: {rollback}")]
    RollbackFailed {
        source: Box<LedgerError>,
        rollback: StoreError,
    },
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Config error: {0}")]
    ConfigError(#[from] serde_yaml::Error),
}

impl LedgerError {
    /// Whether re-invoking the same operation may succeed without any change
    /// on the caller's side (lock-wait timeouts and write conflicts).
    pub fn is_transient(&self) -> bool {
        match self {
            LedgerError::TransactionError(e) => {
                matches!(e, StoreError::LockTimeout(_) | StoreError::Conflict(_))
            }
            LedgerError::RollbackFailed { source, .. } => source.is_transient(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
