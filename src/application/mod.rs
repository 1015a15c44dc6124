//! Application layer: the transfer protocol and the scope it runs in.
//!
//! `TransferEngine` drives a single transfer through `TxCoordinator`, which
//! owns the begin/commit/rollback scope against a `LedgerStore`. `Ledger` is
//! the thin calling layer used by the CLI.

pub mod balance;
pub mod context;
pub mod coordinator;
pub mod engine;
pub mod ledger;
