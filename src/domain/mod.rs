//! Domain layer: ledger rows, the lock ordering policy and the store ports.

pub mod account;
pub mod lock_order;
pub mod ports;
pub mod transfer;
