//! Wallet ledger - wallet balances and the transaction log
//!
//! This crate owns every wallet balance in the contest platform. Balances only
//! change through [`Ledger`], which commits each change with a
//! compare-and-swap guarded by the balance it read, paired atomically with the
//! transaction lines that justify it.

pub mod backend;
pub mod config;
pub mod error;
pub mod ledger;
pub mod money;
pub mod postgres;
pub mod transaction;

pub use backend::{InMemoryWallets, WalletAccount, WalletBackend};
pub use config::LedgerConfig;
pub use error::LedgerError;
pub use ledger::Ledger;
pub use money::Money;
pub use postgres::PgWallets;
pub use transaction::{
    Delta, Transaction, TransactionId, TransactionKind, TransactionStatus, UserId,
};

// Result type alias
pub type Result<T> = std::result::Result<T, LedgerError>;
