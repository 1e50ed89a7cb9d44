//! Error types for the wallet ledger

use crate::money::Money;
use crate::transaction::{TransactionId, TransactionStatus, UserId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: Money, available: Money },

    #[error("Wallet not found for user {user_id}")]
    AccountNotFound { user_id: UserId },

    #[error("Transaction not found: {transaction_id}")]
    TransactionNotFound { transaction_id: TransactionId },

    #[error("Transaction {transaction_id} cannot move from {from} to {to}")]
    InvalidStatusTransition {
        transaction_id: TransactionId,
        from: TransactionStatus,
        to: TransactionStatus,
    },

    #[error("Balance update for user {user_id} kept conflicting after {attempts} attempts")]
    Contention { user_id: UserId, attempts: u32 },

    #[error("Amount overflow applying ledger delta")]
    Overflow,

    #[error("Corrupt ledger row: {message}")]
    Corrupt { message: String },

    #[error("Ledger backend unavailable: {message}")]
    Unavailable { message: String },

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}
