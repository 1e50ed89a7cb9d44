//! Error types for the contest engine
//!
//! Every failure a caller can see is a [`ContestError`]. Each variant maps to
//! one [`ErrorKind`] and a stable machine-readable code, which the gateway
//! turns into an HTTP status.

use crate::model::{ContestId, ContestStatus, TeamId};
use crate::payment::{GatewayError, PaymentMethod};
use crate::repository::RepositoryError;
use crate::rules::RosterError;
use serde::Serialize;
use thiserror::Error;
use wallet_ledger::{LedgerError, Money, TransactionId, TransactionStatus, UserId};

/// Error category, independent of the individual failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InputValidation,
    StateConflict,
    Funds,
    NotFound,
    ExternalDependency,
    Compensation,
    Internal,
}

#[derive(Error, Debug)]
pub enum ContestError {
    #[error(transparent)]
    Roster(#[from] RosterError),

    #[error("Missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("Invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("Amount {amount} is below the minimum of {min}")]
    AmountTooSmall { amount: Money, min: Money },

    #[error("Amount {amount} exceeds the maximum of {max}")]
    AmountTooLarge { amount: Money, max: Money },

    #[error("Unsupported payment method: {method}")]
    UnsupportedMethod { method: String },

    #[error("Missing payout details for {method}: {}", .missing.join(", "))]
    MissingPayoutDetails { method: PaymentMethod, missing: Vec<&'static str> },

    #[error("Transaction {transaction_id} is not a withdrawal")]
    NotAWithdrawal { transaction_id: TransactionId },

    #[error("Identity verification required to {action}")]
    VerificationRequired { action: String },

    #[error("Contest not found: {contest_id}")]
    ContestNotFound { contest_id: ContestId },

    #[error("Contest {contest_id} is {status} and no longer accepts entries")]
    ContestClosed { contest_id: ContestId, status: ContestStatus },

    #[error("Contest {contest_id} is full ({capacity} participants)")]
    ContestFull { contest_id: ContestId, capacity: u32 },

    #[error("Contest {contest_id} is {status}; only completed contests can be settled")]
    ContestNotCompleted { contest_id: ContestId, status: ContestStatus },

    #[error("Contest {contest_id} cannot move from {from} to {to}")]
    InvalidContestTransition { contest_id: ContestId, from: ContestStatus, to: ContestStatus },

    #[error("Already entered contest {contest_id}")]
    DuplicateEntry { contest_id: ContestId },

    #[error("A team already exists for contest {contest_id}")]
    DuplicateTeam { contest_id: ContestId },

    #[error("Fantasy team not found: {team_id}")]
    TeamNotFound { team_id: TeamId },

    #[error("Transaction not found: {transaction_id}")]
    TransactionNotFound { transaction_id: TransactionId },

    #[error("Payout {transaction_id} is already {status}")]
    PayoutAlreadyResolved { transaction_id: TransactionId, status: TransactionStatus },

    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: Money, available: Money },

    #[error("Identity profile not found")]
    ProfileNotFound { user_id: UserId },

    #[error("Identity service unavailable: {message}")]
    IdentityUnavailable { message: String },

    #[error("Payment declined: {reason}")]
    PaymentDeclined { reason: String },

    #[error("Payment provider unavailable: {message}")]
    GatewayUnavailable { message: String },

    #[error("Team could not be saved; nothing was kept")]
    TeamCreationFailed { reason: String },

    #[error("Compensation failed during {operation} for user {user_id} ({amount}): {reason}")]
    CompensationFailed { operation: &'static str, user_id: UserId, amount: Money, reason: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

impl ContestError {
    pub fn kind(&self) -> ErrorKind {
        use ContestError::*;

        match self {
            Roster(_)
            | MissingField { .. }
            | InvalidField { .. }
            | AmountTooSmall { .. }
            | AmountTooLarge { .. }
            | UnsupportedMethod { .. }
            | MissingPayoutDetails { .. }
            | NotAWithdrawal { .. }
            | VerificationRequired { .. } => ErrorKind::InputValidation,
            ContestClosed { .. }
            | ContestFull { .. }
            | ContestNotCompleted { .. }
            | InvalidContestTransition { .. }
            | DuplicateEntry { .. }
            | DuplicateTeam { .. }
            | PayoutAlreadyResolved { .. } => ErrorKind::StateConflict,
            InsufficientFunds { .. } => ErrorKind::Funds,
            ContestNotFound { .. } | TeamNotFound { .. } | TransactionNotFound { .. } => {
                ErrorKind::NotFound
            }
            ProfileNotFound { .. }
            | IdentityUnavailable { .. }
            | PaymentDeclined { .. }
            | GatewayUnavailable { .. } => {
                ErrorKind::ExternalDependency
            }
            CompensationFailed { .. } => ErrorKind::Compensation,
            TeamCreationFailed { .. } | Storage(_) | InvalidConfig { .. } => ErrorKind::Internal,
        }
    }

    /// Stable code for clients
    pub fn code(&self) -> &'static str {
        use ContestError::*;

        match self {
            Roster(e) => e.code(),
            MissingField { .. } => "MISSING_FIELD",
            InvalidField { .. } => "INVALID_FIELD",
            AmountTooSmall { .. } | AmountTooLarge { .. } => "INVALID_AMOUNT",
            UnsupportedMethod { .. } => "UNSUPPORTED_PAYMENT_METHOD",
            MissingPayoutDetails { .. } => "MISSING_PAYOUT_DETAILS",
            NotAWithdrawal { .. } => "NOT_A_WITHDRAWAL",
            VerificationRequired { .. } => "VERIFICATION_REQUIRED",
            ContestNotFound { .. } => "CONTEST_NOT_FOUND",
            ContestClosed { .. } => "CONTEST_CLOSED",
            ContestFull { .. } => "CONTEST_FULL",
            ContestNotCompleted { .. } => "CONTEST_NOT_COMPLETED",
            InvalidContestTransition { .. } => "INVALID_CONTEST_TRANSITION",
            DuplicateEntry { .. } => "DUPLICATE_ENTRY",
            DuplicateTeam { .. } => "DUPLICATE_TEAM",
            TeamNotFound { .. } => "TEAM_NOT_FOUND",
            TransactionNotFound { .. } => "TRANSACTION_NOT_FOUND",
            PayoutAlreadyResolved { .. } => "PAYOUT_ALREADY_RESOLVED",
            InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            ProfileNotFound { .. } => "PROFILE_NOT_FOUND",
            IdentityUnavailable { .. } => "IDENTITY_UNAVAILABLE",
            PaymentDeclined { .. } => "PAYMENT_DECLINED",
            GatewayUnavailable { .. } => "PAYMENT_GATEWAY_UNAVAILABLE",
            TeamCreationFailed { .. } => "TEAM_CREATION_FAILED",
            CompensationFailed { .. } => "COMPENSATION_FAILED",
            Storage(_) => "STORAGE_ERROR",
            InvalidConfig { .. } => "INVALID_CONFIG",
        }
    }

    /// Structured context for error responses, when there is any
    pub fn details(&self) -> Option<serde_json::Value> {
        use ContestError::*;

        match self {
            Roster(e) => e.details(),
            InsufficientFunds { required, available } => Some(serde_json::json!({
                "required": required,
                "available": available,
            })),
            AmountTooSmall { min, .. } => Some(serde_json::json!({ "min": min })),
            AmountTooLarge { max, .. } => Some(serde_json::json!({ "max": max })),
            MissingPayoutDetails { missing, .. } => Some(serde_json::json!({ "missing": missing })),
            ContestFull { capacity, .. } => Some(serde_json::json!({ "capacity": capacity })),
            _ => None,
        }
    }

    /// Compensation failures leave money unaccounted for and need an operator
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Compensation
    }
}

impl From<LedgerError> for ContestError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientFunds { required, available } => {
                ContestError::InsufficientFunds { required, available }
            }
            LedgerError::TransactionNotFound { transaction_id } => {
                ContestError::TransactionNotFound { transaction_id }
            }
            LedgerError::InvalidStatusTransition { transaction_id, from, .. } => {
                ContestError::PayoutAlreadyResolved { transaction_id, status: from }
            }
            other => ContestError::Storage(other.to_string()),
        }
    }
}

impl From<RepositoryError> for ContestError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::ContestNotFound { contest_id } => {
                ContestError::ContestNotFound { contest_id }
            }
            RepositoryError::TeamNotFound { team_id } => ContestError::TeamNotFound { team_id },
            RepositoryError::DuplicateTeam { contest_id, .. } => {
                ContestError::DuplicateTeam { contest_id }
            }
            RepositoryError::DuplicateEntry { contest_id, .. } => {
                ContestError::DuplicateEntry { contest_id }
            }
            RepositoryError::ContestFull { contest_id, capacity } => {
                ContestError::ContestFull { contest_id, capacity }
            }
            RepositoryError::ContestNotOpen { contest_id, status } => {
                ContestError::ContestClosed { contest_id, status }
            }
            RepositoryError::InvalidStatusTransition { contest_id, from, to } => {
                ContestError::InvalidContestTransition { contest_id, from, to }
            }
            other => ContestError::Storage(other.to_string()),
        }
    }
}

impl From<GatewayError> for ContestError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Declined { reason } => ContestError::PaymentDeclined { reason },
            GatewayError::Unavailable { message } => ContestError::GatewayUnavailable { message },
        }
    }
}
