//! Transaction log entries and ledger deltas

use crate::money::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Opaque user identity owned by the auth collaborator
pub type UserId = Uuid;

/// Transaction ID wrapper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(pub Uuid);

impl TransactionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What moved the money
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
    ContestEntry,
    Winnings,
    Fee,
    /// Compensating credit reversing an earlier debit
    Refund,
}

impl TransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionKind::Deposit => "deposit",
            TransactionKind::Withdrawal => "withdrawal",
            TransactionKind::ContestEntry => "contest_entry",
            TransactionKind::Winnings => "winnings",
            TransactionKind::Fee => "fee",
            TransactionKind::Refund => "refund",
        }
    }
}

impl FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deposit" => Ok(TransactionKind::Deposit),
            "withdrawal" => Ok(TransactionKind::Withdrawal),
            "contest_entry" => Ok(TransactionKind::ContestEntry),
            "winnings" => Ok(TransactionKind::Winnings),
            "fee" => Ok(TransactionKind::Fee),
            "refund" => Ok(TransactionKind::Refund),
            other => Err(format!("unknown transaction kind '{other}'")),
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transaction status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
        }
    }

    /// Only pending transactions may move, and only to a terminal status
    pub fn can_transition_to(self, next: TransactionStatus) -> bool {
        matches!(
            (self, next),
            (TransactionStatus::Pending, TransactionStatus::Completed)
                | (TransactionStatus::Pending, TransactionStatus::Failed)
        )
    }
}

impl FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TransactionStatus::Pending),
            "completed" => Ok(TransactionStatus::Completed),
            "failed" => Ok(TransactionStatus::Failed),
            other => Err(format!("unknown transaction status '{other}'")),
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A requested balance change, not yet committed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    pub amount: Money,
    pub kind: TransactionKind,
    pub status: TransactionStatus,
    pub metadata: serde_json::Value,
}

impl Delta {
    /// A completed credit of `amount`
    pub fn credit(amount: Money, kind: TransactionKind) -> Self {
        Self {
            amount: amount.abs(),
            kind,
            status: TransactionStatus::Completed,
            metadata: serde_json::Value::Object(Default::default()),
        }
    }

    /// A completed debit of `amount`
    pub fn debit(amount: Money, kind: TransactionKind) -> Self {
        Self { amount: -amount.abs(), ..Self::credit(amount, kind) }
    }

    pub fn pending(mut self) -> Self {
        self.status = TransactionStatus::Pending;
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Immutable log entry justifying a balance change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub user_id: UserId,
    pub amount: Money,
    pub kind: TransactionKind,
    pub status: TransactionStatus,
    pub metadata: serde_json::Value,
    /// Wallet balance right after this line was applied
    pub balance_after: Money,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Materialize a delta for a user
    pub fn from_delta(user_id: UserId, delta: Delta, balance_after: Money) -> Self {
        Self {
            id: TransactionId::new(),
            user_id,
            amount: delta.amount,
            kind: delta.kind,
            status: delta.status,
            metadata: delta.metadata,
            balance_after,
            created_at: Utc::now(),
        }
    }

    pub fn is_credit(&self) -> bool {
        self.amount.is_positive()
    }

    pub fn is_debit(&self) -> bool {
        self.amount.is_negative()
    }
}
