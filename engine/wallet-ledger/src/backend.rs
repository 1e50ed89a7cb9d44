//! Wallet storage backends
//!
//! A backend only knows how to read rows and perform a guarded
//! compare-and-swap. Balance rules live in [`crate::Ledger`], which is the
//! only caller allowed to write balances.

use crate::error::LedgerError;
use crate::money::Money;
use crate::transaction::{Transaction, TransactionId, TransactionKind, TransactionStatus, UserId};
use crate::Result;
use chrono::{DateTime, Utc};
use dashmap::{DashMap, DashSet};
use serde::{Deserialize, Serialize};

/// One wallet per user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletAccount {
    pub user_id: UserId,
    pub balance: Money,
    pub updated_at: DateTime<Utc>,
}

impl WalletAccount {
    pub fn empty(user_id: UserId) -> Self {
        Self { user_id, balance: Money::ZERO, updated_at: Utc::now() }
    }
}

/// Storage port for wallets and their transaction log
#[async_trait::async_trait]
pub trait WalletBackend: Send + Sync {
    /// Create a zero-balance wallet, returning the existing one if present
    async fn create_account(&self, user_id: UserId) -> Result<WalletAccount>;

    /// Load a wallet
    async fn load_account(&self, user_id: UserId) -> Result<Option<WalletAccount>>;

    /// Set the balance to `new_balance` and append `transactions`, but only if
    /// the stored balance still equals `expected`. Both writes land or neither
    /// does. Returns `false` when the guard did not match.
    async fn compare_and_swap(
        &self,
        user_id: UserId,
        expected: Money,
        new_balance: Money,
        transactions: &[Transaction],
    ) -> Result<bool>;

    /// All transactions of a user, oldest first
    async fn transactions_for(&self, user_id: UserId) -> Result<Vec<Transaction>>;

    /// Load a single transaction
    async fn load_transaction(&self, id: TransactionId) -> Result<Option<Transaction>>;

    /// Move a transaction from `from` to `to`; `false` if it was not in `from`
    async fn update_status(
        &self,
        id: TransactionId,
        from: TransactionStatus,
        to: TransactionStatus,
    ) -> Result<bool>;
}

/// In-memory wallets for tests and local runs
///
/// The CAS holds the wallet's map entry for the whole write, so the balance
/// change and its log lines are observed together.
#[derive(Debug, Default)]
pub struct InMemoryWallets {
    accounts: DashMap<UserId, WalletAccount>,
    transactions: DashMap<TransactionId, Transaction>,
    log: DashMap<UserId, Vec<TransactionId>>,
    unavailable: DashSet<UserId>,
    rejected_kinds: DashSet<TransactionKind>,
}

impl InMemoryWallets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every commit for `user_id` fail as if storage were down
    pub fn make_unavailable(&self, user_id: UserId) {
        self.unavailable.insert(user_id);
    }

    /// Undo [`InMemoryWallets::make_unavailable`]
    pub fn make_available(&self, user_id: UserId) {
        self.unavailable.remove(&user_id);
    }

    /// Fail any commit carrying a line of `kind`, for every user
    pub fn reject_kind(&self, kind: TransactionKind) {
        self.rejected_kinds.insert(kind);
    }

    /// Undo [`InMemoryWallets::reject_kind`]
    pub fn accept_kind(&self, kind: TransactionKind) {
        self.rejected_kinds.remove(&kind);
    }
}

#[async_trait::async_trait]
impl WalletBackend for InMemoryWallets {
    async fn create_account(&self, user_id: UserId) -> Result<WalletAccount> {
        let account =
            self.accounts.entry(user_id).or_insert_with(|| WalletAccount::empty(user_id));
        Ok(account.clone())
    }

    async fn load_account(&self, user_id: UserId) -> Result<Option<WalletAccount>> {
        Ok(self.accounts.get(&user_id).map(|account| account.clone()))
    }

    async fn compare_and_swap(
        &self,
        user_id: UserId,
        expected: Money,
        new_balance: Money,
        transactions: &[Transaction],
    ) -> Result<bool> {
        if self.unavailable.contains(&user_id) {
            return Err(LedgerError::Unavailable {
                message: format!("wallet store offline for user {user_id}"),
            });
        }
        if let Some(tx) = transactions.iter().find(|tx| self.rejected_kinds.contains(&tx.kind)) {
            return Err(LedgerError::Unavailable {
                message: format!("wallet store rejecting {} lines", tx.kind.as_str()),
            });
        }

        let mut account =
            self.accounts.get_mut(&user_id).ok_or(LedgerError::AccountNotFound { user_id })?;

        if account.balance != expected {
            return Ok(false);
        }

        let mut log = self.log.entry(user_id).or_default();
        for tx in transactions {
            self.transactions.insert(tx.id, tx.clone());
            log.push(tx.id);
        }

        account.balance = new_balance;
        account.updated_at = Utc::now();
        Ok(true)
    }

    async fn transactions_for(&self, user_id: UserId) -> Result<Vec<Transaction>> {
        let ids = self.log.get(&user_id).map(|ids| ids.clone()).unwrap_or_default();
        Ok(ids
            .iter()
            .filter_map(|id| self.transactions.get(id).map(|tx| tx.clone()))
            .collect())
    }

    async fn load_transaction(&self, id: TransactionId) -> Result<Option<Transaction>> {
        Ok(self.transactions.get(&id).map(|tx| tx.clone()))
    }

    async fn update_status(
        &self,
        id: TransactionId,
        from: TransactionStatus,
        to: TransactionStatus,
    ) -> Result<bool> {
        let mut tx = self
            .transactions
            .get_mut(&id)
            .ok_or(LedgerError::TransactionNotFound { transaction_id: id })?;

        if tx.status != from {
            return Ok(false);
        }
        tx.status = to;
        Ok(true)
    }
}
