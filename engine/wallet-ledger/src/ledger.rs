//! Ledger: the single writer of wallet balances

use crate::backend::{InMemoryWallets, WalletAccount, WalletBackend};
use crate::config::LedgerConfig;
use crate::error::LedgerError;
use crate::money::Money;
use crate::transaction::{Delta, Transaction, TransactionId, TransactionStatus, UserId};
use crate::Result;
use std::sync::Arc;

/// Ledger applies balance deltas through the backend's compare-and-swap
///
/// Every mutation reads the current balance, validates the result is not
/// negative, and commits guarded by the balance it read. A lost race is
/// re-read and re-validated, never blindly re-applied.
#[derive(Clone)]
pub struct Ledger {
    backend: Arc<dyn WalletBackend>,
    config: LedgerConfig,
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger").field("config", &self.config).finish_non_exhaustive()
    }
}

impl Ledger {
    /// Create a new Ledger over a storage backend
    pub fn new(backend: Arc<dyn WalletBackend>, config: LedgerConfig) -> Self {
        Self { backend, config }
    }

    /// Ledger over fresh in-memory wallets
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryWallets::new()), LedgerConfig::default())
    }

    /// Open a wallet for a user (no-op when it already exists)
    pub async fn open_account(&self, user_id: UserId) -> Result<WalletAccount> {
        self.backend.create_account(user_id).await
    }

    /// Current balance; a user without a wallet has an empty one
    pub async fn balance(&self, user_id: UserId) -> Result<Money> {
        Ok(self
            .backend
            .load_account(user_id)
            .await?
            .map(|account| account.balance)
            .unwrap_or(Money::ZERO))
    }

    /// Apply a single delta
    pub async fn apply_delta(&self, user_id: UserId, delta: Delta) -> Result<Transaction> {
        let mut applied = self.apply_deltas(user_id, vec![delta]).await?;
        applied.pop().ok_or_else(|| LedgerError::Corrupt {
            message: "ledger committed no transaction for a single delta".to_string(),
        })
    }

    /// Apply several deltas for one user as one balance change
    ///
    /// Either every delta is logged and the balance moves by their sum, or
    /// nothing changes.
    pub async fn apply_deltas(
        &self,
        user_id: UserId,
        deltas: Vec<Delta>,
    ) -> Result<Vec<Transaction>> {
        if deltas.is_empty() {
            return Ok(Vec::new());
        }

        let total = deltas
            .iter()
            .try_fold(Money::ZERO, |acc, delta| acc.checked_add(delta.amount))
            .ok_or(LedgerError::Overflow)?;

        let attempts = self.config.max_cas_retries + 1;
        for attempt in 1..=attempts {
            let current = match self.backend.load_account(user_id).await? {
                Some(account) => account.balance,
                None if total.is_negative() => {
                    return Err(LedgerError::InsufficientFunds {
                        required: -total,
                        available: Money::ZERO,
                    });
                }
                None => self.backend.create_account(user_id).await?.balance,
            };

            let new_balance = current.checked_add(total).ok_or(LedgerError::Overflow)?;
            if new_balance.is_negative() {
                return Err(LedgerError::InsufficientFunds {
                    required: -total,
                    available: current,
                });
            }

            let mut running = current;
            let transactions: Vec<Transaction> = deltas
                .iter()
                .cloned()
                .map(|delta| {
                    running += delta.amount;
                    Transaction::from_delta(user_id, delta, running)
                })
                .collect();

            if self.backend.compare_and_swap(user_id, current, new_balance, &transactions).await? {
                tracing::debug!(
                    "Applied {} ledger line(s) for user {}: {} -> {}",
                    transactions.len(),
                    user_id,
                    current,
                    new_balance
                );
                return Ok(transactions);
            }

            metrics::increment_counter!("ledger_cas_conflicts_total");
            tracing::debug!(
                "Balance changed under user {} (attempt {}/{}), re-reading",
                user_id,
                attempt,
                attempts
            );
            tokio::task::yield_now().await;
        }

        tracing::warn!("Giving up on balance update for user {} after {} attempts", user_id, attempts);
        Err(LedgerError::Contention { user_id, attempts })
    }

    /// A user's transaction log, oldest first
    pub async fn transactions(&self, user_id: UserId) -> Result<Vec<Transaction>> {
        self.backend.transactions_for(user_id).await
    }

    /// Look up a transaction
    pub async fn transaction(&self, id: TransactionId) -> Result<Transaction> {
        self.backend
            .load_transaction(id)
            .await?
            .ok_or(LedgerError::TransactionNotFound { transaction_id: id })
    }

    /// Resolve a pending transaction to `completed` or `failed`
    ///
    /// This is the only status mutation the log allows; a second resolution
    /// of the same transaction fails.
    pub async fn settle_pending(
        &self,
        id: TransactionId,
        to: TransactionStatus,
    ) -> Result<Transaction> {
        let tx = self.transaction(id).await?;
        if !tx.status.can_transition_to(to) {
            return Err(LedgerError::InvalidStatusTransition {
                transaction_id: id,
                from: tx.status,
                to,
            });
        }

        if !self.backend.update_status(id, TransactionStatus::Pending, to).await? {
            let current = self.transaction(id).await?;
            return Err(LedgerError::InvalidStatusTransition {
                transaction_id: id,
                from: current.status,
                to,
            });
        }

        self.transaction(id).await
    }
}
