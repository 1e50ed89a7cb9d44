//! Postgres wallet backend
//!
//! The balance guard is a conditional `UPDATE ... WHERE balance = $expected`
//! inside the same database transaction as the log inserts, so it holds
//! across multiple service instances.

use crate::backend::{WalletAccount, WalletBackend};
use crate::error::LedgerError;
use crate::money::Money;
use crate::transaction::{Transaction, TransactionId, TransactionStatus, UserId};
use crate::Result;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

#[derive(Debug, sqlx::FromRow)]
struct AccountRow {
    user_id: uuid::Uuid,
    balance: i64,
    updated_at: DateTime<Utc>,
}

impl From<AccountRow> for WalletAccount {
    fn from(row: AccountRow) -> Self {
        Self {
            user_id: row.user_id,
            balance: Money::from_cents(row.balance),
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: uuid::Uuid,
    user_id: uuid::Uuid,
    amount: i64,
    kind: String,
    status: String,
    metadata: serde_json::Value,
    balance_after: i64,
    created_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = LedgerError;

    fn try_from(row: TransactionRow) -> Result<Self> {
        let kind = row.kind.parse().map_err(|message| LedgerError::Corrupt { message })?;
        let status = row.status.parse().map_err(|message| LedgerError::Corrupt { message })?;

        Ok(Self {
            id: TransactionId(row.id),
            user_id: row.user_id,
            amount: Money::from_cents(row.amount),
            kind,
            status,
            metadata: row.metadata,
            balance_after: Money::from_cents(row.balance_after),
            created_at: row.created_at,
        })
    }
}

/// Wallets stored in the `wallet_accounts` / `wallet_transactions` tables
#[derive(Debug, Clone)]
pub struct PgWallets {
    db_pool: PgPool,
}

impl PgWallets {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }
}

#[async_trait::async_trait]
impl WalletBackend for PgWallets {
    async fn create_account(&self, user_id: UserId) -> Result<WalletAccount> {
        sqlx::query(
            "INSERT INTO wallet_accounts (user_id, balance, updated_at) VALUES ($1, 0, NOW())
             ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(user_id)
        .execute(&self.db_pool)
        .await?;

        self.load_account(user_id).await?.ok_or(LedgerError::AccountNotFound { user_id })
    }

    async fn load_account(&self, user_id: UserId) -> Result<Option<WalletAccount>> {
        let row = sqlx::query_as::<_, AccountRow>(
            "SELECT user_id, balance, updated_at FROM wallet_accounts WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.db_pool)
        .await?;

        Ok(row.map(WalletAccount::from))
    }

    async fn compare_and_swap(
        &self,
        user_id: UserId,
        expected: Money,
        new_balance: Money,
        transactions: &[Transaction],
    ) -> Result<bool> {
        let mut db_tx = self.db_pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE wallet_accounts SET balance = $3, updated_at = NOW()
             WHERE user_id = $1 AND balance = $2",
        )
        .bind(user_id)
        .bind(expected.cents())
        .bind(new_balance.cents())
        .execute(&mut *db_tx)
        .await?;

        if updated.rows_affected() == 0 {
            db_tx.rollback().await?;
            return Ok(false);
        }

        for tx in transactions {
            sqlx::query(
                "INSERT INTO wallet_transactions
                 (id, user_id, amount, kind, status, metadata, balance_after, created_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            )
            .bind(tx.id.0)
            .bind(tx.user_id)
            .bind(tx.amount.cents())
            .bind(tx.kind.as_str())
            .bind(tx.status.as_str())
            .bind(&tx.metadata)
            .bind(tx.balance_after.cents())
            .bind(tx.created_at)
            .execute(&mut *db_tx)
            .await?;
        }

        db_tx.commit().await?;
        Ok(true)
    }

    async fn transactions_for(&self, user_id: UserId) -> Result<Vec<Transaction>> {
        let rows = sqlx::query_as::<_, TransactionRow>(
            "SELECT id, user_id, amount, kind, status, metadata, balance_after, created_at
             FROM wallet_transactions WHERE user_id = $1 ORDER BY seq ASC",
        )
        .bind(user_id)
        .fetch_all(&self.db_pool)
        .await?;

        rows.into_iter().map(Transaction::try_from).collect()
    }

    async fn load_transaction(&self, id: TransactionId) -> Result<Option<Transaction>> {
        let row = sqlx::query_as::<_, TransactionRow>(
            "SELECT id, user_id, amount, kind, status, metadata, balance_after, created_at
             FROM wallet_transactions WHERE id = $1",
        )
        .bind(id.0)
        .fetch_optional(&self.db_pool)
        .await?;

        row.map(Transaction::try_from).transpose()
    }

    async fn update_status(
        &self,
        id: TransactionId,
        from: TransactionStatus,
        to: TransactionStatus,
    ) -> Result<bool> {
        let updated =
            sqlx::query("UPDATE wallet_transactions SET status = $3 WHERE id = $1 AND status = $2")
                .bind(id.0)
                .bind(from.as_str())
                .bind(to.as_str())
                .execute(&self.db_pool)
                .await?;

        if updated.rows_affected() == 0 && self.load_transaction(id).await?.is_none() {
            return Err(LedgerError::TransactionNotFound { transaction_id: id });
        }

        Ok(updated.rows_affected() > 0)
    }
}
