//! Contest entry: charge the fee, then register the entry
//!
//! The debit and the registration are two separate commits. A failed
//! registration is compensated with a refund, and a failed refund is
//! surfaced as a fatal [`ContestError::CompensationFailed`].

use crate::error::ContestError;
use crate::model::{ContestEntry, ContestId, EntryId, TeamId};
use crate::repository::{self, ContestRepository, IdentityProvider};
use serde::Serialize;
use std::sync::Arc;
use wallet_ledger::{Delta, Ledger, Money, TransactionId, TransactionKind, UserId};

/// Confirmation of a paid entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryConfirmation {
    pub entry_id: EntryId,
    pub contest_id: ContestId,
    pub contest_name: String,
    pub team_id: TeamId,
    pub team_name: String,
    pub entry_fee: Money,
    pub new_balance: Money,
    /// Fee debit, absent for free contests
    pub transaction_id: Option<TransactionId>,
}

pub struct ContestEntryService {
    ledger: Arc<Ledger>,
    repository: Arc<dyn ContestRepository>,
    identity: Arc<dyn IdentityProvider>,
}

impl ContestEntryService {
    pub fn new(
        ledger: Arc<Ledger>,
        repository: Arc<dyn ContestRepository>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self { ledger, repository, identity }
    }

    /// Enter `team_id` into `contest_id`, paying the entry fee
    pub async fn join_contest(
        &self,
        user_id: UserId,
        contest_id: ContestId,
        team_id: TeamId,
    ) -> Result<EntryConfirmation, ContestError> {
        let profile = repository::require_profile(self.identity.as_ref(), user_id).await?;
        if !profile.verified {
            return Err(ContestError::VerificationRequired {
                action: "join paid contests".to_string(),
            });
        }

        let contest = self
            .repository
            .contest(contest_id)
            .await?
            .ok_or(ContestError::ContestNotFound { contest_id })?;
        if !contest.is_open() {
            return Err(ContestError::ContestClosed { contest_id, status: contest.status });
        }
        if contest.is_full() {
            return Err(ContestError::ContestFull {
                contest_id,
                capacity: contest.max_participants,
            });
        }

        if self.repository.entry_for(user_id, contest_id).await?.is_some() {
            return Err(ContestError::DuplicateEntry { contest_id });
        }

        let team = self
            .repository
            .team(team_id)
            .await?
            .filter(|team| team.user_id == user_id && team.contest_id == contest_id)
            .ok_or(ContestError::TeamNotFound { team_id })?;

        let fee = contest.entry_fee;
        let available = self.ledger.balance(user_id).await?;
        if available < fee {
            return Err(ContestError::InsufficientFunds { required: fee, available });
        }

        let debit = if fee.is_positive() {
            let delta = Delta::debit(fee, TransactionKind::ContestEntry).with_metadata(
                serde_json::json!({
                    "contest_id": contest_id,
                    "contest_name": contest.name,
                    "team_id": team_id,
                }),
            );
            Some(self.ledger.apply_delta(user_id, delta).await?)
        } else {
            None
        };

        let entry = ContestEntry::new(user_id, contest_id, team_id, fee);
        let registered = match self.repository.register_entry(&entry).await {
            Ok(contest) => contest,
            Err(register_err) => {
                let register_err = ContestError::from(register_err);
                if let Some(debit) = &debit {
                    self.refund_entry_fee(user_id, contest_id, debit.id, fee, &register_err).await?;
                }
                return Err(register_err);
            }
        };

        let new_balance = match &debit {
            Some(tx) => tx.balance_after,
            None => self.ledger.balance(user_id).await?,
        };

        metrics::increment_counter!("contest_entries_total");
        tracing::info!(
            "User {} joined contest {} with team {} ({} paid, {}/{} entrants)",
            user_id,
            contest_id,
            team_id,
            fee,
            registered.current_participants,
            registered.max_participants
        );

        Ok(EntryConfirmation {
            entry_id: entry.id,
            contest_id,
            contest_name: registered.name,
            team_id,
            team_name: team.name,
            entry_fee: fee,
            new_balance,
            transaction_id: debit.map(|tx| tx.id),
        })
    }

    async fn refund_entry_fee(
        &self,
        user_id: UserId,
        contest_id: ContestId,
        debit_id: TransactionId,
        fee: Money,
        cause: &ContestError,
    ) -> Result<(), ContestError> {
        tracing::warn!(
            "Registering user {} in contest {} failed after charging {}, refunding: {}",
            user_id,
            contest_id,
            fee,
            cause
        );

        let refund = Delta::credit(fee, TransactionKind::Refund).with_metadata(serde_json::json!({
            "reverses": debit_id,
            "contest_id": contest_id,
            "reason": cause.code(),
        }));

        match self.ledger.apply_delta(user_id, refund).await {
            Ok(_) => {
                metrics::increment_counter!("entry_fee_refunds_total");
                Ok(())
            }
            Err(refund_err) => {
                metrics::increment_counter!("compensation_failures_total", "operation" => "contest_entry");
                tracing::error!(
                    "Entry fee {} for user {} in contest {} was charged but could not be refunded: {}",
                    fee,
                    user_id,
                    contest_id,
                    refund_err
                );
                Err(ContestError::CompensationFailed {
                    operation: "contest entry",
                    user_id,
                    amount: fee,
                    reason: refund_err.to_string(),
                })
            }
        }
    }
}
