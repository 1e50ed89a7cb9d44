//! Contest settlement: rank entries, record results, pay winnings
//!
//! Each entry is claimed with a conditional result write before any money
//! moves, so running settlement again never pays an entry twice. Entries
//! ranked by an earlier run are reported from their stored results.

use crate::error::ContestError;
use crate::model::{ContestId, ContestStatus, EntryId, LeaderboardRecord, ScoredEntry};
use crate::prize;
use crate::repository::ContestRepository;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use std::cmp::Ordering;
use std::sync::Arc;
use wallet_ledger::{Delta, Ledger, Money, Transaction, TransactionKind, UserId};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Distribution {
    pub entry_id: EntryId,
    pub user_id: UserId,
    pub team_name: String,
    pub rank: u32,
    pub points: Decimal,
    pub prize_amount: Money,
    pub new_balance: Money,
}

/// An entry whose winnings did not reach the wallet
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PayoutFailure {
    pub entry_id: EntryId,
    pub user_id: UserId,
    pub rank: u32,
    pub prize_amount: Money,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettlementSummary {
    pub contest_id: ContestId,
    pub contest_name: String,
    pub total_participants: usize,
    pub total_prize_pool: Money,
    pub total_distributed: Money,
    pub distributions: Vec<Distribution>,
    pub failures: Vec<PayoutFailure>,
    /// Entries ranked by this run
    pub newly_settled: usize,
    /// Entries a previous run had already ranked
    pub already_settled: usize,
}

pub struct SettlementService {
    ledger: Arc<Ledger>,
    repository: Arc<dyn ContestRepository>,
}

/// Highest score first; ties go to the earlier entry, then the lower id
fn standing(a: &ScoredEntry, b: &ScoredEntry) -> Ordering {
    b.total_points
        .cmp(&a.total_points)
        .then_with(|| a.entry.joined_at.cmp(&b.entry.joined_at))
        .then_with(|| a.entry.id.cmp(&b.entry.id))
}

impl SettlementService {
    pub fn new(ledger: Arc<Ledger>, repository: Arc<dyn ContestRepository>) -> Self {
        Self { ledger, repository }
    }

    /// Move a contest one step along open -> closed -> completed
    pub async fn advance_status(
        &self,
        contest_id: ContestId,
        next: ContestStatus,
    ) -> Result<ContestStatus, ContestError> {
        let contest = self
            .repository
            .contest(contest_id)
            .await?
            .ok_or(ContestError::ContestNotFound { contest_id })?;

        if !contest.status.can_advance_to(next) {
            return Err(ContestError::InvalidContestTransition {
                contest_id,
                from: contest.status,
                to: next,
            });
        }

        let updated = self.repository.set_contest_status(contest_id, contest.status, next).await?;
        tracing::info!("Contest {} moved from {} to {}", contest_id, contest.status, updated.status);
        Ok(updated.status)
    }

    /// Settle a completed contest
    ///
    /// Entries run one after another. A failed credit is logged and reported
    /// in [`SettlementSummary::failures`]; the rest of the batch still pays.
    pub async fn settle(&self, contest_id: ContestId) -> Result<SettlementSummary, ContestError> {
        let contest = self
            .repository
            .contest(contest_id)
            .await?
            .ok_or(ContestError::ContestNotFound { contest_id })?;
        if contest.status != ContestStatus::Completed {
            return Err(ContestError::ContestNotCompleted { contest_id, status: contest.status });
        }

        let mut entries = self.repository.scored_entries(contest_id).await?;
        entries.sort_by(standing);
        let payouts = prize::curve(contest.prize_pool, entries.len());

        tracing::info!(
            "Settling contest {} ({} entries, pool {})",
            contest_id,
            entries.len(),
            contest.prize_pool
        );

        let mut summary = SettlementSummary {
            contest_id,
            contest_name: contest.name.clone(),
            total_participants: entries.len(),
            total_prize_pool: contest.prize_pool,
            total_distributed: Money::ZERO,
            distributions: Vec::new(),
            failures: Vec::new(),
            newly_settled: 0,
            already_settled: 0,
        };

        for (index, scored) in entries.into_iter().enumerate() {
            let rank = index as u32 + 1;
            let prize = payouts.get(index).copied().unwrap_or(Money::ZERO);

            if scored.entry.is_ranked() {
                summary.already_settled += 1;
                self.report_settled(&scored, &mut summary).await;
                continue;
            }

            match self
                .repository
                .record_result(scored.entry.id, rank, scored.total_points, prize)
                .await
            {
                Ok(true) => summary.newly_settled += 1,
                Ok(false) => {
                    tracing::warn!("Entry {} was ranked concurrently, skipping", scored.entry.id);
                    summary.already_settled += 1;
                    continue;
                }
                Err(e) => {
                    tracing::error!("Could not record result for entry {}: {}", scored.entry.id, e);
                    summary.failures.push(PayoutFailure {
                        entry_id: scored.entry.id,
                        user_id: scored.entry.user_id,
                        rank,
                        prize_amount: prize,
                        reason: e.to_string(),
                    });
                    continue;
                }
            }

            let record = LeaderboardRecord {
                user_id: scored.entry.user_id,
                contest_id,
                total_points: scored.total_points,
                rank,
                winnings: prize,
                recorded_at: Utc::now(),
            };
            if let Err(e) = self.repository.append_leaderboard(&record).await {
                tracing::warn!("Leaderboard record for entry {} not written: {}", scored.entry.id, e);
            }

            if prize.is_positive() {
                self.pay(&scored, rank, prize, &contest.name, &mut summary).await;
            }
        }

        metrics::increment_counter!("contests_settled_total");
        if !summary.failures.is_empty() {
            tracing::error!(
                "Contest {} settled with {} unpaid entries",
                contest_id,
                summary.failures.len()
            );
        }
        tracing::info!(
            "Contest {} settled: {} distributed to {} winners",
            contest_id,
            summary.total_distributed,
            summary.distributions.len()
        );

        Ok(summary)
    }

    async fn pay(
        &self,
        scored: &ScoredEntry,
        rank: u32,
        prize: Money,
        contest_name: &str,
        summary: &mut SettlementSummary,
    ) {
        let entry = &scored.entry;
        let credit = Delta::credit(prize, TransactionKind::Winnings).with_metadata(serde_json::json!({
            "contest_id": entry.contest_id,
            "contest_name": contest_name,
            "entry_id": entry.id,
            "rank": rank,
            "total_points": scored.total_points,
            "team_name": scored.team_name,
        }));

        match self.ledger.apply_delta(entry.user_id, credit).await {
            Ok(tx) => {
                if let Err(e) = self.repository.record_payout(entry.id, tx.id).await {
                    tracing::warn!(
                        "Winnings {} paid for entry {} but the payout link was not saved: {}",
                        tx.id,
                        entry.id,
                        e
                    );
                }
                metrics::increment_counter!("winnings_paid_total");
                summary.total_distributed += prize;
                summary.distributions.push(Distribution {
                    entry_id: entry.id,
                    user_id: entry.user_id,
                    team_name: scored.team_name.clone(),
                    rank,
                    points: scored.total_points,
                    prize_amount: prize,
                    new_balance: tx.balance_after,
                });
            }
            Err(e) => {
                metrics::increment_counter!("winnings_credit_failures_total");
                tracing::error!(
                    "Winnings of {} for entry {} (user {}, rank {}) not credited: {}",
                    prize,
                    entry.id,
                    entry.user_id,
                    rank,
                    e
                );
                summary.failures.push(PayoutFailure {
                    entry_id: entry.id,
                    user_id: entry.user_id,
                    rank,
                    prize_amount: prize,
                    reason: e.to_string(),
                });
            }
        }
    }

    /// Report an entry a previous run ranked, without moving money
    ///
    /// A failed lookup is reported for that entry alone. A winnings credit
    /// that was written but never linked to its entry is found by the
    /// entry id in its metadata and linked again.
    async fn report_settled(&self, scored: &ScoredEntry, summary: &mut SettlementSummary) {
        let entry = &scored.entry;
        let prize = entry.winnings.unwrap_or(Money::ZERO);
        if !prize.is_positive() {
            return;
        }
        let rank = entry.final_rank.unwrap_or_default();
        let failure = |reason: String| PayoutFailure {
            entry_id: entry.id,
            user_id: entry.user_id,
            rank,
            prize_amount: prize,
            reason,
        };

        let paid = match entry.payout_transaction_id {
            Some(tx_id) => match self.ledger.transaction(tx_id).await {
                Ok(tx) => tx,
                Err(e) => {
                    tracing::error!(
                        "Payout {} of entry {} could not be read back: {}",
                        tx_id,
                        entry.id,
                        e
                    );
                    summary.failures.push(failure(format!("payout {tx_id} could not be read: {e}")));
                    return;
                }
            },
            None => match self.unlinked_winnings(scored).await {
                Ok(Some(tx)) => {
                    tracing::warn!(
                        "Entry {} was credited by {} but never linked, relinking",
                        entry.id,
                        tx.id
                    );
                    if let Err(e) = self.repository.record_payout(entry.id, tx.id).await {
                        tracing::warn!("Payout link for entry {} still not saved: {}", entry.id, e);
                    }
                    tx
                }
                Ok(None) => {
                    summary.failures.push(failure(
                        "winnings recorded but never credited; needs reconciliation".to_string(),
                    ));
                    return;
                }
                Err(e) => {
                    summary
                        .failures
                        .push(failure(format!("payout link missing and wallet unreadable: {e}")));
                    return;
                }
            },
        };

        summary.total_distributed += prize;
        summary.distributions.push(Distribution {
            entry_id: entry.id,
            user_id: entry.user_id,
            team_name: scored.team_name.clone(),
            rank,
            points: entry.points_earned.unwrap_or(scored.total_points),
            prize_amount: prize,
            new_balance: paid.balance_after,
        });
    }

    /// The winnings line written for this entry, if any
    async fn unlinked_winnings(
        &self,
        scored: &ScoredEntry,
    ) -> Result<Option<Transaction>, ContestError> {
        let entry_id = serde_json::json!(scored.entry.id);
        Ok(self
            .ledger
            .transactions(scored.entry.user_id)
            .await?
            .into_iter()
            .find(|tx| {
                tx.kind == TransactionKind::Winnings && tx.metadata.get("entry_id") == Some(&entry_id)
            }))
    }
}
