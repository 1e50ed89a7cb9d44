//! Fantasy team creation

use crate::error::ContestError;
use crate::model::{ContestId, FantasyTeam, PlayerId, Position, TeamId, TeamPlayer, TeamStatus};
use crate::repository::ContestRepository;
use crate::rules::{self, PlayerSelection};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;
use wallet_ledger::{Ledger, Money, UserId};

const MAX_TEAM_NAME_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RosterSlot {
    pub player_id: PlayerId,
    pub name: String,
    pub position: Position,
    pub team: String,
    pub price: Decimal,
    pub is_captain: bool,
    pub is_vice_captain: bool,
}

/// Result of a successful team creation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamCreated {
    pub team_id: TeamId,
    pub team_name: String,
    pub contest_id: ContestId,
    pub contest_name: String,
    pub players: Vec<RosterSlot>,
    pub total_cost: Decimal,
    pub budget: Decimal,
    pub remaining_budget: Decimal,
    pub entry_fee: Money,
    pub wallet_balance: Money,
    /// Whether the current balance covers the entry fee
    pub can_afford_entry: bool,
}

/// Creates validated fantasy teams
pub struct TeamService {
    repository: Arc<dyn ContestRepository>,
    ledger: Arc<Ledger>,
}

impl TeamService {
    pub fn new(repository: Arc<dyn ContestRepository>, ledger: Arc<Ledger>) -> Self {
        Self { repository, ledger }
    }

    /// Validate and persist a team for `contest_id`
    ///
    /// The team header and its player links are written separately. If the
    /// links fail the header is deleted again, so no half-built team is left
    /// behind.
    pub async fn create_team(
        &self,
        user_id: UserId,
        contest_id: ContestId,
        team_name: &str,
        selections: &[PlayerSelection],
    ) -> Result<TeamCreated, ContestError> {
        let team_name = team_name.trim();
        if team_name.is_empty() {
            return Err(ContestError::MissingField { field: "team_name" });
        }
        if team_name.chars().count() > MAX_TEAM_NAME_LEN {
            return Err(ContestError::InvalidField {
                field: "team_name",
                reason: format!("at most {MAX_TEAM_NAME_LEN} characters"),
            });
        }
        if selections.is_empty() {
            return Err(ContestError::MissingField { field: "players" });
        }

        let contest = self
            .repository
            .contest(contest_id)
            .await?
            .ok_or(ContestError::ContestNotFound { contest_id })?;
        if !contest.is_open() {
            return Err(ContestError::ContestClosed { contest_id, status: contest.status });
        }

        if self.repository.team_for(user_id, contest_id).await?.is_some() {
            return Err(ContestError::DuplicateTeam { contest_id });
        }

        let ids: Vec<PlayerId> = selections.iter().map(|s| s.player_id).collect();
        let catalog = self.repository.players(&ids).await?;
        let roster = rules::validate(selections, &catalog, &contest.ruleset).map_err(|e| {
            metrics::increment_counter!("team_validation_failures_total", "code" => e.code());
            tracing::debug!("Roster for user {} rejected: {}", user_id, e);
            e
        })?;

        let team = FantasyTeam {
            id: Uuid::new_v4(),
            user_id,
            contest_id,
            name: team_name.to_string(),
            players: Vec::new(),
            total_points: Decimal::ZERO,
            status: TeamStatus::Active,
            created_at: Utc::now(),
        };
        let links: Vec<TeamPlayer> = roster
            .players
            .iter()
            .map(|selected| TeamPlayer {
                player_id: selected.player.id,
                is_captain: selected.is_captain,
                is_vice_captain: selected.is_vice_captain,
            })
            .collect();

        self.repository.insert_team(&team).await?;
        if let Err(link_err) = self.repository.insert_team_players(team.id, &links).await {
            tracing::warn!("Saving players for team {} failed, removing it: {}", team.id, link_err);
            if let Err(cleanup_err) = self.repository.delete_team(team.id).await {
                metrics::increment_counter!("compensation_failures_total", "operation" => "team_creation");
                tracing::error!(
                    "Could not remove partial team {} for user {}: {}",
                    team.id,
                    user_id,
                    cleanup_err
                );
                return Err(ContestError::CompensationFailed {
                    operation: "team creation",
                    user_id,
                    amount: Money::ZERO,
                    reason: cleanup_err.to_string(),
                });
            }
            return Err(ContestError::TeamCreationFailed { reason: link_err.to_string() });
        }

        let wallet_balance = self.ledger.balance(user_id).await?;
        metrics::increment_counter!("teams_created_total");
        tracing::info!(
            "User {} created team '{}' for contest {} ({}M of {}M)",
            user_id,
            team.name,
            contest_id,
            roster.total_cost,
            contest.ruleset.salary_cap
        );

        Ok(TeamCreated {
            team_id: team.id,
            team_name: team.name,
            contest_id,
            contest_name: contest.name,
            players: roster
                .players
                .into_iter()
                .map(|selected| RosterSlot {
                    player_id: selected.player.id,
                    name: selected.player.name,
                    position: selected.player.position,
                    team: selected.player.team,
                    price: selected.player.price,
                    is_captain: selected.is_captain,
                    is_vice_captain: selected.is_vice_captain,
                })
                .collect(),
            total_cost: roster.total_cost,
            budget: contest.ruleset.salary_cap,
            remaining_budget: roster.remaining_budget,
            entry_fee: contest.entry_fee,
            wallet_balance,
            can_afford_entry: wallet_balance >= contest.entry_fee,
        })
    }
}
