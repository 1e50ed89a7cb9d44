//! In-memory catalog for tests and local runs
//!
//! One lock guards all tables, so multi-row steps such as registering an
//! entry are atomic the same way a database transaction would make them.

use crate::model::{
    Contest, ContestEntry, ContestId, ContestStatus, EntryId, FantasyTeam, LeaderboardRecord,
    Player, PlayerId, ScoredEntry, TeamId, TeamPlayer, UserProfile,
};
use crate::repository::{
    CatalogAdmin, ContestRepository, IdentityProvider, RepositoryError, RepositoryResult,
};
use dashmap::DashSet;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use wallet_ledger::{Money, TransactionId, UserId};

/// Storage step that can be told to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    InsertTeamPlayers,
    DeleteTeam,
    RegisterEntry,
    RecordResult,
    RecordPayout,
    AppendLeaderboard,
    Profile,
}

#[derive(Debug, Default)]
struct Tables {
    profiles: HashMap<UserId, UserProfile>,
    players: HashMap<PlayerId, Player>,
    contests: HashMap<ContestId, Contest>,
    teams: HashMap<TeamId, FantasyTeam>,
    entries: HashMap<EntryId, ContestEntry>,
    leaderboard: Vec<LeaderboardRecord>,
}

#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    tables: RwLock<Tables>,
    fail_points: DashSet<FailPoint>,
    stale_entry_reads: AtomicBool,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_on(&self, point: FailPoint) {
        self.fail_points.insert(point);
    }

    pub fn clear_failure(&self, point: FailPoint) {
        self.fail_points.remove(&point);
    }

    /// Make entry lookups miss, the way a lagging read replica would.
    /// Registration still sees every entry.
    pub fn serve_stale_entry_reads(&self, stale: bool) {
        self.stale_entry_reads.store(stale, Ordering::SeqCst);
    }

    fn check(&self, point: FailPoint) -> RepositoryResult<()> {
        if self.fail_points.contains(&point) {
            return Err(RepositoryError::Unavailable(format!("injected failure at {point:?}")));
        }
        Ok(())
    }

    /// Entries of a contest, in no particular order
    pub async fn entries(&self, contest_id: ContestId) -> Vec<ContestEntry> {
        let tables = self.tables.read().await;
        tables.entries.values().filter(|entry| entry.contest_id == contest_id).cloned().collect()
    }

    pub async fn team_count(&self) -> usize {
        self.tables.read().await.teams.len()
    }
}

#[async_trait::async_trait]
impl ContestRepository for InMemoryCatalog {
    async fn contest(&self, contest_id: ContestId) -> RepositoryResult<Option<Contest>> {
        Ok(self.tables.read().await.contests.get(&contest_id).cloned())
    }

    async fn players(&self, ids: &[PlayerId]) -> RepositoryResult<Vec<Player>> {
        let tables = self.tables.read().await;
        Ok(ids.iter().filter_map(|id| tables.players.get(id).cloned()).collect())
    }

    async fn team(&self, team_id: TeamId) -> RepositoryResult<Option<FantasyTeam>> {
        Ok(self.tables.read().await.teams.get(&team_id).cloned())
    }

    async fn team_for(
        &self,
        user_id: UserId,
        contest_id: ContestId,
    ) -> RepositoryResult<Option<FantasyTeam>> {
        let tables = self.tables.read().await;
        Ok(tables
            .teams
            .values()
            .find(|team| team.user_id == user_id && team.contest_id == contest_id)
            .cloned())
    }

    async fn insert_team(&self, team: &FantasyTeam) -> RepositoryResult<()> {
        let mut tables = self.tables.write().await;
        if tables
            .teams
            .values()
            .any(|existing| existing.user_id == team.user_id && existing.contest_id == team.contest_id)
        {
            return Err(RepositoryError::DuplicateTeam {
                user_id: team.user_id,
                contest_id: team.contest_id,
            });
        }

        let mut header = team.clone();
        header.players.clear();
        tables.teams.insert(team.id, header);
        Ok(())
    }

    async fn insert_team_players(
        &self,
        team_id: TeamId,
        players: &[TeamPlayer],
    ) -> RepositoryResult<()> {
        self.check(FailPoint::InsertTeamPlayers)?;
        let mut tables = self.tables.write().await;
        let team = tables.teams.get_mut(&team_id).ok_or(RepositoryError::TeamNotFound { team_id })?;
        team.players.extend_from_slice(players);
        Ok(())
    }

    async fn delete_team(&self, team_id: TeamId) -> RepositoryResult<()> {
        self.check(FailPoint::DeleteTeam)?;
        self.tables.write().await.teams.remove(&team_id);
        Ok(())
    }

    async fn entry_for(
        &self,
        user_id: UserId,
        contest_id: ContestId,
    ) -> RepositoryResult<Option<ContestEntry>> {
        if self.stale_entry_reads.load(Ordering::SeqCst) {
            return Ok(None);
        }
        let tables = self.tables.read().await;
        Ok(tables
            .entries
            .values()
            .find(|entry| entry.user_id == user_id && entry.contest_id == contest_id)
            .cloned())
    }

    async fn register_entry(&self, entry: &ContestEntry) -> RepositoryResult<Contest> {
        self.check(FailPoint::RegisterEntry)?;
        let mut tables = self.tables.write().await;

        if tables
            .entries
            .values()
            .any(|existing| existing.user_id == entry.user_id && existing.contest_id == entry.contest_id)
        {
            return Err(RepositoryError::DuplicateEntry {
                user_id: entry.user_id,
                contest_id: entry.contest_id,
            });
        }

        let contest = tables
            .contests
            .get_mut(&entry.contest_id)
            .ok_or(RepositoryError::ContestNotFound { contest_id: entry.contest_id })?;
        if !contest.is_open() {
            return Err(RepositoryError::ContestNotOpen {
                contest_id: contest.id,
                status: contest.status,
            });
        }
        if contest.is_full() {
            return Err(RepositoryError::ContestFull {
                contest_id: contest.id,
                capacity: contest.max_participants,
            });
        }

        contest.current_participants += 1;
        contest.prize_pool += entry.entry_fee_paid;
        let updated = contest.clone();

        tables.entries.insert(entry.id, entry.clone());
        Ok(updated)
    }

    async fn scored_entries(&self, contest_id: ContestId) -> RepositoryResult<Vec<ScoredEntry>> {
        let tables = self.tables.read().await;
        Ok(tables
            .entries
            .values()
            .filter(|entry| entry.contest_id == contest_id)
            .map(|entry| {
                let team = tables.teams.get(&entry.fantasy_team_id);
                ScoredEntry {
                    entry: entry.clone(),
                    team_name: team.map(|t| t.name.clone()).unwrap_or_default(),
                    total_points: team.map(|t| t.total_points).unwrap_or(Decimal::ZERO),
                }
            })
            .collect())
    }

    async fn record_result(
        &self,
        entry_id: EntryId,
        rank: u32,
        points: Decimal,
        winnings: Money,
    ) -> RepositoryResult<bool> {
        self.check(FailPoint::RecordResult)?;
        let mut tables = self.tables.write().await;
        let entry =
            tables.entries.get_mut(&entry_id).ok_or(RepositoryError::EntryNotFound { entry_id })?;

        if entry.final_rank.is_some() {
            return Ok(false);
        }
        entry.final_rank = Some(rank);
        entry.points_earned = Some(points);
        entry.winnings = Some(winnings);
        Ok(true)
    }

    async fn record_payout(
        &self,
        entry_id: EntryId,
        transaction_id: TransactionId,
    ) -> RepositoryResult<()> {
        self.check(FailPoint::RecordPayout)?;
        let mut tables = self.tables.write().await;
        let entry =
            tables.entries.get_mut(&entry_id).ok_or(RepositoryError::EntryNotFound { entry_id })?;
        entry.payout_transaction_id = Some(transaction_id);
        Ok(())
    }

    async fn append_leaderboard(&self, record: &LeaderboardRecord) -> RepositoryResult<()> {
        self.check(FailPoint::AppendLeaderboard)?;
        self.tables.write().await.leaderboard.push(record.clone());
        Ok(())
    }

    async fn leaderboard(&self, contest_id: ContestId) -> RepositoryResult<Vec<LeaderboardRecord>> {
        let tables = self.tables.read().await;
        let mut records: Vec<_> = tables
            .leaderboard
            .iter()
            .filter(|record| record.contest_id == contest_id)
            .cloned()
            .collect();
        records.sort_by_key(|record| record.rank);
        Ok(records)
    }

    async fn set_contest_status(
        &self,
        contest_id: ContestId,
        from: ContestStatus,
        to: ContestStatus,
    ) -> RepositoryResult<Contest> {
        let mut tables = self.tables.write().await;
        let contest = tables
            .contests
            .get_mut(&contest_id)
            .ok_or(RepositoryError::ContestNotFound { contest_id })?;

        if contest.status != from {
            return Err(RepositoryError::InvalidStatusTransition {
                contest_id,
                from: contest.status,
                to,
            });
        }
        contest.status = to;
        Ok(contest.clone())
    }
}

#[async_trait::async_trait]
impl IdentityProvider for InMemoryCatalog {
    async fn profile(&self, user_id: UserId) -> RepositoryResult<Option<UserProfile>> {
        self.check(FailPoint::Profile)?;
        Ok(self.tables.read().await.profiles.get(&user_id).cloned())
    }
}

#[async_trait::async_trait]
impl CatalogAdmin for InMemoryCatalog {
    async fn upsert_profile(&self, profile: &UserProfile) -> RepositoryResult<()> {
        self.tables.write().await.profiles.insert(profile.user_id, profile.clone());
        Ok(())
    }

    async fn upsert_player(&self, player: &Player) -> RepositoryResult<()> {
        self.tables.write().await.players.insert(player.id, player.clone());
        Ok(())
    }

    async fn upsert_contest(&self, contest: &Contest) -> RepositoryResult<()> {
        self.tables.write().await.contests.insert(contest.id, contest.clone());
        Ok(())
    }

    async fn set_team_points(&self, team_id: TeamId, points: Decimal) -> RepositoryResult<()> {
        let mut tables = self.tables.write().await;
        let team = tables.teams.get_mut(&team_id).ok_or(RepositoryError::TeamNotFound { team_id })?;
        team.total_points = points;
        Ok(())
    }
}
