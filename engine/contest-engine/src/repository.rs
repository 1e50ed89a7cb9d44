//! Storage and identity ports consumed by the services

use crate::error::ContestError;
use crate::model::{
    Contest, ContestEntry, ContestId, ContestStatus, EntryId, FantasyTeam, LeaderboardRecord,
    Player, PlayerId, ScoredEntry, TeamId, TeamPlayer, UserProfile,
};
use rust_decimal::Decimal;
use thiserror::Error;
use wallet_ledger::{Money, TransactionId, UserId};

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("Contest not found: {contest_id}")]
    ContestNotFound { contest_id: ContestId },

    #[error("Fantasy team not found: {team_id}")]
    TeamNotFound { team_id: TeamId },

    #[error("Contest entry not found: {entry_id}")]
    EntryNotFound { entry_id: EntryId },

    #[error("User {user_id} already has a team in contest {contest_id}")]
    DuplicateTeam { user_id: UserId, contest_id: ContestId },

    #[error("User {user_id} already entered contest {contest_id}")]
    DuplicateEntry { user_id: UserId, contest_id: ContestId },

    #[error("Contest {contest_id} is full ({capacity} participants)")]
    ContestFull { contest_id: ContestId, capacity: u32 },

    #[error("Contest {contest_id} is {status}, not open")]
    ContestNotOpen { contest_id: ContestId, status: ContestStatus },

    #[error("Contest {contest_id} cannot move from {from} to {to}")]
    InvalidStatusTransition { contest_id: ContestId, from: ContestStatus, to: ContestStatus },

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Corrupt row: {0}")]
    Corrupt(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type RepositoryResult<T> = std::result::Result<T, RepositoryError>;

/// Contest, team and entry storage
#[async_trait::async_trait]
pub trait ContestRepository: Send + Sync {
    async fn contest(&self, contest_id: ContestId) -> RepositoryResult<Option<Contest>>;

    /// Catalog rows for the given ids; unknown ids are simply absent
    async fn players(&self, ids: &[PlayerId]) -> RepositoryResult<Vec<Player>>;

    async fn team(&self, team_id: TeamId) -> RepositoryResult<Option<FantasyTeam>>;

    async fn team_for(
        &self,
        user_id: UserId,
        contest_id: ContestId,
    ) -> RepositoryResult<Option<FantasyTeam>>;

    /// Insert the team header; its `players` are written separately
    async fn insert_team(&self, team: &FantasyTeam) -> RepositoryResult<()>;

    async fn insert_team_players(
        &self,
        team_id: TeamId,
        players: &[TeamPlayer],
    ) -> RepositoryResult<()>;

    /// Remove a team and any player links it has
    async fn delete_team(&self, team_id: TeamId) -> RepositoryResult<()>;

    async fn entry_for(
        &self,
        user_id: UserId,
        contest_id: ContestId,
    ) -> RepositoryResult<Option<ContestEntry>>;

    /// Insert the entry and bump the contest's participant count and prize
    /// pool by the fee paid, as one atomic step
    ///
    /// Fails without side effects when the contest is no longer open, is at
    /// capacity, or the user already entered it. Returns the updated contest.
    async fn register_entry(&self, entry: &ContestEntry) -> RepositoryResult<Contest>;

    /// Every entry of a contest together with its team's score
    async fn scored_entries(&self, contest_id: ContestId) -> RepositoryResult<Vec<ScoredEntry>>;

    /// Write an entry's result, only if it has no rank yet
    ///
    /// Returns `false` when another settlement already ranked it.
    async fn record_result(
        &self,
        entry_id: EntryId,
        rank: u32,
        points: Decimal,
        winnings: Money,
    ) -> RepositoryResult<bool>;

    /// Link the wallet credit that paid an entry's winnings
    async fn record_payout(
        &self,
        entry_id: EntryId,
        transaction_id: TransactionId,
    ) -> RepositoryResult<()>;

    async fn append_leaderboard(&self, record: &LeaderboardRecord) -> RepositoryResult<()>;

    async fn leaderboard(&self, contest_id: ContestId) -> RepositoryResult<Vec<LeaderboardRecord>>;

    /// Move a contest from `from` to `to`, only if it is still in `from`
    async fn set_contest_status(
        &self,
        contest_id: ContestId,
        from: ContestStatus,
        to: ContestStatus,
    ) -> RepositoryResult<Contest>;
}

/// Identity and verification lookups
#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn profile(&self, user_id: UserId) -> RepositoryResult<Option<UserProfile>>;
}

/// Profile of `user_id`; a missing profile or an unreachable identity
/// service is an external dependency failure
pub async fn require_profile(
    identity: &dyn IdentityProvider,
    user_id: UserId,
) -> Result<UserProfile, ContestError> {
    match identity.profile(user_id).await {
        Ok(Some(profile)) => Ok(profile),
        Ok(None) => Err(ContestError::ProfileNotFound { user_id }),
        Err(e) => {
            tracing::warn!("Identity lookup for user {} failed: {}", user_id, e);
            Err(ContestError::IdentityUnavailable { message: e.to_string() })
        }
    }
}

/// Writes owned by the catalog and results feed, used for seeding
#[async_trait::async_trait]
pub trait CatalogAdmin: Send + Sync {
    async fn upsert_profile(&self, profile: &UserProfile) -> RepositoryResult<()>;

    async fn upsert_player(&self, player: &Player) -> RepositoryResult<()>;

    async fn upsert_contest(&self, contest: &Contest) -> RepositoryResult<()>;

    async fn set_team_points(&self, team_id: TeamId, points: Decimal) -> RepositoryResult<()>;
}
