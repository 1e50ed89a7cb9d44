//! Postgres catalog
//!
//! Multi-row steps run inside one database transaction. Registering an
//! entry bumps the contest counters with a conditional `UPDATE` first, so a
//! full or closed contest is detected before anything is written.

use crate::model::{
    Contest, ContestEntry, ContestId, ContestStatus, EntryId, FantasyTeam, LeaderboardRecord,
    Player, PlayerId, ScoredEntry, TeamId, TeamPlayer, UserProfile,
};
use crate::repository::{
    CatalogAdmin, ContestRepository, IdentityProvider, RepositoryError, RepositoryResult,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;
use wallet_ledger::{Money, TransactionId, UserId};

const CONTEST_COLUMNS: &str = "id, game_id, name, entry_fee, prize_pool, max_participants, \
     current_participants, status, contest_type, difficulty, ruleset, deadline";

const ENTRY_COLUMNS: &str = "e.id, e.user_id, e.contest_id, e.fantasy_team_id, e.entry_fee_paid, \
     e.final_rank, e.points_earned, e.winnings, e.payout_transaction_id, e.joined_at";

fn corrupt(message: String) -> RepositoryError {
    RepositoryError::Corrupt(message)
}

#[derive(Debug, sqlx::FromRow)]
struct ProfileRow {
    user_id: Uuid,
    username: Option<String>,
    kyc_verified: bool,
}

#[derive(Debug, sqlx::FromRow)]
struct PlayerRow {
    id: Uuid,
    name: String,
    position: String,
    team: String,
    price: Decimal,
    status: String,
    points: Decimal,
}

impl TryFrom<PlayerRow> for Player {
    type Error = RepositoryError;

    fn try_from(row: PlayerRow) -> RepositoryResult<Self> {
        Ok(Self {
            id: row.id,
            name: row.name,
            position: row.position.into(),
            team: row.team,
            price: row.price,
            status: row.status.parse().map_err(corrupt)?,
            points: row.points,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ContestRow {
    id: Uuid,
    game_id: Uuid,
    name: String,
    entry_fee: i64,
    prize_pool: i64,
    max_participants: i32,
    current_participants: i32,
    status: String,
    contest_type: String,
    difficulty: String,
    ruleset: serde_json::Value,
    deadline: DateTime<Utc>,
}

impl TryFrom<ContestRow> for Contest {
    type Error = RepositoryError;

    fn try_from(row: ContestRow) -> RepositoryResult<Self> {
        Ok(Self {
            id: row.id,
            game_id: row.game_id,
            name: row.name,
            entry_fee: Money::from_cents(row.entry_fee),
            prize_pool: Money::from_cents(row.prize_pool),
            max_participants: u32::try_from(row.max_participants)
                .map_err(|_| corrupt(format!("contest {} has negative capacity", row.id)))?,
            current_participants: u32::try_from(row.current_participants)
                .map_err(|_| corrupt(format!("contest {} has negative participants", row.id)))?,
            status: row.status.parse().map_err(corrupt)?,
            contest_type: row.contest_type.into(),
            difficulty: row.difficulty.into(),
            ruleset: serde_json::from_value(row.ruleset)?,
            deadline: row.deadline,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TeamRow {
    id: Uuid,
    user_id: Uuid,
    contest_id: Uuid,
    team_name: String,
    total_points: Decimal,
    status: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct TeamPlayerRow {
    player_id: Uuid,
    is_captain: bool,
    is_vice_captain: bool,
}

#[derive(Debug, sqlx::FromRow)]
struct EntryRow {
    id: Uuid,
    user_id: Uuid,
    contest_id: Uuid,
    fantasy_team_id: Uuid,
    entry_fee_paid: i64,
    final_rank: Option<i32>,
    points_earned: Option<Decimal>,
    winnings: Option<i64>,
    payout_transaction_id: Option<Uuid>,
    joined_at: DateTime<Utc>,
}

impl TryFrom<EntryRow> for ContestEntry {
    type Error = RepositoryError;

    fn try_from(row: EntryRow) -> RepositoryResult<Self> {
        let final_rank = row
            .final_rank
            .map(u32::try_from)
            .transpose()
            .map_err(|_| corrupt(format!("entry {} has a negative rank", row.id)))?;

        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            contest_id: row.contest_id,
            fantasy_team_id: row.fantasy_team_id,
            entry_fee_paid: Money::from_cents(row.entry_fee_paid),
            final_rank,
            points_earned: row.points_earned,
            winnings: row.winnings.map(Money::from_cents),
            payout_transaction_id: row.payout_transaction_id.map(TransactionId),
            joined_at: row.joined_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ScoredRow {
    #[sqlx(flatten)]
    entry: EntryRow,
    team_name: String,
    total_points: Decimal,
}

#[derive(Debug, sqlx::FromRow)]
struct LeaderboardRow {
    user_id: Uuid,
    contest_id: Uuid,
    total_points: Decimal,
    rank: i32,
    winnings: i64,
    recorded_at: DateTime<Utc>,
}

/// Catalog stored in Postgres
#[derive(Debug, Clone)]
pub struct PgCatalog {
    db_pool: PgPool,
}

impl PgCatalog {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    async fn team_players(&self, team_id: TeamId) -> RepositoryResult<Vec<TeamPlayer>> {
        let rows = sqlx::query_as::<_, TeamPlayerRow>(
            "SELECT player_id, is_captain, is_vice_captain FROM team_players
             WHERE fantasy_team_id = $1 ORDER BY is_captain DESC, is_vice_captain DESC, player_id",
        )
        .bind(team_id)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| TeamPlayer {
                player_id: row.player_id,
                is_captain: row.is_captain,
                is_vice_captain: row.is_vice_captain,
            })
            .collect())
    }

    async fn hydrate_team(&self, row: TeamRow) -> RepositoryResult<FantasyTeam> {
        let players = self.team_players(row.id).await?;
        Ok(FantasyTeam {
            id: row.id,
            user_id: row.user_id,
            contest_id: row.contest_id,
            name: row.team_name,
            players,
            total_points: row.total_points,
            status: row.status.parse().map_err(corrupt)?,
            created_at: row.created_at,
        })
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait::async_trait]
impl ContestRepository for PgCatalog {
    async fn contest(&self, contest_id: ContestId) -> RepositoryResult<Option<Contest>> {
        let row = sqlx::query_as::<_, ContestRow>(&format!(
            "SELECT {CONTEST_COLUMNS} FROM contests WHERE id = $1"
        ))
        .bind(contest_id)
        .fetch_optional(&self.db_pool)
        .await?;

        row.map(Contest::try_from).transpose()
    }

    async fn players(&self, ids: &[PlayerId]) -> RepositoryResult<Vec<Player>> {
        let rows = sqlx::query_as::<_, PlayerRow>(
            "SELECT id, name, position, team, price, status, points FROM players WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.db_pool)
        .await?;

        rows.into_iter().map(Player::try_from).collect()
    }

    async fn team(&self, team_id: TeamId) -> RepositoryResult<Option<FantasyTeam>> {
        let row = sqlx::query_as::<_, TeamRow>(
            "SELECT id, user_id, contest_id, team_name, total_points, status, created_at
             FROM fantasy_teams WHERE id = $1",
        )
        .bind(team_id)
        .fetch_optional(&self.db_pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate_team(row).await?)),
            None => Ok(None),
        }
    }

    async fn team_for(
        &self,
        user_id: UserId,
        contest_id: ContestId,
    ) -> RepositoryResult<Option<FantasyTeam>> {
        let row = sqlx::query_as::<_, TeamRow>(
            "SELECT id, user_id, contest_id, team_name, total_points, status, created_at
             FROM fantasy_teams WHERE user_id = $1 AND contest_id = $2",
        )
        .bind(user_id)
        .bind(contest_id)
        .fetch_optional(&self.db_pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate_team(row).await?)),
            None => Ok(None),
        }
    }

    async fn insert_team(&self, team: &FantasyTeam) -> RepositoryResult<()> {
        let result = sqlx::query(
            "INSERT INTO fantasy_teams (id, user_id, contest_id, team_name, total_points, status, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(team.id)
        .bind(team.user_id)
        .bind(team.contest_id)
        .bind(&team.name)
        .bind(team.total_points)
        .bind(team.status.as_str())
        .bind(team.created_at)
        .execute(&self.db_pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(RepositoryError::DuplicateTeam {
                user_id: team.user_id,
                contest_id: team.contest_id,
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn insert_team_players(
        &self,
        team_id: TeamId,
        players: &[TeamPlayer],
    ) -> RepositoryResult<()> {
        let mut db_tx = self.db_pool.begin().await?;
        for player in players {
            sqlx::query(
                "INSERT INTO team_players (fantasy_team_id, player_id, is_captain, is_vice_captain)
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(team_id)
            .bind(player.player_id)
            .bind(player.is_captain)
            .bind(player.is_vice_captain)
            .execute(&mut *db_tx)
            .await?;
        }
        db_tx.commit().await?;
        Ok(())
    }

    async fn delete_team(&self, team_id: TeamId) -> RepositoryResult<()> {
        let mut db_tx = self.db_pool.begin().await?;
        sqlx::query("DELETE FROM team_players WHERE fantasy_team_id = $1")
            .bind(team_id)
            .execute(&mut *db_tx)
            .await?;
        sqlx::query("DELETE FROM fantasy_teams WHERE id = $1")
            .bind(team_id)
            .execute(&mut *db_tx)
            .await?;
        db_tx.commit().await?;
        Ok(())
    }

    async fn entry_for(
        &self,
        user_id: UserId,
        contest_id: ContestId,
    ) -> RepositoryResult<Option<ContestEntry>> {
        let row = sqlx::query_as::<_, EntryRow>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM contest_entries e WHERE e.user_id = $1 AND e.contest_id = $2"
        ))
        .bind(user_id)
        .bind(contest_id)
        .fetch_optional(&self.db_pool)
        .await?;

        row.map(ContestEntry::try_from).transpose()
    }

    async fn register_entry(&self, entry: &ContestEntry) -> RepositoryResult<Contest> {
        let mut db_tx = self.db_pool.begin().await?;

        let updated = sqlx::query_as::<_, ContestRow>(&format!(
            "UPDATE contests
             SET current_participants = current_participants + 1, prize_pool = prize_pool + $2
             WHERE id = $1 AND status = 'open' AND current_participants < max_participants
             RETURNING {CONTEST_COLUMNS}"
        ))
        .bind(entry.contest_id)
        .bind(entry.entry_fee_paid.cents())
        .fetch_optional(&mut *db_tx)
        .await?;

        let Some(updated) = updated else {
            db_tx.rollback().await?;
            let contest = self
                .contest(entry.contest_id)
                .await?
                .ok_or(RepositoryError::ContestNotFound { contest_id: entry.contest_id })?;
            if !contest.is_open() {
                return Err(RepositoryError::ContestNotOpen {
                    contest_id: contest.id,
                    status: contest.status,
                });
            }
            return Err(RepositoryError::ContestFull {
                contest_id: contest.id,
                capacity: contest.max_participants,
            });
        };

        let inserted = sqlx::query(
            "INSERT INTO contest_entries (id, user_id, contest_id, fantasy_team_id, entry_fee_paid, joined_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(entry.id)
        .bind(entry.user_id)
        .bind(entry.contest_id)
        .bind(entry.fantasy_team_id)
        .bind(entry.entry_fee_paid.cents())
        .bind(entry.joined_at)
        .execute(&mut *db_tx)
        .await;

        match inserted {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => {
                db_tx.rollback().await?;
                return Err(RepositoryError::DuplicateEntry {
                    user_id: entry.user_id,
                    contest_id: entry.contest_id,
                });
            }
            Err(e) => return Err(e.into()),
        }

        db_tx.commit().await?;
        Contest::try_from(updated)
    }

    async fn scored_entries(&self, contest_id: ContestId) -> RepositoryResult<Vec<ScoredEntry>> {
        let rows = sqlx::query_as::<_, ScoredRow>(&format!(
            "SELECT {ENTRY_COLUMNS}, t.team_name, t.total_points
             FROM contest_entries e JOIN fantasy_teams t ON t.id = e.fantasy_team_id
             WHERE e.contest_id = $1"
        ))
        .bind(contest_id)
        .fetch_all(&self.db_pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(ScoredEntry {
                    entry: ContestEntry::try_from(row.entry)?,
                    team_name: row.team_name,
                    total_points: row.total_points,
                })
            })
            .collect()
    }

    async fn record_result(
        &self,
        entry_id: EntryId,
        rank: u32,
        points: Decimal,
        winnings: Money,
    ) -> RepositoryResult<bool> {
        let rank = i32::try_from(rank).map_err(|_| corrupt(format!("rank {rank} out of range")))?;
        let updated = sqlx::query(
            "UPDATE contest_entries SET final_rank = $2, points_earned = $3, winnings = $4
             WHERE id = $1 AND final_rank IS NULL",
        )
        .bind(entry_id)
        .bind(rank)
        .bind(points)
        .bind(winnings.cents())
        .execute(&self.db_pool)
        .await?;

        Ok(updated.rows_affected() == 1)
    }

    async fn record_payout(
        &self,
        entry_id: EntryId,
        transaction_id: TransactionId,
    ) -> RepositoryResult<()> {
        let updated =
            sqlx::query("UPDATE contest_entries SET payout_transaction_id = $2 WHERE id = $1")
                .bind(entry_id)
                .bind(transaction_id.0)
                .execute(&self.db_pool)
                .await?;

        if updated.rows_affected() == 0 {
            return Err(RepositoryError::EntryNotFound { entry_id });
        }
        Ok(())
    }

    async fn append_leaderboard(&self, record: &LeaderboardRecord) -> RepositoryResult<()> {
        let rank = i32::try_from(record.rank)
            .map_err(|_| corrupt(format!("rank {} out of range", record.rank)))?;
        sqlx::query(
            "INSERT INTO leaderboards (user_id, contest_id, total_points, rank, winnings, recorded_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(record.user_id)
        .bind(record.contest_id)
        .bind(record.total_points)
        .bind(rank)
        .bind(record.winnings.cents())
        .bind(record.recorded_at)
        .execute(&self.db_pool)
        .await?;
        Ok(())
    }

    async fn leaderboard(&self, contest_id: ContestId) -> RepositoryResult<Vec<LeaderboardRecord>> {
        let rows = sqlx::query_as::<_, LeaderboardRow>(
            "SELECT user_id, contest_id, total_points, rank, winnings, recorded_at
             FROM leaderboards WHERE contest_id = $1 ORDER BY rank ASC",
        )
        .bind(contest_id)
        .fetch_all(&self.db_pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(LeaderboardRecord {
                    user_id: row.user_id,
                    contest_id: row.contest_id,
                    total_points: row.total_points,
                    rank: u32::try_from(row.rank)
                        .map_err(|_| corrupt(format!("negative leaderboard rank {}", row.rank)))?,
                    winnings: Money::from_cents(row.winnings),
                    recorded_at: row.recorded_at,
                })
            })
            .collect()
    }

    async fn set_contest_status(
        &self,
        contest_id: ContestId,
        from: ContestStatus,
        to: ContestStatus,
    ) -> RepositoryResult<Contest> {
        let row = sqlx::query_as::<_, ContestRow>(&format!(
            "UPDATE contests SET status = $3 WHERE id = $1 AND status = $2 RETURNING {CONTEST_COLUMNS}"
        ))
        .bind(contest_id)
        .bind(from.as_str())
        .bind(to.as_str())
        .fetch_optional(&self.db_pool)
        .await?;

        match row {
            Some(row) => Contest::try_from(row),
            None => {
                let current = self
                    .contest(contest_id)
                    .await?
                    .ok_or(RepositoryError::ContestNotFound { contest_id })?;
                Err(RepositoryError::InvalidStatusTransition {
                    contest_id,
                    from: current.status,
                    to,
                })
            }
        }
    }
}

#[async_trait::async_trait]
impl IdentityProvider for PgCatalog {
    async fn profile(&self, user_id: UserId) -> RepositoryResult<Option<UserProfile>> {
        let row = sqlx::query_as::<_, ProfileRow>(
            "SELECT user_id, username, kyc_verified FROM profiles WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.db_pool)
        .await?;

        Ok(row.map(|row| UserProfile {
            user_id: row.user_id,
            username: row.username,
            verified: row.kyc_verified,
        }))
    }
}

#[async_trait::async_trait]
impl CatalogAdmin for PgCatalog {
    async fn upsert_profile(&self, profile: &UserProfile) -> RepositoryResult<()> {
        sqlx::query(
            "INSERT INTO profiles (user_id, username, kyc_verified) VALUES ($1, $2, $3)
             ON CONFLICT (user_id) DO UPDATE SET username = EXCLUDED.username,
                 kyc_verified = EXCLUDED.kyc_verified",
        )
        .bind(profile.user_id)
        .bind(&profile.username)
        .bind(profile.verified)
        .execute(&self.db_pool)
        .await?;
        Ok(())
    }

    async fn upsert_player(&self, player: &Player) -> RepositoryResult<()> {
        sqlx::query(
            "INSERT INTO players (id, name, position, team, price, status, points)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, position = EXCLUDED.position,
                 team = EXCLUDED.team, price = EXCLUDED.price, status = EXCLUDED.status,
                 points = EXCLUDED.points",
        )
        .bind(player.id)
        .bind(&player.name)
        .bind(player.position.code())
        .bind(&player.team)
        .bind(player.price)
        .bind(player.status.as_str())
        .bind(player.points)
        .execute(&self.db_pool)
        .await?;
        Ok(())
    }

    async fn upsert_contest(&self, contest: &Contest) -> RepositoryResult<()> {
        let contest_type: String = contest.contest_type.clone().into();
        let difficulty: String = contest.difficulty.clone().into();
        let max_participants = i32::try_from(contest.max_participants)
            .map_err(|_| corrupt(format!("contest {} capacity out of range", contest.id)))?;
        let current_participants = i32::try_from(contest.current_participants)
            .map_err(|_| corrupt(format!("contest {} participants out of range", contest.id)))?;

        sqlx::query(
            "INSERT INTO contests (id, game_id, name, entry_fee, prize_pool, max_participants,
                 current_participants, status, contest_type, difficulty, ruleset, deadline)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
             ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, entry_fee = EXCLUDED.entry_fee,
                 max_participants = EXCLUDED.max_participants, status = EXCLUDED.status,
                 contest_type = EXCLUDED.contest_type, difficulty = EXCLUDED.difficulty,
                 ruleset = EXCLUDED.ruleset, deadline = EXCLUDED.deadline",
        )
        .bind(contest.id)
        .bind(contest.game_id)
        .bind(&contest.name)
        .bind(contest.entry_fee.cents())
        .bind(contest.prize_pool.cents())
        .bind(max_participants)
        .bind(current_participants)
        .bind(contest.status.as_str())
        .bind(contest_type)
        .bind(difficulty)
        .bind(serde_json::to_value(&contest.ruleset)?)
        .bind(contest.deadline)
        .execute(&self.db_pool)
        .await?;
        Ok(())
    }

    async fn set_team_points(&self, team_id: TeamId, points: Decimal) -> RepositoryResult<()> {
        let updated = sqlx::query("UPDATE fantasy_teams SET total_points = $2 WHERE id = $1")
            .bind(team_id)
            .bind(points)
            .execute(&self.db_pool)
            .await?;

        if updated.rows_affected() == 0 {
            return Err(RepositoryError::TeamNotFound { team_id });
        }
        Ok(())
    }
}
