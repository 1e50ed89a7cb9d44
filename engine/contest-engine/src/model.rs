//! Catalog and contest records consumed by the money-and-entry core

use crate::rules::Ruleset;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use wallet_ledger::{Money, TransactionId, UserId};

pub type PlayerId = Uuid;
pub type ContestId = Uuid;
pub type GameId = Uuid;
pub type TeamId = Uuid;
pub type EntryId = Uuid;

/// Player role, parsed from the catalog's position codes
///
/// Codes the platform does not know stay as `Unknown` so roster validation
/// can reject them instead of silently skipping composition rules.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Position {
    Goalkeeper,
    Defender,
    Midfielder,
    Forward,
    Unknown(String),
}

impl Position {
    pub fn code(&self) -> &str {
        match self {
            Position::Goalkeeper => "GK",
            Position::Defender => "DEF",
            Position::Midfielder => "MID",
            Position::Forward => "FWD",
            Position::Unknown(code) => code,
        }
    }
}

impl From<String> for Position {
    fn from(code: String) -> Self {
        match code.trim().to_ascii_uppercase().as_str() {
            "GK" => Position::Goalkeeper,
            "DEF" => Position::Defender,
            "MID" => Position::Midfielder,
            "FWD" => Position::Forward,
            _ => Position::Unknown(code),
        }
    }
}

impl From<Position> for String {
    fn from(position: Position) -> Self {
        position.code().to_string()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerStatus {
    Active,
    Inactive,
}

impl PlayerStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PlayerStatus::Active => "active",
            PlayerStatus::Inactive => "inactive",
        }
    }
}

impl FromStr for PlayerStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(PlayerStatus::Active),
            "inactive" => Ok(PlayerStatus::Inactive),
            other => Err(format!("unknown player status '{other}'")),
        }
    }
}

/// Catalog player with a salary-cap price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub position: Position,
    /// Team affiliation (e.g., "NAVI", "G2")
    pub team: String,
    /// Salary-cap cost, in the same unit as the ruleset's cap
    pub price: Decimal,
    pub status: PlayerStatus,
    /// Points scored, maintained by the results feed
    #[serde(default)]
    pub points: Decimal,
}

impl Player {
    pub fn is_active(&self) -> bool {
        self.status == PlayerStatus::Active
    }
}

/// Contest lifecycle; transitions only move forward
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContestStatus {
    Open,
    Closed,
    Completed,
}

impl ContestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ContestStatus::Open => "open",
            ContestStatus::Closed => "closed",
            ContestStatus::Completed => "completed",
        }
    }

    pub fn can_advance_to(self, next: ContestStatus) -> bool {
        matches!(
            (self, next),
            (ContestStatus::Open, ContestStatus::Closed)
                | (ContestStatus::Closed, ContestStatus::Completed)
        )
    }
}

impl FromStr for ContestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(ContestStatus::Open),
            "closed" => Ok(ContestStatus::Closed),
            "completed" => Ok(ContestStatus::Completed),
            other => Err(format!("unknown contest status '{other}'")),
        }
    }
}

impl fmt::Display for ContestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ContestType {
    HeadToHead,
    MultiEntry,
    SingleEntry,
    Unknown(String),
}

impl From<String> for ContestType {
    fn from(label: String) -> Self {
        match label.as_str() {
            "Head to Head" => ContestType::HeadToHead,
            "Multi Entry" => ContestType::MultiEntry,
            "Single Entry" => ContestType::SingleEntry,
            _ => ContestType::Unknown(label),
        }
    }
}

impl From<ContestType> for String {
    fn from(contest_type: ContestType) -> Self {
        match contest_type {
            ContestType::HeadToHead => "Head to Head".to_string(),
            ContestType::MultiEntry => "Multi Entry".to_string(),
            ContestType::SingleEntry => "Single Entry".to_string(),
            ContestType::Unknown(label) => label,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Difficulty {
    Beginner,
    Pro,
    Expert,
    Unknown(String),
}

impl From<String> for Difficulty {
    fn from(label: String) -> Self {
        match label.as_str() {
            "Beginner" => Difficulty::Beginner,
            "Pro" => Difficulty::Pro,
            "Expert" => Difficulty::Expert,
            _ => Difficulty::Unknown(label),
        }
    }
}

impl From<Difficulty> for String {
    fn from(difficulty: Difficulty) -> Self {
        match difficulty {
            Difficulty::Beginner => "Beginner".to_string(),
            Difficulty::Pro => "Pro".to_string(),
            Difficulty::Expert => "Expert".to_string(),
            Difficulty::Unknown(label) => label,
        }
    }
}

/// A paid contest; this core only moves its participant and pool counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contest {
    pub id: ContestId,
    pub game_id: GameId,
    pub name: String,
    pub entry_fee: Money,
    pub prize_pool: Money,
    pub max_participants: u32,
    pub current_participants: u32,
    pub status: ContestStatus,
    pub contest_type: ContestType,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub ruleset: Ruleset,
    pub deadline: DateTime<Utc>,
}

impl Contest {
    pub fn is_open(&self) -> bool {
        self.status == ContestStatus::Open
    }

    pub fn is_full(&self) -> bool {
        self.current_participants >= self.max_participants
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamStatus {
    Active,
    Eliminated,
}

impl TeamStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TeamStatus::Active => "active",
            TeamStatus::Eliminated => "eliminated",
        }
    }
}

impl FromStr for TeamStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(TeamStatus::Active),
            "eliminated" => Ok(TeamStatus::Eliminated),
            other => Err(format!("unknown team status '{other}'")),
        }
    }
}

/// Player slot on a fantasy team
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamPlayer {
    pub player_id: PlayerId,
    pub is_captain: bool,
    pub is_vice_captain: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FantasyTeam {
    pub id: TeamId,
    pub user_id: UserId,
    pub contest_id: ContestId,
    pub name: String,
    pub players: Vec<TeamPlayer>,
    /// Maintained by the results feed
    pub total_points: Decimal,
    pub status: TeamStatus,
    pub created_at: DateTime<Utc>,
}

/// Join record; result fields stay empty until settlement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContestEntry {
    pub id: EntryId,
    pub user_id: UserId,
    pub contest_id: ContestId,
    pub fantasy_team_id: TeamId,
    pub entry_fee_paid: Money,
    pub final_rank: Option<u32>,
    pub points_earned: Option<Decimal>,
    pub winnings: Option<Money>,
    /// Winnings credit, once it has landed in the wallet
    pub payout_transaction_id: Option<TransactionId>,
    pub joined_at: DateTime<Utc>,
}

impl ContestEntry {
    pub fn new(
        user_id: UserId,
        contest_id: ContestId,
        fantasy_team_id: TeamId,
        entry_fee_paid: Money,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            contest_id,
            fantasy_team_id,
            entry_fee_paid,
            final_rank: None,
            points_earned: None,
            winnings: None,
            payout_transaction_id: None,
            joined_at: Utc::now(),
        }
    }

    pub fn is_ranked(&self) -> bool {
        self.final_rank.is_some()
    }
}

/// Entry joined with its team's score, as read for settlement
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredEntry {
    pub entry: ContestEntry,
    pub team_name: String,
    pub total_points: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardRecord {
    pub user_id: UserId,
    pub contest_id: ContestId,
    pub total_points: Decimal,
    pub rank: u32,
    pub winnings: Money,
    pub recorded_at: DateTime<Utc>,
}

/// Identity as supplied by the verification collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: UserId,
    pub username: Option<String>,
    /// Compliance cleared
    pub verified: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_codes() {
        assert_eq!(Position::from("GK".to_string()), Position::Goalkeeper);
        assert_eq!(Position::from("fwd".to_string()), Position::Forward);
        assert_eq!(Position::from("SUP".to_string()), Position::Unknown("SUP".to_string()));
        assert_eq!(Position::Defender.to_string(), "DEF");
    }

    #[test]
    fn test_position_serializes_as_code() {
        let json = serde_json::to_string(&Position::Midfielder).unwrap();
        assert_eq!(json, "\"MID\"");
        let unknown: Position = serde_json::from_str("\"JNG\"").unwrap();
        assert_eq!(unknown, Position::Unknown("JNG".to_string()));
    }

    #[test]
    fn test_contest_status_moves_forward_only() {
        use ContestStatus::*;

        assert!(Open.can_advance_to(Closed));
        assert!(Closed.can_advance_to(Completed));
        assert!(!Open.can_advance_to(Completed));
        assert!(!Completed.can_advance_to(Open));
        assert!(!Closed.can_advance_to(Open));
    }

    #[test]
    fn test_contest_labels() {
        assert_eq!(ContestType::from("Head to Head".to_string()), ContestType::HeadToHead);
        assert_eq!(Difficulty::from("Pro".to_string()), Difficulty::Pro);
        assert_eq!(
            Difficulty::from("Legend".to_string()),
            Difficulty::Unknown("Legend".to_string())
        );
    }
}
