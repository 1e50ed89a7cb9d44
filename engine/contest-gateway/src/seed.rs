//! Catalog seeding from a JSON file
//!
//! Used for local runs and demos. Seeding is repeatable: rows are upserted
//! and wallet balances are topped up to the listed amount, never past it.

use crate::state::AppState;
use anyhow::{Context, Result};
use contest_engine::model::{
    Contest, ContestId, ContestStatus, ContestType, Difficulty, Player, UserProfile,
};
use contest_engine::Ruleset;
use serde::Deserialize;
use std::path::Path;
use tracing::info;
use wallet_ledger::{Delta, Money, TransactionKind, UserId};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SeedFile {
    pub profiles: Vec<UserProfile>,
    pub players: Vec<Player>,
    pub contests: Vec<ContestSeed>,
    pub balances: Vec<BalanceSeed>,
}

/// A contest as listed in a seed file; counters start at zero
#[derive(Debug, Deserialize)]
pub struct ContestSeed {
    pub id: ContestId,
    pub game_id: uuid::Uuid,
    pub name: String,
    pub entry_fee: Money,
    pub max_participants: u32,
    #[serde(default = "open")]
    pub status: ContestStatus,
    pub contest_type: ContestType,
    pub difficulty: Difficulty,
    /// Falls back to the configured default ruleset
    pub ruleset: Option<Ruleset>,
    pub deadline: chrono::DateTime<chrono::Utc>,
}

fn open() -> ContestStatus {
    ContestStatus::Open
}

#[derive(Debug, Deserialize)]
pub struct BalanceSeed {
    pub user_id: UserId,
    pub amount: Money,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub profiles: usize,
    pub players: usize,
    pub contests: usize,
    pub wallets_funded: usize,
}

pub fn read_seed_file(path: &Path) -> Result<SeedFile> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read seed file: {:?}", path))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse seed file: {:?}", path))
}

/// Write everything in `seed` through the catalog and the ledger
pub async fn apply_seed(state: &AppState, seed: SeedFile) -> Result<SeedReport> {
    let mut report = SeedReport::default();

    for profile in &seed.profiles {
        state.catalog.upsert_profile(profile).await.context("Failed to seed profile")?;
        report.profiles += 1;
    }

    for player in &seed.players {
        state.catalog.upsert_player(player).await.context("Failed to seed player")?;
        report.players += 1;
    }

    for contest in seed.contests {
        let contest = Contest {
            id: contest.id,
            game_id: contest.game_id,
            name: contest.name,
            entry_fee: contest.entry_fee,
            prize_pool: Money::ZERO,
            max_participants: contest.max_participants,
            current_participants: 0,
            status: contest.status,
            contest_type: contest.contest_type,
            difficulty: contest.difficulty,
            ruleset: contest.ruleset.unwrap_or_else(|| state.default_ruleset.clone()),
            deadline: contest.deadline,
        };
        state.catalog.upsert_contest(&contest).await.context("Failed to seed contest")?;
        report.contests += 1;
    }

    for wallet in &seed.balances {
        let current = state.ledger.balance(wallet.user_id).await?;
        let top_up = wallet.amount - current;
        if top_up.is_positive() {
            state
                .ledger
                .apply_delta(
                    wallet.user_id,
                    Delta::credit(top_up, TransactionKind::Deposit)
                        .with_metadata(serde_json::json!({ "source": "seed" })),
                )
                .await
                .context("Failed to seed wallet balance")?;
            report.wallets_funded += 1;
        }
    }

    info!(
        "Seeded {} profiles, {} players, {} contests, funded {} wallets",
        report.profiles, report.players, report.contests, report.wallets_funded
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use contest_engine::WalletLimits;
    use std::io::Write;

    const USER: &str = "7f0c2c8e-4a9b-4c55-9d5e-2d1f3a6b8c01";
    const CONTEST: &str = "1b6d6f0a-2f6e-4e0a-8f34-5a2e7c9d0b12";

    fn seed_json() -> String {
        format!(
            r#"{{
  "profiles": [{{ "user_id": "{USER}", "username": "s1mple", "verified": true }}],
  "players": [{{
    "id": "0e9f5a3c-8d2b-4b7a-a1c6-3f4e5d6c7b8a",
    "name": "b1t",
    "position": "MID",
    "team": "NAVI",
    "price": "8.5",
    "status": "active"
  }}],
  "contests": [{{
    "id": "{CONTEST}",
    "game_id": "5c4b3a29-1807-4f6e-9d5c-4b3a29180706",
    "name": "Blast Premier",
    "entry_fee": 1000,
    "max_participants": 50,
    "contest_type": "Multi Entry",
    "difficulty": "Pro",
    "deadline": "2030-01-01T18:00:00Z"
  }}],
  "balances": [{{ "user_id": "{USER}", "amount": 25000 }}]
}}"#
        )
    }

    #[tokio::test]
    async fn test_seed_file_populates_catalog_and_wallets() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(seed_json().as_bytes()).unwrap();

        let state = AppState::for_tests(WalletLimits::default());
        let seed = read_seed_file(file.path()).unwrap();
        let report = apply_seed(&state, seed).await.unwrap();

        assert_eq!(
            report,
            SeedReport { profiles: 1, players: 1, contests: 1, wallets_funded: 1 }
        );
        let user: UserId = USER.parse().unwrap();
        assert_eq!(state.ledger.balance(user).await.unwrap(), Money::from_dollars(250));
    }

    #[tokio::test]
    async fn test_reseeding_does_not_double_fund() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(seed_json().as_bytes()).unwrap();
        let state = AppState::for_tests(WalletLimits::default());

        apply_seed(&state, read_seed_file(file.path()).unwrap()).await.unwrap();
        let second = apply_seed(&state, read_seed_file(file.path()).unwrap()).await.unwrap();

        assert_eq!(second.wallets_funded, 0);
        let user: UserId = USER.parse().unwrap();
        assert_eq!(state.ledger.balance(user).await.unwrap(), Money::from_dollars(250));
        assert_eq!(state.ledger.transactions(user).await.unwrap().len(), 1);
    }

    #[test]
    fn test_unreadable_seed_file_is_an_error() {
        assert!(read_seed_file(Path::new("/definitely/not/here.json")).is_err());
    }
}
