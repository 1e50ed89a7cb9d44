//! Shared setup for service tests

use crate::config::WalletLimits;
use crate::entry::ContestEntryService;
use crate::funding::WalletFundingService;
use crate::memory::InMemoryCatalog;
use crate::model::{
    Contest, ContestId, ContestStatus, ContestType, Difficulty, Player, PlayerStatus, Position,
    TeamId, UserProfile,
};
use crate::payment::SandboxGateway;
use crate::repository::CatalogAdmin;
use crate::rules::{PlayerSelection, Ruleset};
use crate::settlement::SettlementService;
use crate::team::TeamService;
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;
use wallet_ledger::{Delta, InMemoryWallets, Ledger, LedgerConfig, Money, TransactionKind, UserId};

const AFFILIATIONS: [&str; 4] = ["NAVI", "G2", "FAZE", "VIT"];

pub(crate) struct Harness {
    pub wallets: Arc<InMemoryWallets>,
    pub ledger: Arc<Ledger>,
    pub catalog: Arc<InMemoryCatalog>,
    pub gateway: Arc<SandboxGateway>,
}

impl Harness {
    pub async fn new() -> Self {
        let wallets = Arc::new(InMemoryWallets::new());
        let ledger = Arc::new(Ledger::new(wallets.clone(), LedgerConfig { max_cas_retries: 64 }));
        Self {
            wallets,
            ledger,
            catalog: Arc::new(InMemoryCatalog::new()),
            gateway: Arc::new(SandboxGateway::new()),
        }
    }

    pub fn teams(&self) -> TeamService {
        TeamService::new(self.catalog.clone(), self.ledger.clone())
    }

    pub fn entries(&self) -> ContestEntryService {
        ContestEntryService::new(self.ledger.clone(), self.catalog.clone(), self.catalog.clone())
    }

    pub fn funding(&self) -> WalletFundingService {
        WalletFundingService::new(
            self.ledger.clone(),
            self.catalog.clone(),
            self.gateway.clone(),
            WalletLimits::default(),
        )
    }

    pub fn settlement(&self) -> SettlementService {
        SettlementService::new(self.ledger.clone(), self.catalog.clone())
    }

    async fn user(&self, verified: bool, balance: Money) -> UserId {
        let user_id = Uuid::new_v4();
        self.catalog
            .upsert_profile(&UserProfile { user_id, username: None, verified })
            .await
            .unwrap();
        if balance.is_positive() {
            self.ledger
                .apply_delta(user_id, Delta::credit(balance, TransactionKind::Deposit))
                .await
                .unwrap();
        }
        user_id
    }

    pub async fn verified_user(&self, balance: Money) -> UserId {
        self.user(true, balance).await
    }

    pub async fn unverified_user(&self, balance: Money) -> UserId {
        self.user(false, balance).await
    }

    async fn contest(&self, entry_fee: Money, capacity: u32, status: ContestStatus) -> ContestId {
        let contest = Contest {
            id: Uuid::new_v4(),
            game_id: Uuid::new_v4(),
            name: "Weekend Major".to_string(),
            entry_fee,
            prize_pool: Money::ZERO,
            max_participants: capacity,
            current_participants: 0,
            status,
            contest_type: ContestType::MultiEntry,
            difficulty: Difficulty::Pro,
            ruleset: Ruleset::default(),
            deadline: Utc::now() + Duration::hours(2),
        };
        self.catalog.upsert_contest(&contest).await.unwrap();
        contest.id
    }

    pub async fn open_contest(&self, entry_fee: Money, capacity: u32) -> ContestId {
        self.contest(entry_fee, capacity, ContestStatus::Open).await
    }

    pub async fn contest_with_status(&self, status: ContestStatus) -> ContestId {
        self.contest(Money::from_dollars(10), 10, status).await
    }

    /// A legal 1-4-4-2 roster at 9.0M per player
    pub async fn squad(&self) -> Vec<Player> {
        self.squad_costing(Decimal::from(99)).await
    }

    /// A 1-4-4-2 roster whose prices add up to `total`
    pub async fn squad_costing(&self, total: Decimal) -> Vec<Player> {
        let positions = std::iter::once(Position::Goalkeeper)
            .chain(std::iter::repeat(Position::Defender).take(4))
            .chain(std::iter::repeat(Position::Midfielder).take(4))
            .chain(std::iter::repeat(Position::Forward).take(2));

        let mut players = Vec::new();
        for (i, position) in positions.enumerate() {
            let price = if i == 10 { total - Decimal::from(90) } else { Decimal::from(9) };
            let player = Player {
                id: Uuid::new_v4(),
                name: format!("player-{i}"),
                position,
                team: AFFILIATIONS[i % AFFILIATIONS.len()].to_string(),
                price,
                status: PlayerStatus::Active,
                points: Decimal::ZERO,
            };
            self.catalog.upsert_player(&player).await.unwrap();
            players.push(player);
        }
        players
    }

    /// First pick captains, second vice-captains
    pub fn selections(players: &[Player]) -> Vec<PlayerSelection> {
        players
            .iter()
            .enumerate()
            .map(|(i, player)| PlayerSelection {
                player_id: player.id,
                is_captain: i == 0,
                is_vice_captain: i == 1,
            })
            .collect()
    }

    pub async fn team_for(&self, user_id: UserId, contest_id: ContestId) -> TeamId {
        let squad = self.squad().await;
        self.teams()
            .create_team(user_id, contest_id, "Fixture FC", &Self::selections(&squad))
            .await
            .unwrap()
            .team_id
    }

    /// A verified user with `balance` who has joined `contest_id`
    pub async fn entered_user(&self, contest_id: ContestId, balance: Money) -> (UserId, TeamId) {
        let user_id = self.verified_user(balance).await;
        let team_id = self.team_for(user_id, contest_id).await;
        self.entries().join_contest(user_id, contest_id, team_id).await.unwrap();
        (user_id, team_id)
    }
}
