//! Service wiring

use crate::config::GatewayConfig;
use anyhow::{Context, Result};
use contest_engine::{
    CatalogAdmin, ContestEntryService, ContestRepository, IdentityProvider, InMemoryCatalog,
    PaymentGateway, PgCatalog, SandboxGateway, SettlementService, TeamService,
    WalletFundingService,
};
use contest_engine::Ruleset;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::info;
use wallet_ledger::{InMemoryWallets, Ledger, PgWallets, WalletBackend};

/// Everything a request handler needs
pub struct AppState {
    pub ledger: Arc<Ledger>,
    pub teams: TeamService,
    pub entries: ContestEntryService,
    pub funding: WalletFundingService,
    pub settlement: SettlementService,
    /// Catalog writes, used by seeding
    pub catalog: Arc<dyn CatalogAdmin>,
    /// Ruleset for seeded contests that do not bring their own
    pub default_ruleset: Ruleset,
}

impl AppState {
    /// Build against Postgres when a database url is configured, otherwise
    /// against in-memory storage
    pub async fn new(config: &GatewayConfig, force_in_memory: bool) -> Result<Self> {
        match (&config.database.url, force_in_memory) {
            (Some(url), false) => Self::postgres(config, url).await,
            _ => {
                info!("No database configured, using in-memory storage");
                Ok(Self::in_memory(config))
            }
        }
    }

    pub fn in_memory(config: &GatewayConfig) -> Self {
        Self::assemble(
            Arc::new(InMemoryWallets::new()),
            Arc::new(InMemoryCatalog::new()),
            config,
        )
    }

    async fn postgres(config: &GatewayConfig, url: &str) -> Result<Self> {
        let db_pool = PgPoolOptions::new()
            .max_connections(config.database.max_connections)
            .connect(url)
            .await
            .context("Failed to connect to database")?;
        info!("Connected to database");

        if config.database.run_migrations {
            sqlx::migrate!("./migrations")
                .run(&db_pool)
                .await
                .context("Failed to run database migrations")?;
            info!("Database migrations applied");
        }

        Ok(Self::assemble(
            Arc::new(PgWallets::new(db_pool.clone())),
            Arc::new(PgCatalog::new(db_pool)),
            config,
        ))
    }

    fn assemble<C>(wallets: Arc<dyn WalletBackend>, catalog: Arc<C>, config: &GatewayConfig) -> Self
    where
        C: ContestRepository + IdentityProvider + CatalogAdmin + 'static,
    {
        let ledger = Arc::new(Ledger::new(wallets, config.ledger.clone()));
        let repository: Arc<dyn ContestRepository> = catalog.clone();
        let identity: Arc<dyn IdentityProvider> = catalog.clone();
        // Real payment processing is out of scope; the sandbox settles instantly
        let gateway: Arc<dyn PaymentGateway> = Arc::new(SandboxGateway::new());

        Self {
            teams: TeamService::new(repository.clone(), ledger.clone()),
            entries: ContestEntryService::new(ledger.clone(), repository.clone(), identity.clone()),
            funding: WalletFundingService::new(
                ledger.clone(),
                identity,
                gateway,
                config.engine.wallet.clone(),
            ),
            settlement: SettlementService::new(ledger.clone(), repository),
            catalog,
            ledger,
            default_ruleset: config.engine.default_ruleset.clone(),
        }
    }

    #[cfg(test)]
    pub(crate) fn for_tests(limits: contest_engine::WalletLimits) -> Self {
        let mut config = GatewayConfig::default();
        config.engine.wallet = limits;
        config.ledger = wallet_ledger::LedgerConfig { max_cas_retries: 64 };
        Self::in_memory(&config)
    }
}
