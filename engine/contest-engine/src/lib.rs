//! Contest engine - roster validation, entry, funding and settlement
//!
//! This crate holds the money-and-entry core of the contest platform. It
//! validates fantasy rosters, charges entry fees, moves money in and out of
//! wallets through the payment provider, and pays winnings when a contest
//! completes. Every balance change goes through [`wallet_ledger::Ledger`].

pub mod config;
pub mod entry;
pub mod error;
pub mod funding;
pub mod memory;
pub mod model;
pub mod payment;
pub mod postgres;
pub mod prize;
pub mod repository;
pub mod rules;
pub mod settlement;
pub mod team;

#[cfg(test)]
mod fixtures;

pub use config::{EngineConfig, WalletLimits};
pub use entry::{ContestEntryService, EntryConfirmation};
pub use error::{ContestError, ErrorKind};
pub use funding::{DepositReceipt, PayoutResolution, WalletFundingService, WithdrawalReceipt};
pub use memory::{FailPoint, InMemoryCatalog};
pub use payment::{
    GatewayError, PaymentGateway, PaymentMethod, PayoutDestination, PayoutDetails, SandboxGateway,
};
pub use postgres::PgCatalog;
pub use repository::{CatalogAdmin, ContestRepository, IdentityProvider, RepositoryError};
pub use rules::{PlayerSelection, RosterError, Ruleset};
pub use settlement::{SettlementService, SettlementSummary};
pub use team::{TeamCreated, TeamService};

// Result type alias
pub type Result<T> = std::result::Result<T, ContestError>;
