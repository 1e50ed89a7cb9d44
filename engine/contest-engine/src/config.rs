//! Configuration for the contest engine

use crate::error::ContestError;
use crate::rules::Ruleset;
use serde::{Deserialize, Serialize};
use wallet_ledger::Money;

/// Deposit and withdrawal limits, in cents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletLimits {
    pub min_deposit: Money,
    pub max_deposit: Money,
    /// Deposits above this need a verified identity
    pub verification_threshold: Money,
    pub min_withdrawal: Money,
    /// Withdrawal fee in basis points of the amount
    pub withdrawal_fee_bps: u32,
    pub min_withdrawal_fee: Money,
}

impl Default for WalletLimits {
    fn default() -> Self {
        Self {
            min_deposit: Money::from_dollars(10),
            max_deposit: Money::from_dollars(10_000),
            verification_threshold: Money::from_dollars(500),
            min_withdrawal: Money::from_dollars(25),
            withdrawal_fee_bps: 200, // 2%
            min_withdrawal_fee: Money::from_dollars(2),
        }
    }
}

impl WalletLimits {
    /// Fee for withdrawing `amount`: the percentage rounded half-up to the
    /// cent, never below the flat minimum
    pub fn withdrawal_fee(&self, amount: Money) -> Money {
        let percent = amount.to_decimal() * rust_decimal::Decimal::from(self.withdrawal_fee_bps)
            / rust_decimal::Decimal::from(10_000);
        Money::from_decimal_rounded(percent).max(self.min_withdrawal_fee)
    }

    pub fn validate(&self) -> Result<(), ContestError> {
        if self.min_deposit > self.max_deposit {
            return Err(ContestError::InvalidConfig {
                message: "min_deposit exceeds max_deposit".to_string(),
            });
        }
        if !self.min_withdrawal.is_positive() || self.min_withdrawal_fee.is_negative() {
            return Err(ContestError::InvalidConfig {
                message: "withdrawal limits must be positive".to_string(),
            });
        }
        Ok(())
    }
}

/// Contest engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub wallet: WalletLimits,
    /// Ruleset given to contests that do not carry their own
    pub default_ruleset: Ruleset,
}

impl EngineConfig {
    /// Create config from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self, ContestError> {
        let defaults = WalletLimits::default();
        let wallet = WalletLimits {
            min_deposit: cents_var("WALLET_MIN_DEPOSIT_CENTS", defaults.min_deposit)?,
            max_deposit: cents_var("WALLET_MAX_DEPOSIT_CENTS", defaults.max_deposit)?,
            verification_threshold: cents_var(
                "WALLET_VERIFICATION_THRESHOLD_CENTS",
                defaults.verification_threshold,
            )?,
            min_withdrawal: cents_var("WALLET_MIN_WITHDRAWAL_CENTS", defaults.min_withdrawal)?,
            withdrawal_fee_bps: std::env::var("WALLET_WITHDRAWAL_FEE_BPS")
                .unwrap_or_else(|_| defaults.withdrawal_fee_bps.to_string())
                .parse::<u32>()
                .map_err(|_| ContestError::InvalidConfig {
                    message: "Invalid WALLET_WITHDRAWAL_FEE_BPS".to_string(),
                })?,
            min_withdrawal_fee: cents_var(
                "WALLET_MIN_WITHDRAWAL_FEE_CENTS",
                defaults.min_withdrawal_fee,
            )?,
        };
        wallet.validate()?;

        Ok(Self { wallet, default_ruleset: Ruleset::default() })
    }

    pub fn validate(&self) -> Result<(), ContestError> {
        self.wallet.validate()?;
        if self.default_ruleset.roster_size == 0 {
            return Err(ContestError::InvalidConfig {
                message: "default ruleset needs a positive roster size".to_string(),
            });
        }
        Ok(())
    }
}

fn cents_var(name: &str, default: Money) -> Result<Money, ContestError> {
    match std::env::var(name) {
        Ok(value) => value
            .parse::<i64>()
            .map(Money::from_cents)
            .map_err(|_| ContestError::InvalidConfig { message: format!("Invalid {name}") }),
        Err(_) => Ok(default),
    }
}
