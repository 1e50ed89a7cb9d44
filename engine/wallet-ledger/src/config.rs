//! Configuration for the wallet ledger

use serde::{Deserialize, Serialize};

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// How many times a conflicting compare-and-swap is re-read and retried
    pub max_cas_retries: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self { max_cas_retries: 8 }
    }
}

impl LedgerConfig {
    /// Create config from environment variables
    pub fn from_env() -> Result<Self, crate::LedgerError> {
        let max_cas_retries = std::env::var("LEDGER_MAX_CAS_RETRIES")
            .unwrap_or_else(|_| "8".to_string())
            .parse::<u32>()
            .map_err(|_| crate::LedgerError::InvalidConfig {
                message: "Invalid LEDGER_MAX_CAS_RETRIES".to_string(),
            })?;

        Ok(Self { max_cas_retries })
    }
}
