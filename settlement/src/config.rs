//! Configuration for the settlement engine

use crate::{fare::FarePolicy, risk::CashRiskPolicy};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Settlement engine configuration
///
/// Read once at process start; never mutated by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Platform fee percentage (0.20 = 20%)
    pub fee_percentage: Decimal,

    /// Debt at or above which cash rides are blocked
    pub debt_block_threshold: Decimal,

    /// Daily cash rides at or above which cash rides are blocked
    pub max_daily_cash_rides: u32,

    /// Retry behavior for contended commits
    pub retry: RetryConfig,

    /// Data directory for the ledger database
    pub ledger_data_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fee_percentage: Decimal::new(20, 2),          // 0.20
            debt_block_threshold: Decimal::new(50_00, 2), // 50.00
            max_daily_cash_rides: 5,
            retry: RetryConfig::default(),
            ledger_data_dir: PathBuf::from("./data/ledger"),
        }
    }
}

/// Retry configuration for ledger contention
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum attempts before surfacing a retryable failure
    pub max_attempts: u32,

    /// Base backoff (doubled per attempt, with jitter)
    pub base_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_backoff_ms: 25,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("Failed to read config: {}", e)))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(dir) = std::env::var("SETTLEMENT_LEDGER_DATA_DIR") {
            config.ledger_data_dir = PathBuf::from(dir);
        }

        Ok(config)
    }

    /// Fare policy from this configuration
    pub fn fare_policy(&self) -> crate::Result<FarePolicy> {
        FarePolicy::new(self.fee_percentage)
    }

    /// Cash-ride risk policy from this configuration
    pub fn risk_policy(&self) -> CashRiskPolicy {
        CashRiskPolicy::new(self.debt_block_threshold, self.max_daily_cash_rides)
    }
}
