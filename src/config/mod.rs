//! Configuration management for the copy trader.
//!
//! Loads settings from environment variables and config files.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source and bot wallet identities
    #[serde(default)]
    pub wallets: WalletConfig,
    /// External API endpoints and CLOB credentials
    #[serde(default)]
    pub api: ApiConfig,
    /// Trade discovery parameters
    #[serde(default)]
    pub monitor: MonitorConfig,
    /// Order replication parameters
    #[serde(default)]
    pub execution: ExecutionConfig,
    /// Trade ledger storage
    #[serde(default)]
    pub ledger: LedgerConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WalletConfig {
    /// Address of the source account whose trades are copied
    #[serde(default)]
    pub target_address: String,
    /// Address of the bot-controlled proxy wallet placing the copies
    #[serde(default)]
    pub proxy_address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Polymarket Data API base URL (activities, positions)
    #[serde(default = "default_data_api_url")]
    pub data_api_url: String,
    /// Polymarket CLOB base URL (order book, order submission)
    #[serde(default = "default_clob_api_url")]
    pub clob_api_url: String,
    /// Polygon JSON-RPC endpoint for USDC balance reads
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    /// CLOB L2 API key
    #[serde(default)]
    pub api_key: String,
    /// CLOB L2 API secret (HMAC signing key)
    #[serde(default)]
    pub api_secret: String,
    /// CLOB L2 API passphrase
    #[serde(default)]
    pub api_passphrase: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Seconds between source activity polls
    #[serde(default = "default_fetch_interval_secs")]
    pub fetch_interval_secs: u64,
    /// Trades older than this many hours are never ingested
    #[serde(default = "default_max_trade_age_hours")]
    pub max_trade_age_hours: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Seconds between executor cycles (independent of the monitor period)
    #[serde(default = "default_cycle_delay_secs")]
    pub cycle_delay_secs: u64,
    /// Maximum consecutive rejected slices before a trade is abandoned
    #[serde(default = "default_retry_limit")]
    pub retry_limit: u32,
    /// Absolute price drift from the source trade that aborts replication
    #[serde(default = "default_price_tolerance")]
    pub price_tolerance: Decimal,
    /// Pause after a filled slice, letting the book settle
    #[serde(default = "default_fill_pause_ms")]
    pub fill_pause_ms: u64,
    /// Pause after a rejected slice before retrying against a fresh book
    #[serde(default = "default_reject_pause_ms")]
    pub reject_pause_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Path to the SQLite trade ledger
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

// Default value functions

fn default_data_api_url() -> String {
    "https://data-api.polymarket.com".to_string()
}

fn default_clob_api_url() -> String {
    "https://clob.polymarket.com".to_string()
}

fn default_rpc_url() -> String {
    "https://polygon-rpc.com".to_string()
}

fn default_fetch_interval_secs() -> u64 {
    15
}

fn default_max_trade_age_hours() -> u64 {
    1
}

fn default_cycle_delay_secs() -> u64 {
    1
}

fn default_retry_limit() -> u32 {
    3
}

fn default_price_tolerance() -> Decimal {
    Decimal::new(5, 2) // 0.05 in price units
}

fn default_fill_pause_ms() -> u64 {
    500
}

fn default_reject_pause_ms() -> u64 {
    2000
}

fn default_db_path() -> String {
    "data/trades.db".to_string()
}

impl Config {
    /// Load configuration from environment variables and config files.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::default().separator("__").prefix("PMC"))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Validate configuration values.
    ///
    /// Missing wallet identities are a fatal startup condition.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            !self.wallets.target_address.is_empty(),
            "wallets.target_address is required (source account to copy)"
        );

        anyhow::ensure!(
            !self.wallets.proxy_address.is_empty(),
            "wallets.proxy_address is required (bot account placing copies)"
        );

        anyhow::ensure!(
            self.execution.retry_limit > 0,
            "execution.retry_limit must be at least 1"
        );

        anyhow::ensure!(
            self.execution.price_tolerance >= Decimal::ZERO,
            "execution.price_tolerance must not be negative"
        );

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            wallets: WalletConfig::default(),
            api: ApiConfig::default(),
            monitor: MonitorConfig::default(),
            execution: ExecutionConfig::default(),
            ledger: LedgerConfig::default(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            data_api_url: default_data_api_url(),
            clob_api_url: default_clob_api_url(),
            rpc_url: default_rpc_url(),
            api_key: String::new(),
            api_secret: String::new(),
            api_passphrase: String::new(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            fetch_interval_secs: default_fetch_interval_secs(),
            max_trade_age_hours: default_max_trade_age_hours(),
        }
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            cycle_delay_secs: default_cycle_delay_secs(),
            retry_limit: default_retry_limit(),
            price_tolerance: default_price_tolerance(),
            fill_pause_ms: default_fill_pause_ms(),
            reject_pause_ms: default_reject_pause_ms(),
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn config_with_wallets() -> Config {
        let mut config = Config::default();
        config.wallets.target_address = "0xtarget".to_string();
        config.wallets.proxy_address = "0xproxy".to_string();
        config
    }

    #[test]
    fn test_defaults_with_wallets_are_valid() {
        let config = config_with_wallets();
        assert!(config.validate().is_ok());
        assert_eq!(config.execution.price_tolerance, dec!(0.05));
        assert_eq!(config.execution.retry_limit, 3);
    }

    #[test]
    fn test_missing_target_address_is_fatal() {
        let mut config = config_with_wallets();
        config.wallets.target_address.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_proxy_address_is_fatal() {
        let mut config = config_with_wallets();
        config.wallets.proxy_address.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_retry_limit_rejected() {
        let mut config = config_with_wallets();
        config.execution.retry_limit = 0;
        assert!(config.validate().is_err());
    }
}
