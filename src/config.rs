use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::domain::services::reference_engine::TargetRules;
use crate::persistence::DatabaseConfig;

/// Default location of the JSON configuration file
pub const DEFAULT_CONFIG_PATH: &str = "config/config.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Display precision for a coin
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PrecisionConfig {
    /// Fractional digits kept on target prices
    #[serde(default = "default_price_precision")]
    pub price: u32,
}

impl Default for PrecisionConfig {
    fn default() -> Self {
        Self {
            price: default_price_precision(),
        }
    }
}

/// Per-coin settings. Strategy keys the trading engine uses (MACD, RSI,
/// volatility windows...) may be present in the file and are ignored here.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CoinConfig {
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub buy_percentage: Option<Decimal>,
    #[serde(default)]
    pub sell_percentage: Option<Decimal>,
    #[serde(default)]
    pub rebuy_discount: Option<Decimal>,
    #[serde(default)]
    pub precision: PrecisionConfig,
}

impl Default for CoinConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            buy_percentage: None,
            sell_percentage: None,
            rebuy_discount: None,
            precision: PrecisionConfig::default(),
        }
    }
}

/// HTTP server and live feed settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Allowed CORS origins; `"*"` allows any
    pub cors_origins: Vec<String>,
    /// Seconds between live feed ticks
    pub feed_interval_secs: u64,
    /// Global request quota; 0 disables rate limiting
    pub requests_per_minute: u32,
    /// Upper bound for `GET /api/trades?limit`
    pub max_trades_limit: u32,
    /// Upper bound for `GET /api/price_history?hours`
    pub max_history_hours: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".to_string(),
            cors_origins: vec!["*".to_string()],
            feed_interval_secs: 2,
            requests_per_minute: 600,
            max_trades_limit: 500,
            max_history_hours: 168,
        }
    }
}

impl ServerConfig {
    pub fn feed_interval(&self) -> Duration {
        Duration::from_secs(self.feed_interval_secs)
    }
}

/// Immutable monitor configuration, built once at startup and shared by `Arc`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MonitorConfig {
    #[serde(default)]
    pub name: String,
    /// Cash currency; never treated as a trading symbol
    #[serde(default = "default_quote_currency")]
    pub quote_currency: String,
    /// Account-wide buy percentage for coins without their own
    #[serde(default = "default_buy_percentage")]
    pub buy_percentage: Decimal,
    /// Account-wide sell percentage for coins without their own
    #[serde(default = "default_sell_percentage")]
    pub sell_percentage: Decimal,
    #[serde(default)]
    pub coins: BTreeMap<String, CoinConfig>,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Public view of the configuration served by `GET /api/config/info`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigInfo {
    pub name: String,
    pub database: String,
    pub coins: Vec<String>,
}

fn default_price_precision() -> u32 {
    2
}

fn enabled_by_default() -> bool {
    true
}

fn default_quote_currency() -> String {
    "USDC".to_string()
}

fn default_buy_percentage() -> Decimal {
    Decimal::from(10)
}

fn default_sell_percentage() -> Decimal {
    Decimal::ONE_HUNDRED
}

impl MonitorConfig {
    /// Parse and validate a JSON document
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let mut config: MonitorConfig = serde_json::from_str(raw)?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    /// Load the file named by `CONFIG_PATH` and apply environment overrides
    pub fn from_env() -> Result<Self, ConfigError> {
        let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        tracing::info!("Loading configuration from {}", path);

        let mut config = Self::load(&path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply environment-style overrides. Values that fail to parse or fall
    /// outside their range are reported and ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("DATABASE_URL") {
            if !url.trim().is_empty() {
                self.database.url = url.trim().to_string();
            }
        }

        if let Some(raw) = lookup("DATABASE_MAX_CONNECTIONS") {
            match raw.parse::<u32>() {
                Ok(value) if value > 0 => self.database.max_connections = value,
                _ => tracing::warn!(
                    "Invalid DATABASE_MAX_CONNECTIONS '{}', using default: {}",
                    raw,
                    self.database.max_connections
                ),
            }
        }

        if let Some(addr) = lookup("BIND_ADDR") {
            if !addr.trim().is_empty() {
                self.server.bind_addr = addr.trim().to_string();
            }
        }

        if let Some(origins) = lookup("CORS_ORIGINS") {
            let origins: Vec<String> = origins
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
            if !origins.is_empty() {
                self.server.cors_origins = origins;
            }
        }

        if let Some(raw) = lookup("FEED_INTERVAL_SECS") {
            match raw.parse::<u64>() {
                Ok(value) if (1..=3600).contains(&value) => self.server.feed_interval_secs = value,
                _ => tracing::warn!(
                    "Invalid FEED_INTERVAL_SECS '{}' (must be 1-3600), using default: {}",
                    raw,
                    self.server.feed_interval_secs
                ),
            }
        }

        if let Some(raw) = lookup("RATE_LIMIT_PER_MINUTE") {
            match raw.parse::<u32>() {
                Ok(value) => self.server.requests_per_minute = value,
                Err(e) => tracing::warn!(
                    "Failed to parse RATE_LIMIT_PER_MINUTE '{}': {}, using default: {}",
                    raw,
                    e,
                    self.server.requests_per_minute
                ),
            }
        }

        if let Some(raw) = lookup("MAX_TRADES_LIMIT") {
            match raw.parse::<u32>() {
                Ok(value) if value > 0 => self.server.max_trades_limit = value,
                _ => tracing::warn!(
                    "Invalid MAX_TRADES_LIMIT '{}', using default: {}",
                    raw,
                    self.server.max_trades_limit
                ),
            }
        }

        if let Some(raw) = lookup("MAX_HISTORY_HOURS") {
            match raw.parse::<u32>() {
                Ok(value) if value > 0 => self.server.max_history_hours = value,
                _ => tracing::warn!(
                    "Invalid MAX_HISTORY_HOURS '{}', using default: {}",
                    raw,
                    self.server.max_history_hours
                ),
            }
        }
    }

    /// Upper-case coin keys and the quote currency so lookups never depend on
    /// how the file was written
    fn normalize(&mut self) {
        self.quote_currency = self.quote_currency.trim().to_uppercase();
        let coins = std::mem::take(&mut self.coins);
        self.coins = coins
            .into_iter()
            .map(|(symbol, coin)| (symbol.trim().to_uppercase(), coin))
            .collect();
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.coins.is_empty() {
            return Err(ConfigError::Invalid(
                "coins must define at least one symbol".to_string(),
            ));
        }
        if self.quote_currency.is_empty() {
            return Err(ConfigError::Invalid("quote_currency must not be empty".to_string()));
        }

        let floor = -Decimal::ONE_HUNDRED;
        if self.buy_percentage <= floor || self.sell_percentage <= floor {
            return Err(ConfigError::Invalid(
                "account buy/sell percentages must be greater than -100".to_string(),
            ));
        }

        for (symbol, coin) in &self.coins {
            for (field, value) in [
                ("buy_percentage", coin.buy_percentage),
                ("sell_percentage", coin.sell_percentage),
            ] {
                if matches!(value, Some(pct) if pct <= floor) {
                    return Err(ConfigError::Invalid(format!(
                        "{}.{} must be greater than -100",
                        symbol, field
                    )));
                }
            }
            if let Some(discount) = coin.rebuy_discount {
                if discount < Decimal::ZERO || discount > Decimal::ONE_HUNDRED {
                    return Err(ConfigError::Invalid(format!(
                        "{}.rebuy_discount must be between 0 and 100, got {}",
                        symbol, discount
                    )));
                }
            }
            if coin.precision.price > 18 {
                return Err(ConfigError::Invalid(format!(
                    "{}.precision.price must be at most 18",
                    symbol
                )));
            }
        }

        if self.server.max_trades_limit == 0 || self.server.max_history_hours == 0 {
            return Err(ConfigError::Invalid(
                "server limits must be positive".to_string(),
            ));
        }
        if self.server.feed_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "server.feed_interval_secs must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// Enabled trading symbols, excluding the quote currency, in key order
    pub fn enabled_symbols(&self) -> Vec<String> {
        self.coins
            .iter()
            .filter(|(symbol, coin)| coin.enabled && **symbol != self.quote_currency)
            .map(|(symbol, _)| symbol.clone())
            .collect()
    }

    /// Percentages that drive the targets of `symbol`. Coins without their own
    /// entry fall back to the account defaults and no rebuy discount.
    pub fn target_rules(&self, symbol: &str) -> TargetRules {
        let coin = self.coins.get(&symbol.to_uppercase());
        TargetRules {
            sell_pct: coin
                .and_then(|c| c.sell_percentage)
                .unwrap_or(self.sell_percentage),
            buy_pct: coin
                .and_then(|c| c.buy_percentage)
                .unwrap_or(self.buy_percentage),
            rebuy_discount: coin
                .and_then(|c| c.rebuy_discount)
                .unwrap_or(Decimal::ZERO),
            price_precision: coin
                .map(|c| c.precision.price)
                .unwrap_or_else(default_price_precision),
        }
    }

    pub fn info(&self) -> ConfigInfo {
        ConfigInfo {
            name: self.name.clone(),
            database: self.database.url.clone(),
            coins: self
                .coins
                .iter()
                .filter(|(_, coin)| coin.enabled)
                .map(|(symbol, _)| symbol.clone())
                .collect(),
        }
    }
}
