//! Status/Freshness Monitor
//!
//! The bot counts as alive when at least one coin is enabled and a price for
//! some symbol landed within the last minute.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::MonitorConfig;
use crate::domain::entities::trade::Trade;
use crate::domain::repositories::market_repository::{MarketRepository, RepositoryResult};

/// Window in which a price tick counts as fresh
pub const FRESHNESS_WINDOW_SECS: i64 = 60;

/// `last_trade` text when the trades table is empty
pub const NO_TRADES_YET: &str = "No trades yet";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotStatus {
    pub active: bool,
    pub last_trade: String,
    pub latest_update_ts: Option<DateTime<Utc>>,
    pub updated_symbol_count: u64,
    pub seconds_since_update: Option<i64>,
}

/// `"2024-05-01 12:00:00: BTC BUY 0.01 @ 30000"`
pub fn describe_trade(trade: &Trade) -> String {
    let amount = trade
        .amount
        .map(|a| a.normalize().to_string())
        .unwrap_or_else(|| "n/a".to_string());
    let price = trade
        .price
        .map(|p| p.normalize().to_string())
        .unwrap_or_else(|| "n/a".to_string());
    let side = trade
        .side_kind()
        .map(|side| side.as_str())
        .unwrap_or(trade.side.as_str());
    format!(
        "{}: {} {} {} @ {}",
        trade.timestamp.format("%Y-%m-%d %H:%M:%S"),
        trade.symbol,
        side,
        amount,
        price
    )
}

pub fn last_trade_line(trade: Option<&Trade>) -> String {
    trade
        .map(describe_trade)
        .unwrap_or_else(|| NO_TRADES_YET.to_string())
}

pub struct FreshnessMonitor {
    repository: Arc<dyn MarketRepository>,
    config: Arc<MonitorConfig>,
}

impl FreshnessMonitor {
    pub fn new(repository: Arc<dyn MarketRepository>, config: Arc<MonitorConfig>) -> Self {
        Self { repository, config }
    }

    pub async fn status(&self, now: DateTime<Utc>) -> RepositoryResult<BotStatus> {
        let since = now - Duration::seconds(FRESHNESS_WINDOW_SECS);
        let (latest_update_ts, updated_symbol_count, last_trade) = tokio::try_join!(
            self.repository.latest_price_timestamp(),
            self.repository.symbols_updated_since(since),
            self.repository.latest_trade(),
        )?;

        let has_enabled = !self.config.enabled_symbols().is_empty();

        Ok(BotStatus {
            active: has_enabled && updated_symbol_count >= 1,
            last_trade: last_trade_line(last_trade.as_ref()),
            latest_update_ts,
            updated_symbol_count,
            seconds_since_update: latest_update_ts.map(|ts| (now - ts).num_seconds()),
        })
    }
}
