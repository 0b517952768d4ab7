use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::{ConfigInfo, MonitorConfig};
use crate::domain::entities::balance::Balance;
use crate::domain::entities::manual_command::{CommandOutcome, ManualCommand, NewManualCommand};
use crate::domain::entities::price_point::PriceSeries;
use crate::domain::entities::trade::Trade;
use crate::domain::entities::trading_state::TradingState;
use crate::domain::errors::{ApiError, ValidationError};
use crate::domain::repositories::market_repository::MarketRepository;
use crate::domain::services::freshness_monitor::{BotStatus, FreshnessMonitor};
use crate::domain::services::portfolio_aggregator::{PortfolioAggregator, PortfolioSummary};
use crate::domain::services::reference_engine::{CoinBadge, ReferenceEngine};

/// Default number of rows for `GET /api/trades`
pub const DEFAULT_TRADES_LIMIT: u32 = 50;

/// Default window for price history and the badge change window
pub const DEFAULT_WINDOW_HOURS: u32 = 24;

/// Trades carried by each live feed tick
pub const LIVE_TRADES_LIMIT: u32 = 10;

/// Validate an optional `limit` parameter against `1..=max`
pub fn validate_limit(raw: Option<i64>, max: u32) -> Result<u32, ValidationError> {
    let value = raw.unwrap_or(i64::from(DEFAULT_TRADES_LIMIT));
    if value < 1 || value > i64::from(max) {
        return Err(ValidationError::LimitOutOfRange { value, max });
    }
    Ok(value as u32)
}

/// Validate an optional `hours` parameter against `1..=max`
pub fn validate_hours(raw: Option<i64>, max: u32) -> Result<u32, ValidationError> {
    let value = raw.unwrap_or(i64::from(DEFAULT_WINDOW_HOURS));
    if value < 1 || value > i64::from(max) {
        return Err(ValidationError::HoursOutOfRange { value, max });
    }
    Ok(value as u32)
}

/// Normalize an optional symbol filter; blank means no filter.
///
/// Stored symbols are upper-case, so filters are folded the same way the
/// configuration and manual commands fold them.
fn symbol_filter(raw: Option<&str>) -> Option<String> {
    raw.map(|s| s.trim().to_uppercase()).filter(|s| !s.is_empty())
}

/// Data pushed to live feed subscribers on every tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveSnapshot {
    pub status: BotStatus,
    pub balances: Vec<Balance>,
    pub trades: Vec<Trade>,
}

/// Read-side facade used by the HTTP handlers and the live feed
pub struct MonitorService {
    repository: Arc<dyn MarketRepository>,
    config: Arc<MonitorConfig>,
    references: ReferenceEngine,
    portfolio: PortfolioAggregator,
    freshness: FreshnessMonitor,
}

impl MonitorService {
    pub fn new(repository: Arc<dyn MarketRepository>, config: Arc<MonitorConfig>) -> Self {
        info!(
            "Monitoring {} coins against {}",
            config.enabled_symbols().len(),
            config.quote_currency
        );
        Self {
            references: ReferenceEngine::new(repository.clone(), config.clone()),
            portfolio: PortfolioAggregator::new(repository.clone(), config.clone()),
            freshness: FreshnessMonitor::new(repository.clone(), config.clone()),
            repository,
            config,
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub async fn coin_badges(&self, lookback_hours: Option<i64>) -> Result<Vec<CoinBadge>, ApiError> {
        let hours = validate_hours(lookback_hours, self.config.server.max_history_hours)?;
        let badges = self
            .references
            .badges(Utc::now(), Duration::hours(i64::from(hours)))
            .await?;
        Ok(badges)
    }

    pub async fn portfolio_summary(&self) -> Result<PortfolioSummary, ApiError> {
        Ok(self.portfolio.summary().await?)
    }

    pub async fn status(&self) -> Result<BotStatus, ApiError> {
        Ok(self.freshness.status(Utc::now()).await?)
    }

    pub async fn balances(&self) -> Result<Vec<Balance>, ApiError> {
        Ok(self.repository.balances().await?)
    }

    pub async fn trades(&self, limit: Option<i64>, symbol: Option<&str>) -> Result<Vec<Trade>, ApiError> {
        let limit = validate_limit(limit, self.config.server.max_trades_limit)?;
        let symbol = symbol_filter(symbol);
        Ok(self
            .repository
            .recent_trades(limit, symbol.as_deref())
            .await?)
    }

    pub async fn price_history(&self, symbol: &str, hours: Option<i64>) -> Result<PriceSeries, ApiError> {
        let symbol = symbol_filter(Some(symbol)).ok_or(ValidationError::EmptySymbol)?;
        let hours = validate_hours(hours, self.config.server.max_history_hours)?;
        let since = Utc::now() - Duration::hours(i64::from(hours));

        let points = self.repository.price_history(&symbol, since).await?;
        debug!("{} price points for {} over {}h", points.len(), symbol, hours);
        Ok(PriceSeries { symbol, points })
    }

    pub async fn trading_state(&self, symbol: Option<&str>) -> Result<Vec<TradingState>, ApiError> {
        let symbol = symbol_filter(symbol);
        Ok(self.repository.trading_states(symbol.as_deref()).await?)
    }

    pub async fn submit_command(
        &self,
        symbol: &str,
        action: &str,
        amount: Option<Decimal>,
    ) -> Result<CommandOutcome, ApiError> {
        let command = NewManualCommand::new(symbol, action, amount)?;
        info!(
            "Manual command {} for {} (amount {:?})",
            command.action, command.symbol, command.amount
        );
        Ok(self.repository.insert_manual_command(command).await?)
    }

    pub async fn manual_commands(&self, symbol: Option<&str>) -> Result<Vec<ManualCommand>, ApiError> {
        let symbol = symbol_filter(symbol);
        Ok(self.repository.manual_commands(symbol.as_deref()).await?)
    }

    pub fn config_info(&self) -> ConfigInfo {
        self.config.info()
    }

    /// Snapshot for one live feed tick. Trades are filtered only when a
    /// single symbol is given.
    pub async fn live_snapshot(&self, symbol: Option<&str>) -> Result<LiveSnapshot, ApiError> {
        let symbol = symbol_filter(symbol);
        let (status, balances, trades) = tokio::try_join!(
            self.freshness.status(Utc::now()),
            self.repository.balances(),
            self.repository.recent_trades(LIVE_TRADES_LIMIT, symbol.as_deref()),
        )?;
        Ok(LiveSnapshot {
            status,
            balances,
            trades,
        })
    }

    /// Whether the store answers
    pub async fn database_healthy(&self) -> bool {
        self.repository.ping().await.is_ok()
    }
}
