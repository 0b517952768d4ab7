//! Market Repository Trait
//!
//! Read interface over the tables the trading engine maintains (balances,
//! trades, price history, trading state) plus the single write path for
//! operator commands. Services depend on this trait only, so they can be
//! exercised against any store.
//!
//! Every method is a single logical read (or write) against the current
//! store state. Missing rows are `None` / empty; only an unreachable or
//! corrupted store is an error. Implementations own timeouts and retries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domain::entities::balance::Balance;
use crate::domain::entities::manual_command::{CommandOutcome, ManualCommand, NewManualCommand};
use crate::domain::entities::price_point::PricePoint;
use crate::domain::entities::trade::Trade;
use crate::domain::entities::trading_state::TradingState;
use crate::domain::errors::RepositoryError;

/// Common result type for repository operations
pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[async_trait]
pub trait MarketRepository: Send + Sync {
    /// Price of the most recent tick for `symbol`
    async fn latest_price(&self, symbol: &str) -> RepositoryResult<Option<Decimal>>;

    /// Price of the earliest tick at or after `since`, falling back to the
    /// closest tick before `since` when nothing newer exists
    async fn price_at_or_after(
        &self,
        symbol: &str,
        since: DateTime<Utc>,
    ) -> RepositoryResult<Option<Decimal>>;

    /// Size-weighted average price of the BUY fills after the most recent
    /// SELL (all BUY fills if the symbol was never sold), rounded to 8 digits
    async fn weighted_average_buy_price(&self, symbol: &str) -> RepositoryResult<Option<Decimal>>;

    /// Price of the most recent SELL fill
    async fn last_sell_price(&self, symbol: &str) -> RepositoryResult<Option<Decimal>>;

    /// All balances, ordered by currency
    async fn balances(&self) -> RepositoryResult<Vec<Balance>>;

    /// Trading state rows, optionally for one symbol, ordered by symbol
    async fn trading_states(&self, symbol: Option<&str>) -> RepositoryResult<Vec<TradingState>>;

    /// Most recent trades first, optionally for one symbol
    async fn recent_trades(&self, limit: u32, symbol: Option<&str>) -> RepositoryResult<Vec<Trade>>;

    /// Most recent trade across all symbols
    async fn latest_trade(&self) -> RepositoryResult<Option<Trade>>;

    /// Ticks for `symbol` with timestamp >= `since`, oldest first
    async fn price_history(
        &self,
        symbol: &str,
        since: DateTime<Utc>,
    ) -> RepositoryResult<Vec<PricePoint>>;

    /// Timestamp of the newest tick across all symbols
    async fn latest_price_timestamp(&self) -> RepositoryResult<Option<DateTime<Utc>>>;

    /// Number of distinct symbols with a tick at or after `since`
    async fn symbols_updated_since(&self, since: DateTime<Utc>) -> RepositoryResult<u64>;

    /// Queued commands, newest first, optionally for one symbol
    async fn manual_commands(&self, symbol: Option<&str>) -> RepositoryResult<Vec<ManualCommand>>;

    /// Append a BUY/SELL command, or for CANCEL flag every pending command of
    /// the symbol as executed without inserting anything
    async fn insert_manual_command(
        &self,
        command: NewManualCommand,
    ) -> RepositoryResult<CommandOutcome>;

    /// Cheap round-trip used by health checks
    async fn ping(&self) -> RepositoryResult<()>;
}
