//! Database Repository
//!
//! SQLite implementation of [`MarketRepository`]. This is the only code that
//! knows SQL; everything above it works with domain entities.
//!
//! Time filters go through `julianday()` so rows written with either
//! `2024-01-01 12:00:00` or RFC 3339 timestamps compare correctly. Price
//! reads skip null and blank `price` cells.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, error};

use super::models::*;
use super::DbPool;
use crate::domain::entities::balance::Balance;
use crate::domain::entities::manual_command::{
    CommandAction, CommandOutcome, ManualCommand, NewManualCommand,
};
use crate::domain::entities::price_point::PricePoint;
use crate::domain::entities::trade::Trade;
use crate::domain::entities::trading_state::TradingState;
use crate::domain::errors::RepositoryError;
use crate::domain::repositories::market_repository::{MarketRepository, RepositoryResult};
use crate::domain::value_objects::decimal_math::weighted_average;

/// Log a store failure and wrap it as an infrastructure error
fn unavailable(context: &'static str) -> impl FnOnce(sqlx::Error) -> RepositoryError {
    move |e| {
        error!("{}: {}", context, e);
        RepositoryError::Unavailable(format!("{}: {}", context, e))
    }
}

/// Market data repository backed by SQLite
#[derive(Clone)]
pub struct SqliteMarketRepository {
    pool: DbPool,
}

impl SqliteMarketRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Timestamp of the most recent SELL fill for `symbol`
    async fn last_sell_timestamp(&self, symbol: &str) -> RepositoryResult<Option<DateTime<Utc>>> {
        sqlx::query_scalar::<_, DateTime<Utc>>(
            r#"
            SELECT timestamp FROM trades
            WHERE symbol = ?1 AND UPPER(side) = 'SELL'
            ORDER BY julianday(timestamp) DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(symbol)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable("Failed to get last sell timestamp"))
    }

    async fn first_price_since(
        &self,
        symbol: &str,
        since: DateTime<Utc>,
    ) -> RepositoryResult<Option<String>> {
        sqlx::query_scalar::<_, String>(
            r#"
            SELECT price FROM price_history
            WHERE symbol = ?1 AND price IS NOT NULL AND TRIM(price) <> ''
              AND julianday(timestamp) >= julianday(?2)
            ORDER BY julianday(timestamp) ASC
            LIMIT 1
            "#,
        )
        .bind(symbol)
        .bind(since)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable("Failed to get price at or after timestamp"))
    }

    async fn last_price_before(
        &self,
        symbol: &str,
        before: DateTime<Utc>,
    ) -> RepositoryResult<Option<String>> {
        sqlx::query_scalar::<_, String>(
            r#"
            SELECT price FROM price_history
            WHERE symbol = ?1 AND price IS NOT NULL AND TRIM(price) <> ''
              AND julianday(timestamp) < julianday(?2)
            ORDER BY julianday(timestamp) DESC
            LIMIT 1
            "#,
        )
        .bind(symbol)
        .bind(before)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable("Failed to get price before timestamp"))
    }
}

#[async_trait]
impl MarketRepository for SqliteMarketRepository {
    async fn latest_price(&self, symbol: &str) -> RepositoryResult<Option<Decimal>> {
        let raw = sqlx::query_scalar::<_, String>(
            r#"
            SELECT price FROM price_history
            WHERE symbol = ?1 AND price IS NOT NULL AND TRIM(price) <> ''
            ORDER BY julianday(timestamp) DESC
            LIMIT 1
            "#,
        )
        .bind(symbol)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable("Failed to get latest price"))?;

        decimal_column("price", raw)
    }

    async fn price_at_or_after(
        &self,
        symbol: &str,
        since: DateTime<Utc>,
    ) -> RepositoryResult<Option<Decimal>> {
        let raw = match self.first_price_since(symbol, since).await? {
            Some(price) => Some(price),
            None => self.last_price_before(symbol, since).await?,
        };
        decimal_column("price", raw)
    }

    async fn weighted_average_buy_price(&self, symbol: &str) -> RepositoryResult<Option<Decimal>> {
        let last_sell = self.last_sell_timestamp(symbol).await?;

        let rows = sqlx::query_as::<_, (Option<String>, Option<String>)>(
            r#"
            SELECT amount, price FROM trades
            WHERE symbol = ?1 AND UPPER(side) = 'BUY'
              AND (?2 IS NULL OR julianday(timestamp) > julianday(?2))
            "#,
        )
        .bind(symbol)
        .bind(last_sell)
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable("Failed to get buy fills"))?;

        let mut fills = Vec::with_capacity(rows.len());
        for (amount, price) in rows {
            fills.push((decimal_column("amount", amount)?, decimal_column("price", price)?));
        }

        let average = weighted_average(fills);
        debug!(
            "DCA for {} since {:?}: {:?}",
            symbol, last_sell, average
        );
        Ok(average)
    }

    async fn last_sell_price(&self, symbol: &str) -> RepositoryResult<Option<Decimal>> {
        let raw = sqlx::query_scalar::<_, Option<String>>(
            r#"
            SELECT price FROM trades
            WHERE symbol = ?1 AND UPPER(side) = 'SELL'
            ORDER BY julianday(timestamp) DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(symbol)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable("Failed to get last sell price"))?;

        decimal_column("price", raw.flatten())
    }

    async fn balances(&self) -> RepositoryResult<Vec<Balance>> {
        let records = sqlx::query_as::<_, BalanceRecord>(
            "SELECT currency, available_balance FROM balances ORDER BY currency",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable("Failed to get balances"))?;

        records.into_iter().map(Balance::try_from).collect()
    }

    async fn trading_states(&self, symbol: Option<&str>) -> RepositoryResult<Vec<TradingState>> {
        let records = sqlx::query_as::<_, TradingStateRecord>(
            r#"
            SELECT symbol, initial_price, total_trades, total_profit
            FROM trading_state
            WHERE (?1 IS NULL OR symbol = ?1)
            ORDER BY symbol
            "#,
        )
        .bind(symbol)
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable("Failed to get trading state"))?;

        records.into_iter().map(TradingState::try_from).collect()
    }

    async fn recent_trades(&self, limit: u32, symbol: Option<&str>) -> RepositoryResult<Vec<Trade>> {
        let records = sqlx::query_as::<_, TradeRecord>(
            r#"
            SELECT id, symbol, side, amount, price, timestamp
            FROM trades
            WHERE (?1 IS NULL OR symbol = ?1)
            ORDER BY julianday(timestamp) DESC, id DESC
            LIMIT ?2
            "#,
        )
        .bind(symbol)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable("Failed to get recent trades"))?;

        records.into_iter().map(Trade::try_from).collect()
    }

    async fn latest_trade(&self) -> RepositoryResult<Option<Trade>> {
        Ok(self.recent_trades(1, None).await?.into_iter().next())
    }

    async fn price_history(
        &self,
        symbol: &str,
        since: DateTime<Utc>,
    ) -> RepositoryResult<Vec<PricePoint>> {
        let records = sqlx::query_as::<_, PriceRecord>(
            r#"
            SELECT timestamp, price FROM price_history
            WHERE symbol = ?1 AND price IS NOT NULL AND TRIM(price) <> ''
              AND julianday(timestamp) >= julianday(?2)
            ORDER BY julianday(timestamp) ASC
            "#,
        )
        .bind(symbol)
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable("Failed to get price history"))?;

        records.into_iter().map(PricePoint::try_from).collect()
    }

    async fn latest_price_timestamp(&self) -> RepositoryResult<Option<DateTime<Utc>>> {
        sqlx::query_scalar::<_, DateTime<Utc>>(
            "SELECT timestamp FROM price_history ORDER BY julianday(timestamp) DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable("Failed to get latest price timestamp"))
    }

    async fn symbols_updated_since(&self, since: DateTime<Utc>) -> RepositoryResult<u64> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(DISTINCT symbol) FROM price_history
            WHERE julianday(timestamp) >= julianday(?1)
            "#,
        )
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .map_err(unavailable("Failed to count updated symbols"))?;

        Ok(count.max(0) as u64)
    }

    async fn manual_commands(&self, symbol: Option<&str>) -> RepositoryResult<Vec<ManualCommand>> {
        let records = sqlx::query_as::<_, ManualCommandRecord>(
            r#"
            SELECT id, symbol, action, amount, executed, timestamp
            FROM manual_commands
            WHERE (?1 IS NULL OR symbol = ?1)
            ORDER BY id DESC
            "#,
        )
        .bind(symbol)
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable("Failed to get manual commands"))?;

        records.into_iter().map(ManualCommand::try_from).collect()
    }

    async fn insert_manual_command(
        &self,
        command: NewManualCommand,
    ) -> RepositoryResult<CommandOutcome> {
        if command.action == CommandAction::Cancel {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(unavailable("Failed to start cancel transaction"))?;

            let affected = sqlx::query(
                r#"
                UPDATE manual_commands
                SET executed = 1
                WHERE symbol = ?1 AND (executed IS NULL OR executed = 0)
                "#,
            )
            .bind(&command.symbol)
            .execute(&mut *tx)
            .await
            .map_err(unavailable("Failed to cancel pending commands"))?
            .rows_affected();

            tx.commit()
                .await
                .map_err(unavailable("Failed to commit cancel transaction"))?;

            debug!("Cancelled {} pending commands for {}", affected, command.symbol);
            return Ok(CommandOutcome::Cancelled { affected });
        }

        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO manual_commands (symbol, action, amount, executed, timestamp)
            VALUES (?1, ?2, ?3, 0, ?4)
            RETURNING id
            "#,
        )
        .bind(&command.symbol)
        .bind(command.action.as_str())
        .bind(command.amount.map(|a| a.to_string()))
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(unavailable("Failed to insert manual command"))?;

        debug!("Queued {} command {} for {}", command.action, id, command.symbol);
        Ok(CommandOutcome::Inserted { id })
    }

    async fn ping(&self) -> RepositoryResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(unavailable("Database ping failed"))?;
        Ok(())
    }
}
