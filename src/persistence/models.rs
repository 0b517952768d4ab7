//! Database Models
//!
//! Raw rows as SQLite returns them. Decimal columns arrive as TEXT and are
//! parsed into domain entities here, so nothing above the persistence layer
//! sees a string-encoded number.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;

use crate::domain::entities::balance::Balance;
use crate::domain::entities::manual_command::ManualCommand;
use crate::domain::entities::price_point::PricePoint;
use crate::domain::entities::trade::Trade;
use crate::domain::entities::trading_state::TradingState;
use crate::domain::errors::RepositoryError;
use crate::domain::value_objects::decimal_math::parse_decimal;

/// Parse a nullable decimal column
pub fn decimal_column(column: &str, raw: Option<String>) -> Result<Option<Decimal>, RepositoryError> {
    match raw {
        None => Ok(None),
        Some(value) if value.trim().is_empty() => Ok(None),
        Some(value) => parse_decimal(&value)
            .map(Some)
            .map_err(|_| RepositoryError::Decode {
                column: column.to_string(),
                value,
            }),
    }
}

/// Balance record in database
#[derive(Debug, Clone, FromRow)]
pub struct BalanceRecord {
    pub currency: String,
    pub available_balance: Option<String>,
}

impl TryFrom<BalanceRecord> for Balance {
    type Error = RepositoryError;

    fn try_from(record: BalanceRecord) -> Result<Self, Self::Error> {
        Ok(Balance {
            currency: record.currency,
            available_balance: decimal_column("available_balance", record.available_balance)?,
        })
    }
}

/// Trade record in database
#[derive(Debug, Clone, FromRow)]
pub struct TradeRecord {
    pub id: i64,
    pub symbol: String,
    pub side: String,
    pub amount: Option<String>,
    pub price: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl TryFrom<TradeRecord> for Trade {
    type Error = RepositoryError;

    fn try_from(record: TradeRecord) -> Result<Self, Self::Error> {
        Ok(Trade {
            id: record.id,
            symbol: record.symbol,
            side: record.side,
            amount: decimal_column("amount", record.amount)?,
            price: decimal_column("price", record.price)?,
            timestamp: record.timestamp,
        })
    }
}

/// Price tick in database
#[derive(Debug, Clone, FromRow)]
pub struct PriceRecord {
    pub timestamp: DateTime<Utc>,
    pub price: String,
}

impl TryFrom<PriceRecord> for PricePoint {
    type Error = RepositoryError;

    fn try_from(record: PriceRecord) -> Result<Self, Self::Error> {
        let price = parse_decimal(&record.price).map_err(|_| RepositoryError::Decode {
            column: "price".to_string(),
            value: record.price.clone(),
        })?;
        Ok(PricePoint {
            timestamp: record.timestamp,
            price,
        })
    }
}

/// Trading state record in database
#[derive(Debug, Clone, FromRow)]
pub struct TradingStateRecord {
    pub symbol: String,
    pub initial_price: Option<String>,
    pub total_trades: Option<i64>,
    pub total_profit: Option<String>,
}

impl TryFrom<TradingStateRecord> for TradingState {
    type Error = RepositoryError;

    fn try_from(record: TradingStateRecord) -> Result<Self, Self::Error> {
        Ok(TradingState {
            symbol: record.symbol,
            initial_price: decimal_column("initial_price", record.initial_price)?,
            total_trades: record.total_trades,
            total_profit: decimal_column("total_profit", record.total_profit)?,
        })
    }
}

/// Manual command record in database
#[derive(Debug, Clone, FromRow)]
pub struct ManualCommandRecord {
    pub id: i64,
    pub symbol: String,
    pub action: String,
    pub amount: Option<String>,
    pub executed: Option<bool>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl TryFrom<ManualCommandRecord> for ManualCommand {
    type Error = RepositoryError;

    fn try_from(record: ManualCommandRecord) -> Result<Self, Self::Error> {
        Ok(ManualCommand {
            id: record.id,
            symbol: record.symbol,
            action: record.action,
            amount: decimal_column("amount", record.amount)?,
            executed: record.executed.unwrap_or(false),
            timestamp: record.timestamp,
        })
    }
}
