//! Seeding helpers for tests. They write rows the way the trading engine does.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;

use super::{init_database, DatabaseConfig, DbPool};

pub fn d(raw: &str) -> Decimal {
    Decimal::from_str(raw).unwrap()
}

pub async fn memory_pool() -> DbPool {
    init_database(&DatabaseConfig::in_memory()).await.unwrap()
}

pub async fn seed_price(pool: &DbPool, symbol: &str, timestamp: DateTime<Utc>, price: &str) {
    sqlx::query("INSERT INTO price_history (symbol, timestamp, price) VALUES (?1, ?2, ?3)")
        .bind(symbol)
        .bind(timestamp)
        .bind(price)
        .execute(pool)
        .await
        .unwrap();
}

pub async fn seed_trade(
    pool: &DbPool,
    symbol: &str,
    side: &str,
    amount: &str,
    price: &str,
    timestamp: DateTime<Utc>,
) {
    sqlx::query(
        "INSERT INTO trades (symbol, side, amount, price, timestamp) VALUES (?1, ?2, ?3, ?4, ?5)",
    )
    .bind(symbol)
    .bind(side)
    .bind(amount)
    .bind(price)
    .bind(timestamp)
    .execute(pool)
    .await
    .unwrap();
}

pub async fn seed_balance(pool: &DbPool, currency: &str, amount: Option<&str>) {
    sqlx::query("INSERT INTO balances (currency, available_balance) VALUES (?1, ?2)")
        .bind(currency)
        .bind(amount)
        .execute(pool)
        .await
        .unwrap();
}

pub async fn seed_state(
    pool: &DbPool,
    symbol: &str,
    initial_price: Option<&str>,
    total_trades: i64,
    total_profit: Option<&str>,
) {
    sqlx::query(
        "INSERT INTO trading_state (symbol, initial_price, total_trades, total_profit) \
         VALUES (?1, ?2, ?3, ?4)",
    )
    .bind(symbol)
    .bind(initial_price)
    .bind(total_trades)
    .bind(total_profit)
    .execute(pool)
    .await
    .unwrap();
}
