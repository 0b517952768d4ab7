//! Persistence Layer
//!
//! SQLite access for the tables the trading engine writes. The monitor only
//! reads them, except for `manual_commands`.
//!
//! # Database Schema
//!
//! ## balances
//! - currency: TEXT primary key
//! - available_balance: decimal as TEXT, nullable
//!
//! ## trades
//! - id: INTEGER, monotonic
//! - symbol: e.g. "BTC"
//! - side: "BUY" or "SELL"
//! - amount / price: decimal as TEXT
//! - timestamp: UTC timestamp
//!
//! ## price_history
//! - (symbol, timestamp): primary key
//! - price: decimal as TEXT
//!
//! ## trading_state
//! - symbol: TEXT primary key
//! - initial_price / total_profit: decimal as TEXT
//! - total_trades: INTEGER
//!
//! ## manual_commands
//! - id: INTEGER
//! - symbol, action ("BUY" / "SELL" / "CANCEL"), amount
//! - executed: BOOLEAN
//! - timestamp: UTC timestamp
//!
//! Decimals are stored as TEXT so no binary float ever touches a price.
//! In production the engine owns this schema; `init_database` only creates
//! missing tables so local runs and tests get the same layout.

pub mod models;
pub mod repository;

#[cfg(test)]
pub(crate) mod test_support;

use serde::Deserialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::ConnectOptions;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

/// Database connection pool
pub type DbPool = SqlitePool;

/// Database initialization error
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Database connection error: {0}")]
    ConnectionError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrationError(String),
}

/// Database configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database URL (e.g., "sqlite://data/botwatch.db")
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Log every statement at debug level
    pub log_queries: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://data/botwatch.db".to_string(),
            max_connections: 5,
            log_queries: cfg!(debug_assertions),
        }
    }
}

impl DatabaseConfig {
    /// Private in-memory database, mostly for tests
    pub fn in_memory() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            log_queries: false,
        }
    }

    fn is_in_memory(&self) -> bool {
        self.url.contains(":memory:")
    }
}

/// Initialize the database connection pool
///
/// # Errors
/// Returns error if database connection fails or the schema cannot be created
pub async fn init_database(config: &DatabaseConfig) -> Result<DbPool, DatabaseError> {
    info!("Initializing database: {}", config.url);

    // Ensure data directory exists
    if let Some(db_path) = config.url.strip_prefix("sqlite://") {
        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    DatabaseError::ConnectionError(sqlx::Error::Configuration(Box::new(e)))
                })?;
            }
        }
    }

    let options = SqliteConnectOptions::from_str(&config.url)?.create_if_missing(true);
    let options = if config.log_queries {
        options.log_statements(tracing::log::LevelFilter::Debug)
    } else {
        options.disable_statement_logging()
    };

    // Every connection to ":memory:" opens its own empty database, so the
    // pool must hold exactly one connection for its whole life.
    let pool_options = if config.is_in_memory() {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(config.max_connections.max(1))
    };

    let pool = pool_options.connect_with(options).await?;

    run_migrations(&pool).await?;

    info!("✓ Database initialized successfully");

    Ok(pool)
}

const SCHEMA: &[(&str, &str)] = &[
    (
        "balances",
        r#"
        CREATE TABLE IF NOT EXISTS balances (
            currency TEXT PRIMARY KEY,
            available_balance TEXT
        )
        "#,
    ),
    (
        "trades",
        r#"
        CREATE TABLE IF NOT EXISTS trades (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            symbol TEXT NOT NULL,
            side TEXT NOT NULL,
            amount TEXT,
            price TEXT,
            timestamp DATETIME NOT NULL
        )
        "#,
    ),
    (
        "price_history",
        r#"
        CREATE TABLE IF NOT EXISTS price_history (
            symbol TEXT NOT NULL,
            timestamp DATETIME NOT NULL,
            price TEXT NOT NULL,
            PRIMARY KEY (symbol, timestamp)
        )
        "#,
    ),
    (
        "trading_state",
        r#"
        CREATE TABLE IF NOT EXISTS trading_state (
            symbol TEXT PRIMARY KEY,
            initial_price TEXT,
            total_trades INTEGER,
            total_profit TEXT
        )
        "#,
    ),
    (
        "manual_commands",
        r#"
        CREATE TABLE IF NOT EXISTS manual_commands (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            symbol TEXT NOT NULL,
            action TEXT NOT NULL CHECK(action IN ('BUY', 'SELL', 'CANCEL')),
            amount TEXT,
            executed BOOLEAN DEFAULT 0,
            timestamp DATETIME
        )
        "#,
    ),
];

const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_trades_symbol_time ON trades(symbol, timestamp)",
    "CREATE INDEX IF NOT EXISTS idx_price_history_time ON price_history(timestamp)",
    "CREATE INDEX IF NOT EXISTS idx_manual_commands_symbol ON manual_commands(symbol, executed)",
];

/// Create any missing table and index
async fn run_migrations(pool: &DbPool) -> Result<(), DatabaseError> {
    info!("Running database migrations...");

    for (table, ddl) in SCHEMA {
        sqlx::query(ddl).execute(pool).await.map_err(|e| {
            DatabaseError::MigrationError(format!("Failed to create {} table: {}", table, e))
        })?;
    }

    for ddl in INDEXES {
        sqlx::query(ddl)
            .execute(pool)
            .await
            .map_err(|e| DatabaseError::MigrationError(format!("Failed to create index: {}", e)))?;
    }

    info!("✓ Database migrations completed successfully");

    Ok(())
}
