#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower::ServiceExt;

use botwatch::application::actors::live_feed::LiveFeed;
use botwatch::application::handlers::{router, AppState};
use botwatch::application::services::monitor_service::MonitorService;
use botwatch::config::MonitorConfig;
use botwatch::persistence::repository::SqliteMarketRepository;
use botwatch::persistence::{init_database, DatabaseConfig, DbPool};

pub const CONFIG: &str = r#"{
    "name": "e2e-bot",
    "buy_percentage": -3,
    "sell_percentage": 5,
    "coins": {
        "BTC": { "rebuy_discount": 2 },
        "ETH": {},
        "USDC": {},
        "DOGE": { "enabled": false }
    }
}"#;

pub struct TestApp {
    pub pool: DbPool,
    pub service: Arc<MonitorService>,
    pub feed: Arc<LiveFeed>,
    pub router: Router,
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(CONFIG).await
}

pub async fn spawn_app_with(raw_config: &str) -> TestApp {
    let config = Arc::new(MonitorConfig::from_json_str(raw_config).unwrap());
    let pool = init_database(&DatabaseConfig::in_memory()).await.unwrap();
    let repository = Arc::new(SqliteMarketRepository::new(pool.clone()));
    let service = Arc::new(MonitorService::new(repository, config));
    let feed = Arc::new(LiveFeed::new());
    let router = router(AppState::new(service.clone(), feed.clone()));

    TestApp {
        pool,
        service,
        feed,
        router,
    }
}

impl TestApp {
    pub async fn get(&self, uri: &str) -> (StatusCode, serde_json::Value) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        self.send(request).await
    }

    pub async fn post_json(&self, uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    pub async fn seed_price(&self, symbol: &str, timestamp: DateTime<Utc>, price: &str) {
        sqlx::query("INSERT INTO price_history (symbol, timestamp, price) VALUES (?1, ?2, ?3)")
            .bind(symbol)
            .bind(timestamp)
            .bind(price)
            .execute(&self.pool)
            .await
            .unwrap();
    }

    pub async fn seed_trade(&self, symbol: &str, side: &str, amount: &str, price: &str, timestamp: DateTime<Utc>) {
        sqlx::query(
            "INSERT INTO trades (symbol, side, amount, price, timestamp) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(symbol)
        .bind(side)
        .bind(amount)
        .bind(price)
        .bind(timestamp)
        .execute(&self.pool)
        .await
        .unwrap();
    }

    pub async fn seed_balance(&self, currency: &str, amount: &str) {
        sqlx::query("INSERT INTO balances (currency, available_balance) VALUES (?1, ?2)")
            .bind(currency)
            .bind(amount)
            .execute(&self.pool)
            .await
            .unwrap();
    }

    pub async fn seed_state(&self, symbol: &str, initial_price: Option<&str>, total_profit: Option<&str>) {
        sqlx::query(
            "INSERT INTO trading_state (symbol, initial_price, total_trades, total_profit) VALUES (?1, ?2, 0, ?3)",
        )
        .bind(symbol)
        .bind(initial_price)
        .bind(total_profit)
        .execute(&self.pool)
        .await
        .unwrap();
    }

    pub async fn seed_command(&self, symbol: &str, action: &str, executed: bool) {
        sqlx::query(
            "INSERT INTO manual_commands (symbol, action, amount, executed, timestamp) VALUES (?1, ?2, NULL, ?3, ?4)",
        )
        .bind(symbol)
        .bind(action)
        .bind(executed)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .unwrap();
    }

    pub async fn command_rows(&self, symbol: &str) -> Vec<(i64, String, bool)> {
        sqlx::query_as::<_, (i64, String, bool)>(
            "SELECT id, action, executed FROM manual_commands WHERE symbol = ?1 ORDER BY id",
        )
        .bind(symbol)
        .fetch_all(&self.pool)
        .await
        .unwrap()
    }
}
