use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::config::ConfigInfo;
use crate::domain::entities::balance::Balance;
use crate::domain::entities::manual_command::{CommandOutcome, ManualCommand};
use crate::domain::entities::price_point::PriceSeries;
use crate::domain::entities::trade::Trade;
use crate::domain::entities::trading_state::TradingState;
use crate::domain::errors::ApiError;
use crate::domain::services::freshness_monitor::BotStatus;
use crate::domain::services::portfolio_aggregator::PortfolioSummary;
use crate::domain::services::reference_engine::CoinBadge;

/// Query parameters for the badges endpoint
#[derive(Debug, Deserialize)]
pub struct BadgesQuery {
    /// Change window in hours (default 24)
    pub lookback_hours: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BadgesResponse {
    pub coins: Vec<CoinBadge>,
}

/// Query parameters for the trades endpoint
#[derive(Debug, Deserialize)]
pub struct TradesQuery {
    /// Number of trades (default 50)
    pub limit: Option<i64>,
    pub symbol: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PriceHistoryQuery {
    pub symbol: String,
    /// Trailing window in hours (default 24)
    pub hours: Option<i64>,
}

/// Optional symbol filter
#[derive(Debug, Deserialize)]
pub struct SymbolQuery {
    pub symbol: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ManualCommandRequest {
    pub symbol: String,
    pub action: String,
    #[serde(default)]
    pub amount: Option<Decimal>,
}

/// `{ok, id}` for BUY/SELL, `{ok, cancelled}` for CANCEL
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ManualCommandResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled: Option<u64>,
}

impl From<CommandOutcome> for ManualCommandResponse {
    fn from(outcome: CommandOutcome) -> Self {
        match outcome {
            CommandOutcome::Inserted { id } => Self {
                ok: true,
                id: Some(id),
                cancelled: None,
            },
            CommandOutcome::Cancelled { affected } => Self {
                ok: true,
                id: None,
                cancelled: Some(affected),
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
}

pub async fn coin_badges(
    State(state): State<AppState>,
    Query(params): Query<BadgesQuery>,
) -> Result<Json<BadgesResponse>, ApiError> {
    let coins = state.service.coin_badges(params.lookback_hours).await?;
    Ok(Json(BadgesResponse { coins }))
}

pub async fn portfolio_summary(
    State(state): State<AppState>,
) -> Result<Json<PortfolioSummary>, ApiError> {
    Ok(Json(state.service.portfolio_summary().await?))
}

pub async fn status(State(state): State<AppState>) -> Result<Json<BotStatus>, ApiError> {
    Ok(Json(state.service.status().await?))
}

pub async fn balances(State(state): State<AppState>) -> Result<Json<Vec<Balance>>, ApiError> {
    Ok(Json(state.service.balances().await?))
}

pub async fn trades(
    State(state): State<AppState>,
    Query(params): Query<TradesQuery>,
) -> Result<Json<Vec<Trade>>, ApiError> {
    let trades = state
        .service
        .trades(params.limit, params.symbol.as_deref())
        .await?;
    Ok(Json(trades))
}

pub async fn price_history(
    State(state): State<AppState>,
    Query(params): Query<PriceHistoryQuery>,
) -> Result<Json<PriceSeries>, ApiError> {
    let series = state
        .service
        .price_history(&params.symbol, params.hours)
        .await?;
    Ok(Json(series))
}

pub async fn trading_state(
    State(state): State<AppState>,
    Query(params): Query<SymbolQuery>,
) -> Result<Json<Vec<TradingState>>, ApiError> {
    let states = state
        .service
        .trading_state(params.symbol.as_deref())
        .await?;
    Ok(Json(states))
}

pub async fn submit_manual_command(
    State(state): State<AppState>,
    Json(request): Json<ManualCommandRequest>,
) -> Result<Json<ManualCommandResponse>, ApiError> {
    let outcome = state
        .service
        .submit_command(&request.symbol, &request.action, request.amount)
        .await?;
    Ok(Json(outcome.into()))
}

pub async fn list_manual_commands(
    State(state): State<AppState>,
    Query(params): Query<SymbolQuery>,
) -> Result<Json<Vec<ManualCommand>>, ApiError> {
    let commands = state
        .service
        .manual_commands(params.symbol.as_deref())
        .await?;
    Ok(Json(commands))
}

pub async fn config_info(State(state): State<AppState>) -> Json<ConfigInfo> {
    Json(state.service.config_info())
}

/// Health check endpoint
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    if state.service.database_healthy().await {
        (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok".to_string(),
                database: "up".to_string(),
            }),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "degraded".to_string(),
                database: "down".to_string(),
            }),
        )
    }
}
