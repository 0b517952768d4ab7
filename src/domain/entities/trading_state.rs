use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Per-symbol bookkeeping maintained by the trading engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingState {
    pub symbol: String,
    /// Price of the first acquisition; the reference for unheld coins
    pub initial_price: Option<Decimal>,
    pub total_trades: Option<i64>,
    pub total_profit: Option<Decimal>,
}
