//! Trade entity - append-only fill ledger written by the trading engine

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Side of a fill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeSide::Buy => "BUY",
            TradeSide::Sell => "SELL",
        }
    }

    /// Parse a stored side. Anything other than BUY/SELL is `None` and is
    /// ignored by aggregations.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "BUY" => Some(TradeSide::Buy),
            "SELL" => Some(TradeSide::Sell),
            _ => None,
        }
    }
}

/// A single executed trade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: i64,
    pub symbol: String,
    /// Raw side as stored; see [`Trade::side_kind`]
    pub side: String,
    pub amount: Option<Decimal>,
    pub price: Option<Decimal>,
    pub timestamp: DateTime<Utc>,
}

impl Trade {
    pub fn side_kind(&self) -> Option<TradeSide> {
        TradeSide::parse(&self.side)
    }
}
