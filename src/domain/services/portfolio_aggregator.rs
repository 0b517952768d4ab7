//! Portfolio Aggregator
//!
//! Values every enabled coin at its latest price and adds the free quote
//! balance. A coin without a price contributes nothing to the totals but still
//! shows up in the breakdown.

use futures_util::future::try_join_all;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::config::MonitorConfig;
use crate::domain::entities::balance::BalanceBook;
use crate::domain::repositories::market_repository::{MarketRepository, RepositoryResult};
use crate::domain::value_objects::decimal_math::round_currency;

/// One coin in the portfolio breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingLine {
    pub coin: String,
    pub amount: Decimal,
    pub price_usdc: Option<Decimal>,
    pub value_usdc: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub usdc_available: Decimal,
    pub holdings_value_usdc: Decimal,
    pub total_usdc: Decimal,
    pub breakdown: Vec<HoldingLine>,
}

/// Build the summary from `(symbol, amount, latest price)` rows.
///
/// Totals are summed exactly and rounded once at the end.
pub fn summarize<I>(quote_balance: Decimal, holdings: I) -> PortfolioSummary
where
    I: IntoIterator<Item = (String, Decimal, Option<Decimal>)>,
{
    let mut holdings_value = Decimal::ZERO;
    let breakdown = holdings
        .into_iter()
        .map(|(coin, amount, price)| {
            let value = price.and_then(|p| amount.checked_mul(p));
            if let Some(value) = value {
                holdings_value += value;
            }
            HoldingLine {
                coin,
                amount,
                price_usdc: price,
                value_usdc: value.map(round_currency),
            }
        })
        .collect();

    PortfolioSummary {
        usdc_available: round_currency(quote_balance),
        holdings_value_usdc: round_currency(holdings_value),
        total_usdc: round_currency(quote_balance + holdings_value),
        breakdown,
    }
}

pub struct PortfolioAggregator {
    repository: Arc<dyn MarketRepository>,
    config: Arc<MonitorConfig>,
}

impl PortfolioAggregator {
    pub fn new(repository: Arc<dyn MarketRepository>, config: Arc<MonitorConfig>) -> Self {
        Self { repository, config }
    }

    pub async fn summary(&self) -> RepositoryResult<PortfolioSummary> {
        let book = BalanceBook::from_balances(&self.repository.balances().await?);
        let symbols = self.config.enabled_symbols();

        let prices = try_join_all(
            symbols
                .iter()
                .map(|symbol| self.repository.latest_price(symbol)),
        )
        .await?;

        let holdings = symbols
            .into_iter()
            .zip(prices)
            .map(|(symbol, price)| {
                let amount = book.amount_of(&symbol);
                (symbol, amount, price)
            })
            .collect::<Vec<_>>();

        let summary = summarize(book.amount_of(&self.config.quote_currency), holdings);
        debug!(
            "Portfolio total {} across {} coins",
            summary.total_usdc,
            summary.breakdown.len()
        );
        Ok(summary)
    }
}
