//! Reference & Target Engine
//!
//! Builds the per-coin badge shown on the dashboard: DCA price since the last
//! sale, whether the position is held, which reference price the %-distance is
//! measured from, and the sell / buy / rebuy targets.
//!
//! # Reference selection
//! The reference is chosen from a single source depending on whether the coin
//! is held (position worth at least 1 unit of quote currency):
//! - held: the DCA average, or nothing
//! - not held: the initial price from the trading state, or nothing
//!
//! There is deliberately no fallback from one source to the other; a held coin
//! without buys since its last sale has no reference.
//!
//! # Targets
//! - sell target: held and DCA known, `dca * (1 + sell_pct / 100)`
//! - buy target: not held, base is the initial price or else the latest price,
//!   `base * (1 + buy_pct / 100)`
//! - rebuy level: base is the DCA when held and the last sell price when not,
//!   `base * (1 - rebuy_discount / 100)`
//!
//! Missing inputs leave the corresponding fields empty; one coin lacking data
//! never fails the batch. An unreadable stored value is treated as missing for
//! that coin; only a store outage fails the batch.

use chrono::{DateTime, Duration, Utc};
use futures_util::future::try_join_all;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::MonitorConfig;
use crate::domain::entities::balance::BalanceBook;
use crate::domain::entities::trading_state::TradingState;
use crate::domain::errors::RepositoryError;
use crate::domain::repositories::market_repository::{MarketRepository, RepositoryResult};
use crate::domain::value_objects::decimal_math::{
    mark_down, mark_up, percent_change, round_currency, round_half_up,
};

/// Minimum position value, in quote currency, for a coin to count as held
pub const HELD_THRESHOLD: Decimal = Decimal::ONE;

/// Percentages that turn a reference price into targets
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetRules {
    pub sell_pct: Decimal,
    pub buy_pct: Decimal,
    pub rebuy_discount: Decimal,
    /// Fractional digits kept on target prices
    pub price_precision: u32,
}

/// Which price the %-distance is measured from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferenceKind {
    #[serde(rename = "DCA")]
    Dca,
    #[serde(rename = "INITIAL")]
    Initial,
}

/// Raw inputs for one coin, read from the repository in one pass
#[derive(Debug, Clone, PartialEq)]
pub struct CoinSnapshot {
    pub symbol: String,
    pub amount: Decimal,
    pub latest_price: Option<Decimal>,
    /// Price at the start of the change window
    pub window_price: Option<Decimal>,
    pub dca_average: Option<Decimal>,
    pub initial_price: Option<Decimal>,
    pub last_sell_price: Option<Decimal>,
    pub total_profit: Decimal,
}

/// Dashboard badge for one coin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinBadge {
    pub coin: String,
    pub amount: Decimal,
    pub price_usdc: Option<Decimal>,
    pub change_24h_pct: Option<Decimal>,
    pub dca_avg: Option<Decimal>,
    pub sell_pct: Decimal,
    pub sell_target: Option<Decimal>,
    pub buy_pct: Decimal,
    pub buy_target: Option<Decimal>,
    pub rebuy_discount: Decimal,
    pub rebuy_level: Option<Decimal>,
    pub position_usdc: Option<Decimal>,
    pub total_profit: Decimal,
    pub ref_kind: Option<ReferenceKind>,
    pub current_pct_from_ref: Option<Decimal>,
    pub eligible: bool,
}

/// Position value in quote currency, when a price is known
pub fn position_value(amount: Decimal, latest_price: Option<Decimal>) -> Option<Decimal> {
    latest_price.and_then(|price| amount.checked_mul(price))
}

pub fn is_held(position: Option<Decimal>) -> bool {
    matches!(position, Some(value) if value >= HELD_THRESHOLD)
}

/// Strict single-source reference rule
pub fn select_reference(
    held: bool,
    dca_average: Option<Decimal>,
    initial_price: Option<Decimal>,
) -> Option<(Decimal, ReferenceKind)> {
    if held {
        dca_average.map(|price| (price, ReferenceKind::Dca))
    } else {
        initial_price.map(|price| (price, ReferenceKind::Initial))
    }
}

/// Derive the badge for one coin. Pure: same snapshot, same badge.
pub fn derive_badge(snapshot: &CoinSnapshot, rules: &TargetRules) -> CoinBadge {
    let position = position_value(snapshot.amount, snapshot.latest_price);
    let held = is_held(position);
    let reference = select_reference(held, snapshot.dca_average, snapshot.initial_price);

    let round_target = |value: Decimal| round_half_up(value, rules.price_precision);

    let sell_target = if held {
        snapshot
            .dca_average
            .and_then(|dca| mark_up(dca, rules.sell_pct))
            .map(round_target)
    } else {
        None
    };

    let buy_target = if held {
        None
    } else {
        snapshot
            .initial_price
            .or(snapshot.latest_price)
            .and_then(|base| mark_up(base, rules.buy_pct))
            .map(round_target)
    };

    let rebuy_base = if held {
        snapshot.dca_average
    } else {
        snapshot.last_sell_price
    };
    let rebuy_level = rebuy_base
        .filter(|base| !base.is_zero())
        .and_then(|base| mark_down(base, rules.rebuy_discount))
        .map(round_target);

    CoinBadge {
        coin: snapshot.symbol.clone(),
        amount: snapshot.amount,
        price_usdc: snapshot.latest_price,
        change_24h_pct: percent_change(snapshot.latest_price, snapshot.window_price),
        dca_avg: snapshot.dca_average,
        sell_pct: rules.sell_pct,
        sell_target,
        buy_pct: rules.buy_pct,
        buy_target,
        rebuy_discount: rules.rebuy_discount,
        rebuy_level,
        position_usdc: position.map(round_currency),
        total_profit: snapshot.total_profit,
        ref_kind: reference.map(|(_, kind)| kind),
        current_pct_from_ref: percent_change(
            snapshot.latest_price,
            reference.map(|(price, _)| price),
        ),
        eligible: held,
    }
}

/// Treat an undecodable per-coin value as absent, keep outages fatal
fn absent_if_malformed<T>(
    symbol: &str,
    field: &str,
    result: RepositoryResult<Option<T>>,
) -> RepositoryResult<Option<T>> {
    match result {
        Err(RepositoryError::Decode { column, value }) => {
            warn!(
                "Unreadable {} for {} ({} = {:?}), leaving it empty",
                field, symbol, column, value
            );
            Ok(None)
        }
        other => other,
    }
}

/// Computes badges for every enabled coin against a repository snapshot
pub struct ReferenceEngine {
    repository: Arc<dyn MarketRepository>,
    config: Arc<MonitorConfig>,
}

impl ReferenceEngine {
    pub fn new(repository: Arc<dyn MarketRepository>, config: Arc<MonitorConfig>) -> Self {
        Self { repository, config }
    }

    /// Badges for all enabled coins, in configuration order.
    ///
    /// `now` is captured once by the caller; the change window starts at
    /// `now - lookback`.
    pub async fn badges(
        &self,
        now: DateTime<Utc>,
        lookback: Duration,
    ) -> RepositoryResult<Vec<CoinBadge>> {
        let (balances, states) = tokio::try_join!(
            self.repository.balances(),
            self.repository.trading_states(None),
        )?;
        let book = BalanceBook::from_balances(&balances);
        let states: HashMap<String, TradingState> = states
            .into_iter()
            .map(|state| (state.symbol.to_uppercase(), state))
            .collect();
        let since = now - lookback;

        let symbols = self.config.enabled_symbols();
        let snapshots = try_join_all(
            symbols
                .iter()
                .map(|symbol| self.snapshot(symbol, &book, states.get(symbol), since)),
        )
        .await?;

        let badges = snapshots
            .iter()
            .map(|snapshot| derive_badge(snapshot, &self.config.target_rules(&snapshot.symbol)))
            .collect::<Vec<_>>();

        debug!("Computed {} coin badges", badges.len());
        Ok(badges)
    }

    async fn snapshot(
        &self,
        symbol: &str,
        book: &BalanceBook,
        state: Option<&TradingState>,
        since: DateTime<Utc>,
    ) -> RepositoryResult<CoinSnapshot> {
        let (latest_price, window_price, dca_average, last_sell_price) = tokio::join!(
            self.repository.latest_price(symbol),
            self.repository.price_at_or_after(symbol, since),
            self.repository.weighted_average_buy_price(symbol),
            self.repository.last_sell_price(symbol),
        );
        let latest_price = absent_if_malformed(symbol, "latest price", latest_price)?;
        let window_price = absent_if_malformed(symbol, "window price", window_price)?;
        let dca_average = absent_if_malformed(symbol, "DCA average", dca_average)?;
        let last_sell_price = absent_if_malformed(symbol, "last sell price", last_sell_price)?;

        if latest_price.is_none() {
            warn!("No price history for {}, badge will be partial", symbol);
        }

        Ok(CoinSnapshot {
            symbol: symbol.to_string(),
            amount: book.amount_of(symbol),
            latest_price,
            window_price,
            dca_average,
            initial_price: state.and_then(|s| s.initial_price),
            last_sell_price,
            total_profit: state
                .and_then(|s| s.total_profit)
                .unwrap_or(Decimal::ZERO),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::repository::SqliteMarketRepository;
    use crate::persistence::test_support::*;

    fn rules() -> TargetRules {
        TargetRules {
            sell_pct: d("5"),
            buy_pct: d("-3"),
            rebuy_discount: d("2"),
            price_precision: 2,
        }
    }

    fn snapshot(symbol: &str) -> CoinSnapshot {
        CoinSnapshot {
            symbol: symbol.to_string(),
            amount: Decimal::ZERO,
            latest_price: None,
            window_price: None,
            dca_average: None,
            initial_price: None,
            last_sell_price: None,
            total_profit: Decimal::ZERO,
        }
    }

    #[test]
    fn test_held_threshold() {
        assert!(is_held(Some(d("1"))));
        assert!(is_held(Some(d("300"))));
        assert!(!is_held(Some(d("0.99"))));
        assert!(!is_held(None));
    }

    #[test]
    fn test_reference_is_strict() {
        assert_eq!(
            select_reference(true, Some(d("100")), Some(d("90"))),
            Some((d("100"), ReferenceKind::Dca))
        );
        // Held without DCA does not fall back to the initial price
        assert_eq!(select_reference(true, None, Some(d("90"))), None);
        assert_eq!(
            select_reference(false, Some(d("100")), Some(d("90"))),
            Some((d("90"), ReferenceKind::Initial))
        );
        // Unheld without initial price does not fall back to the DCA
        assert_eq!(select_reference(false, Some(d("100")), None), None);
    }

    #[test]
    fn test_held_coin_with_dca() {
        let snap = CoinSnapshot {
            amount: d("0.01"),
            latest_price: Some(d("30000")),
            window_price: Some(d("28000")),
            dca_average: Some(d("27500")),
            initial_price: Some(d("20000")),
            last_sell_price: Some(d("31000")),
            total_profit: d("42.5"),
            ..snapshot("BTC")
        };

        let badge = derive_badge(&snap, &rules());

        assert!(badge.eligible);
        assert_eq!(badge.position_usdc, Some(d("300.00")));
        assert_eq!(badge.ref_kind, Some(ReferenceKind::Dca));
        assert_eq!(badge.sell_target, Some(d("28875")));
        assert_eq!(badge.buy_target, None);
        // Held: rebuy level comes from the DCA, not the last sale
        assert_eq!(badge.rebuy_level, Some(d("26950")));
        // 30000 / 27500 = 1.0909...
        assert_eq!(badge.current_pct_from_ref, Some(d("9.09")));
        // 30000 / 28000 = 1.0714...
        assert_eq!(badge.change_24h_pct, Some(d("7.14")));
        assert_eq!(badge.total_profit, d("42.5"));
    }

    #[test]
    fn test_sell_target_matches_formula_with_rounding() {
        let snap = CoinSnapshot {
            amount: d("3"),
            latest_price: Some(d("1.5")),
            dca_average: Some(d("1.23456789")),
            ..snapshot("XRP")
        };
        let badge = derive_badge(&snap, &rules());

        let exact = d("1.23456789") * (Decimal::ONE + d("5") / Decimal::ONE_HUNDRED);
        assert_eq!(badge.sell_target, Some(round_half_up(exact, 2)));
        assert_eq!(badge.sell_target, Some(d("1.30")));
    }

    #[test]
    fn test_price_precision_applies_to_targets() {
        let snap = CoinSnapshot {
            amount: d("100000"),
            latest_price: Some(d("0.00012345")),
            dca_average: Some(d("0.0001")),
            ..snapshot("SHIB")
        };
        let precise = TargetRules {
            price_precision: 8,
            ..rules()
        };
        let badge = derive_badge(&snap, &precise);
        assert_eq!(badge.sell_target, Some(d("0.000105")));
        assert_eq!(badge.rebuy_level, Some(d("0.000098")));
    }

    #[test]
    fn test_held_without_dca_has_no_reference_or_sell_target() {
        let snap = CoinSnapshot {
            amount: d("2"),
            latest_price: Some(d("50")),
            initial_price: Some(d("40")),
            last_sell_price: Some(d("55")),
            ..snapshot("SOL")
        };
        let badge = derive_badge(&snap, &rules());

        assert!(badge.eligible);
        assert_eq!(badge.ref_kind, None);
        assert_eq!(badge.current_pct_from_ref, None);
        assert_eq!(badge.sell_target, None);
        assert_eq!(badge.buy_target, None);
        assert_eq!(badge.rebuy_level, None);
    }

    #[test]
    fn test_unheld_coin_uses_initial_price() {
        let snap = CoinSnapshot {
            amount: d("0.0001"),
            latest_price: Some(d("2000")),
            dca_average: Some(d("1800")),
            initial_price: Some(d("2200")),
            last_sell_price: Some(d("2100")),
            ..snapshot("ETH")
        };
        let badge = derive_badge(&snap, &rules());

        assert!(!badge.eligible);
        assert_eq!(badge.position_usdc, Some(d("0.20")));
        assert_eq!(badge.ref_kind, Some(ReferenceKind::Initial));
        assert_eq!(badge.sell_target, None);
        assert_eq!(badge.buy_target, Some(d("2134")));
        assert_eq!(badge.rebuy_level, Some(d("2058")));
        // 2000 / 2200 = 0.9090...
        assert_eq!(badge.current_pct_from_ref, Some(d("-9.09")));
    }

    #[test]
    fn test_unheld_without_state_falls_back_to_latest_for_buy_target() {
        let snap = CoinSnapshot {
            latest_price: Some(d("2000")),
            ..snapshot("ETH")
        };
        let badge = derive_badge(&snap, &rules());

        assert!(!badge.eligible);
        assert_eq!(badge.ref_kind, None);
        assert_eq!(badge.sell_target, None);
        assert_eq!(badge.buy_target, Some(d("1940")));
        assert_eq!(badge.rebuy_level, None);
    }

    #[test]
    fn test_unheld_never_has_sell_target() {
        for dca in [None, Some(d("10"))] {
            for price in [None, Some(d("0.5"))] {
                let snap = CoinSnapshot {
                    amount: d("1"),
                    latest_price: price,
                    dca_average: dca,
                    ..snapshot("ADA")
                };
                let badge = derive_badge(&snap, &rules());
                assert!(!badge.eligible);
                assert_eq!(badge.sell_target, None);
                assert_eq!(badge.ref_kind, None);
            }
        }
    }

    #[test]
    fn test_no_data_at_all_gives_empty_badge() {
        let badge = derive_badge(&snapshot("DOT"), &rules());
        assert!(!badge.eligible);
        assert_eq!(badge.price_usdc, None);
        assert_eq!(badge.position_usdc, None);
        assert_eq!(badge.change_24h_pct, None);
        assert_eq!(badge.buy_target, None);
        assert_eq!(badge.rebuy_level, None);
        assert_eq!(badge.total_profit, Decimal::ZERO);
    }

    #[test]
    fn test_zero_references_are_guarded() {
        let snap = CoinSnapshot {
            latest_price: Some(d("10")),
            window_price: Some(Decimal::ZERO),
            initial_price: Some(Decimal::ZERO),
            last_sell_price: Some(Decimal::ZERO),
            ..snapshot("LINK")
        };
        let badge = derive_badge(&snap, &rules());
        assert_eq!(badge.change_24h_pct, None);
        assert_eq!(badge.ref_kind, Some(ReferenceKind::Initial));
        assert_eq!(badge.current_pct_from_ref, None);
        assert_eq!(badge.rebuy_level, None);
    }

    #[test]
    fn test_badge_serialization() {
        let snap = CoinSnapshot {
            amount: d("1"),
            latest_price: Some(d("100")),
            dca_average: Some(d("100")),
            ..snapshot("BTC")
        };
        let json = serde_json::to_value(derive_badge(&snap, &rules())).unwrap();
        assert_eq!(json["ref_kind"], "DCA");
        assert_eq!(json["position_usdc"], "100.00");
        assert_eq!(json["eligible"], true);
        assert!(json["buy_target"].is_null());
    }

    const ENGINE_CONFIG: &str = r#"{
        "coins": {
            "BTC": { "sell_percentage": 5, "buy_percentage": -3, "rebuy_discount": 2 },
            "ETH": {},
            "USDC": {}
        }
    }"#;

    #[tokio::test]
    async fn test_engine_reads_repository() {
        let pool = memory_pool().await;
        let now = Utc::now();
        seed_balance(&pool, "USDC", Some("500")).await;
        seed_balance(&pool, "BTC", Some("0.01")).await;
        seed_price(&pool, "BTC", now - Duration::hours(30), "25000").await;
        seed_price(&pool, "BTC", now - Duration::hours(23), "28000").await;
        seed_price(&pool, "BTC", now - Duration::minutes(1), "30000").await;
        seed_price(&pool, "ETH", now - Duration::minutes(1), "2000").await;
        seed_trade(&pool, "BTC", "BUY", "0.01", "27500", now - Duration::days(1)).await;
        seed_state(&pool, "BTC", Some("20000"), 3, Some("15")).await;

        let config = Arc::new(MonitorConfig::from_json_str(ENGINE_CONFIG).unwrap());
        let repository = Arc::new(SqliteMarketRepository::new(pool));
        let engine = ReferenceEngine::new(repository, config);

        let badges = engine.badges(now, Duration::hours(24)).await.unwrap();
        assert_eq!(badges.len(), 2);

        let btc = &badges[0];
        assert_eq!(btc.coin, "BTC");
        assert!(btc.eligible);
        assert_eq!(btc.position_usdc, Some(d("300.00")));
        assert_eq!(btc.dca_avg, Some(d("27500")));
        assert_eq!(btc.ref_kind, Some(ReferenceKind::Dca));
        assert_eq!(btc.sell_target, Some(d("28875")));
        assert_eq!(btc.total_profit, d("15"));
        // Window opens on the first tick inside the last 24h
        assert_eq!(btc.change_24h_pct, Some(d("7.14")));

        let eth = &badges[1];
        assert_eq!(eth.coin, "ETH");
        assert!(!eth.eligible);
        assert_eq!(eth.amount, Decimal::ZERO);
        assert_eq!(eth.ref_kind, None);
        // Account default buy percentage is 10
        assert_eq!(eth.buy_target, Some(d("2200")));
        assert_eq!(eth.total_profit, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_malformed_row_only_blanks_its_coin() {
        let pool = memory_pool().await;
        let now = Utc::now();
        seed_balance(&pool, "BTC", Some("0.01")).await;
        seed_price(&pool, "BTC", now - Duration::minutes(1), "30000").await;
        seed_price(&pool, "ETH", now - Duration::minutes(1), "n/a").await;
        seed_trade(&pool, "BTC", "BUY", "0.01", "27500", now - Duration::days(1)).await;
        seed_trade(&pool, "ETH", "BUY", "1", "garbage", now - Duration::days(1)).await;

        let config = Arc::new(MonitorConfig::from_json_str(ENGINE_CONFIG).unwrap());
        let engine = ReferenceEngine::new(Arc::new(SqliteMarketRepository::new(pool)), config);

        let badges = engine.badges(now, Duration::hours(24)).await.unwrap();
        assert_eq!(badges.len(), 2);

        let btc = &badges[0];
        assert_eq!(btc.price_usdc, Some(d("30000")));
        assert_eq!(btc.dca_avg, Some(d("27500")));
        assert_eq!(btc.sell_target, Some(d("28875")));

        let eth = &badges[1];
        assert_eq!(eth.coin, "ETH");
        assert_eq!(eth.price_usdc, None);
        assert_eq!(eth.change_24h_pct, None);
        assert_eq!(eth.dca_avg, None);
        assert_eq!(eth.buy_target, None);
    }

    #[test]
    fn test_absent_if_malformed_keeps_outages() {
        let decode: RepositoryResult<Option<Decimal>> = Err(RepositoryError::Decode {
            column: "price".to_string(),
            value: "n/a".to_string(),
        });
        assert_eq!(absent_if_malformed("ETH", "latest price", decode).unwrap(), None);

        let outage: RepositoryResult<Option<Decimal>> =
            Err(RepositoryError::Unavailable("pool closed".to_string()));
        assert!(matches!(
            absent_if_malformed("ETH", "latest price", outage),
            Err(RepositoryError::Unavailable(_))
        ));

        let ok: RepositoryResult<Option<Decimal>> = Ok(Some(d("1")));
        assert_eq!(absent_if_malformed("ETH", "latest price", ok).unwrap(), Some(d("1")));
    }

    #[tokio::test]
    async fn test_engine_fails_when_repository_is_down() {
        let pool = memory_pool().await;
        let config = Arc::new(MonitorConfig::from_json_str(ENGINE_CONFIG).unwrap());
        let engine = ReferenceEngine::new(Arc::new(SqliteMarketRepository::new(pool.clone())), config);
        pool.close().await;

        assert!(engine.badges(Utc::now(), Duration::hours(24)).await.is_err());
    }
}
