//! Balance entity - one row per currency the trading engine has seen

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Available balance for a single currency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub currency: String,
    /// `None` when the engine has written the row but no amount yet
    pub available_balance: Option<Decimal>,
}

impl Balance {
    /// Available amount, treating a missing value as zero
    pub fn amount(&self) -> Decimal {
        self.available_balance.unwrap_or(Decimal::ZERO)
    }
}

/// Upper-cased currency -> amount lookup built from a balance snapshot
#[derive(Debug, Clone, Default)]
pub struct BalanceBook {
    amounts: HashMap<String, Decimal>,
}

impl BalanceBook {
    pub fn from_balances(balances: &[Balance]) -> Self {
        let amounts = balances
            .iter()
            .map(|b| (b.currency.to_uppercase(), b.amount()))
            .collect();
        Self { amounts }
    }

    /// Amount held for `currency`, zero when the currency was never seen
    pub fn amount_of(&self, currency: &str) -> Decimal {
        self.amounts
            .get(&currency.to_uppercase())
            .copied()
            .unwrap_or(Decimal::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_missing_amount_reads_as_zero() {
        let balance = Balance {
            currency: "BTC".to_string(),
            available_balance: None,
        };
        assert_eq!(balance.amount(), Decimal::ZERO);
    }

    #[test]
    fn test_book_lookup_is_case_insensitive() {
        let book = BalanceBook::from_balances(&[
            Balance {
                currency: "usdc".to_string(),
                available_balance: Some(Decimal::from(500)),
            },
            Balance {
                currency: "BTC".to_string(),
                available_balance: Some(Decimal::from_str("0.01").unwrap()),
            },
        ]);

        assert_eq!(book.amount_of("USDC"), Decimal::from(500));
        assert_eq!(book.amount_of("btc"), Decimal::from_str("0.01").unwrap());
        assert_eq!(book.amount_of("ETH"), Decimal::ZERO);
    }
}
