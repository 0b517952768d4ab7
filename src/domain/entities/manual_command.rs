//! Manual command entity - operator intents queued for the trading engine
//!
//! The monitor never executes commands itself. It appends BUY/SELL intents and,
//! on CANCEL, flags every pending command for the symbol as executed so the
//! engine skips them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::errors::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CommandAction {
    Buy,
    Sell,
    Cancel,
}

impl CommandAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandAction::Buy => "BUY",
            CommandAction::Sell => "SELL",
            CommandAction::Cancel => "CANCEL",
        }
    }
}

impl fmt::Display for CommandAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommandAction {
    type Err = ValidationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "BUY" => Ok(CommandAction::Buy),
            "SELL" => Ok(CommandAction::Sell),
            "CANCEL" => Ok(CommandAction::Cancel),
            _ => Err(ValidationError::UnknownAction(raw.to_string())),
        }
    }
}

/// A queued command as stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualCommand {
    pub id: i64,
    pub symbol: String,
    pub action: String,
    pub amount: Option<Decimal>,
    pub executed: bool,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Validated command ready to be written
#[derive(Debug, Clone, PartialEq)]
pub struct NewManualCommand {
    pub symbol: String,
    pub action: CommandAction,
    pub amount: Option<Decimal>,
}

impl NewManualCommand {
    /// Validate raw operator input.
    ///
    /// The symbol is upper-cased. An amount, when given for BUY/SELL, must be
    /// strictly positive; CANCEL ignores it.
    pub fn new(symbol: &str, action: &str, amount: Option<Decimal>) -> Result<Self, ValidationError> {
        let symbol = symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(ValidationError::EmptySymbol);
        }

        let action: CommandAction = action.parse()?;

        let amount = match action {
            CommandAction::Cancel => None,
            _ => match amount {
                Some(value) if value <= Decimal::ZERO => {
                    return Err(ValidationError::InvalidAmount(format!(
                        "amount must be positive, got {}",
                        value
                    )));
                }
                other => other,
            },
        };

        Ok(Self {
            symbol,
            action,
            amount,
        })
    }
}

/// Result of writing a manual command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// A new pending command row was appended
    Inserted { id: i64 },
    /// Pending commands for the symbol were flagged executed; nothing inserted
    Cancelled { affected: u64 },
}
