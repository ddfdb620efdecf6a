use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use common::{Error, Result, Symbol};

pub const DEFAULT_SYMBOL: &str = "BTC/USDC";
/// In base asset units.
pub const DEFAULT_BASE_AMOUNT: Decimal = dec!(0.0001);
/// Band width in percent.
pub const DEFAULT_PERCENTAGE: Decimal = Decimal::ONE;

/// Per-run trading parameters. Fixed at startup, never mutated afterwards.
///
/// Example `config/band.toml`:
/// ```toml
/// symbol = "BTC/USDC"
/// base_amount = "0.0001"
/// percentage = "1"
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TradingConfig {
    /// Traded pair, e.g. `BTC/USDC`.
    pub symbol: Symbol,
    /// Default order size in base asset units.
    pub base_amount: Decimal,
    /// Percent distance of the next trigger price from the last execution price.
    pub percentage: Decimal,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            symbol: Symbol::new("BTC", "USDC"),
            base_amount: DEFAULT_BASE_AMOUNT,
            percentage: DEFAULT_PERCENTAGE,
        }
    }
}

impl TradingConfig {
    /// Load from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read trading config at '{path}': {e}"))
        })?;
        let cfg: TradingConfig = toml::from_str(&content).map_err(|e| {
            Error::Config(format!("Failed to parse trading config at '{path}': {e}"))
        })?;
        cfg.validated()
    }

    /// Build from raw operator answers. A blank answer keeps the default.
    pub fn from_answers(symbol: &str, base_amount: &str, percentage: &str) -> Result<Self> {
        let defaults = Self::default();

        let symbol = match symbol.trim() {
            "" => defaults.symbol,
            raw => raw.to_uppercase().parse()?,
        };

        let cfg = Self {
            symbol,
            base_amount: parse_answer("amount", base_amount, defaults.base_amount)?,
            percentage: parse_answer("percentage", percentage, defaults.percentage)?,
        };
        cfg.validated()
    }

    fn validated(self) -> Result<Self> {
        if self.base_amount <= Decimal::ZERO {
            return Err(Error::Config(format!(
                "amount must be positive, got {}",
                self.base_amount
            )));
        }
        // 100% or more would put the buy trigger at or below zero.
        if self.percentage <= Decimal::ZERO || self.percentage >= Decimal::ONE_HUNDRED {
            return Err(Error::Config(format!(
                "percentage must be between 0 and 100 (exclusive), got {}",
                self.percentage
            )));
        }
        Ok(self)
    }
}

fn parse_answer(name: &str, raw: &str, default: Decimal) -> Result<Decimal> {
    let raw = raw.trim().trim_end_matches('%').trim();
    if raw.is_empty() {
        return Ok(default);
    }
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .map_err(|e| Error::Config(format!("{name} '{raw}' is not a number: {e}")))
}
