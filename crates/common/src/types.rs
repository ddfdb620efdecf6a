use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::Error;

/// A traded pair, written `BASE/QUOTE` by the operator (e.g. `BTC/USDC`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol {
    base: String,
    quote: String,
}

impl Symbol {
    pub fn new(base: impl Into<String>, quote: impl Into<String>) -> Self {
        Self {
            base: base.into().to_uppercase(),
            quote: quote.into().to_uppercase(),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn quote(&self) -> &str {
        &self.quote
    }

    /// Concatenated form used by the Binance REST API, e.g. `BTCUSDC`.
    pub fn exchange_symbol(&self) -> String {
        format!("{}{}", self.base, self.quote)
    }
}

impl FromStr for Symbol {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.split_once('/') {
            Some((base, quote))
                if !base.trim().is_empty()
                    && !quote.trim().is_empty()
                    && !quote.contains('/') =>
            {
                Ok(Symbol::new(base.trim(), quote.trim()))
            }
            _ => Err(Error::InvalidSymbol(trimmed.to_string())),
        }
    }
}

impl TryFrom<String> for Symbol {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Symbol> for String {
    fn from(symbol: Symbol) -> Self {
        symbol.to_string()
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

/// Side of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

/// A market order to be submitted to the exchange. There is no limit price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub client_id: String,
    pub symbol: Symbol,
    pub side: OrderSide,
    pub quantity: Decimal,
}

impl OrderRequest {
    pub fn market(symbol: Symbol, side: OrderSide, quantity: Decimal) -> Self {
        Self {
            client_id: uuid::Uuid::new_v4().simple().to_string(),
            symbol,
            side,
            quantity,
        }
    }
}

/// Confirmation of an executed market order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderReceipt {
    pub order_id: String,
    pub symbol: Symbol,
    pub side: OrderSide,
    pub executed_quantity: Decimal,
    /// Volume-weighted fill price, when the exchange reports fills.
    pub average_price: Option<Decimal>,
    pub timestamp: DateTime<Utc>,
}

/// Whether the bot is running against the real exchange or simulating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TradingMode {
    Live,
    #[default]
    Paper,
}

impl std::fmt::Display for TradingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradingMode::Live => write!(f, "live"),
            TradingMode::Paper => write!(f, "paper"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_parses_and_uppercases() {
        let symbol: Symbol = " btc/usdc ".parse().unwrap();
        assert_eq!(symbol.base(), "BTC");
        assert_eq!(symbol.quote(), "USDC");
        assert_eq!(symbol.exchange_symbol(), "BTCUSDC");
        assert_eq!(symbol.to_string(), "BTC/USDC");
    }

    #[test]
    fn symbol_rejects_malformed_input() {
        for raw in ["BTCUSDC", "/USDC", "BTC/", "BTC/USDC/ETH", ""] {
            assert!(
                matches!(raw.parse::<Symbol>(), Err(Error::InvalidSymbol(_))),
                "'{raw}' should be rejected"
            );
        }
    }

    #[test]
    fn market_orders_get_distinct_client_ids() {
        let symbol = Symbol::new("BTC", "USDC");
        let a = OrderRequest::market(symbol.clone(), OrderSide::Sell, Decimal::ONE);
        let b = OrderRequest::market(symbol, OrderSide::Sell, Decimal::ONE);
        assert_ne!(a.client_id, b.client_id);
        assert_eq!(a.side, OrderSide::Sell);
    }

    #[test]
    fn symbol_serializes_as_slash_string() {
        let symbol = Symbol::new("eth", "usdt");
        let json = serde_json::to_string(&symbol).unwrap();
        assert_eq!(json, "\"ETH/USDT\"");
        let back: Symbol = serde_json::from_str(&json).unwrap();
        assert_eq!(back, symbol);
    }
}
