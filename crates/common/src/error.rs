use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Exchange API error: {0}")]
    Exchange(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid symbol '{0}': expected BASE/QUOTE, e.g. BTC/USDC")]
    InvalidSymbol(String),

    #[error("Invalid order quantity {0}: must be positive")]
    InvalidQuantity(Decimal),

    #[error("Insufficient {asset} balance: need {needed}, have {available}")]
    InsufficientBalance {
        asset: String,
        needed: Decimal,
        available: Decimal,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
