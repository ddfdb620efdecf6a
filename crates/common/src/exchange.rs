use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::{OrderReceipt, OrderRequest, Result, Symbol};

/// Abstraction over the exchange connection.
///
/// `BinanceClient` implements this for live trading.
/// `PaperClient` implements this for simulation.
///
/// `Ok(None)` from the two market queries means the exchange answered but had
/// nothing usable; `Err` means the call itself failed and the tick must abort.
#[async_trait]
pub trait ExchangeGateway: Send + Sync {
    /// Latest traded price for the pair, if the exchange reports one.
    async fn fetch_price(&self, symbol: &Symbol) -> Result<Option<Decimal>>;

    /// Minimum order value in quote currency, if the market carries that filter.
    async fn fetch_min_notional(&self, symbol: &Symbol) -> Result<Option<Decimal>>;

    /// Total (free + locked) balance of a single asset.
    async fn fetch_balance(&self, currency: &str) -> Result<Decimal>;

    /// Submit a market order and return the execution receipt.
    async fn place_market_order(&self, order: &OrderRequest) -> Result<OrderReceipt>;
}
