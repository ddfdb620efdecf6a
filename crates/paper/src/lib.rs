use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use tracing::{debug, info};

use common::{
    Error, ExchangeGateway, OrderReceipt, OrderRequest, OrderSide, Result, Symbol,
};

/// Simulated exchange gateway for paper trading.
///
/// Fills are simulated at the latest known price with configurable slippage,
/// and balances move between the base and quote asset of each fill.
/// Market data comes from an optional live feed; without one, prices are
/// whatever `update_price` last set. No real orders are ever sent.
pub struct PaperClient {
    /// Source of real prices and market filters, if any.
    feed: Option<Arc<dyn ExchangeGateway>>,
    /// Simulated balances keyed by asset.
    balances: Arc<RwLock<HashMap<String, Decimal>>>,
    /// Latest known price per pair.
    prices: Arc<RwLock<HashMap<Symbol, Decimal>>>,
    /// Minimum notional per pair when no feed is attached.
    min_notionals: Arc<RwLock<HashMap<Symbol, Decimal>>>,
    /// Slippage in basis points applied to all fills.
    slippage_bps: Decimal,
}

impl PaperClient {
    pub fn new<I, S>(initial_balances: I, slippage_bps: Decimal) -> Self
    where
        I: IntoIterator<Item = (S, Decimal)>,
        S: Into<String>,
    {
        let balances: HashMap<String, Decimal> = initial_balances
            .into_iter()
            .map(|(asset, amount)| (asset.into().to_uppercase(), amount))
            .collect();
        info!(?balances, %slippage_bps, "PaperClient initialized");
        Self {
            feed: None,
            balances: Arc::new(RwLock::new(balances)),
            prices: Arc::new(RwLock::new(HashMap::new())),
            min_notionals: Arc::new(RwLock::new(HashMap::new())),
            slippage_bps,
        }
    }

    /// Read prices and minimum notionals from `feed` instead of local overrides.
    pub fn with_market_data(mut self, feed: Arc<dyn ExchangeGateway>) -> Self {
        self.feed = Some(feed);
        self
    }

    /// Set the latest price for a pair.
    pub async fn update_price(&self, symbol: &Symbol, price: Decimal) {
        self.prices.write().await.insert(symbol.clone(), price);
    }

    pub async fn set_min_notional(&self, symbol: &Symbol, min_notional: Decimal) {
        self.min_notionals
            .write()
            .await
            .insert(symbol.clone(), min_notional);
    }

    fn fill_price(&self, mid_price: Decimal, side: OrderSide) -> Decimal {
        let slip = self.slippage_bps / Decimal::from(10_000);
        // Buys pay more, sells receive less
        match side {
            OrderSide::Buy => mid_price * (Decimal::ONE + slip),
            OrderSide::Sell => mid_price * (Decimal::ONE - slip),
        }
    }
}

#[async_trait]
impl ExchangeGateway for PaperClient {
    async fn fetch_price(&self, symbol: &Symbol) -> Result<Option<Decimal>> {
        if let Some(feed) = &self.feed {
            let price = feed.fetch_price(symbol).await?;
            if let Some(p) = price {
                self.update_price(symbol, p).await;
            }
            return Ok(price);
        }
        Ok(self.prices.read().await.get(symbol).copied())
    }

    async fn fetch_min_notional(&self, symbol: &Symbol) -> Result<Option<Decimal>> {
        match &self.feed {
            Some(feed) => feed.fetch_min_notional(symbol).await,
            None => Ok(self.min_notionals.read().await.get(symbol).copied()),
        }
    }

    async fn fetch_balance(&self, currency: &str) -> Result<Decimal> {
        Ok(self
            .balances
            .read()
            .await
            .get(&currency.to_uppercase())
            .copied()
            .unwrap_or(Decimal::ZERO))
    }

    async fn place_market_order(&self, order: &OrderRequest) -> Result<OrderReceipt> {
        if order.quantity <= Decimal::ZERO {
            return Err(Error::InvalidQuantity(order.quantity));
        }

        let mid_price = self
            .prices
            .read()
            .await
            .get(&order.symbol)
            .copied()
            .ok_or_else(|| {
                Error::Exchange(format!(
                    "PaperClient has no price for pair '{}'. Fetch a price first.",
                    order.symbol
                ))
            })?;
        let fill_price = self.fill_price(mid_price, order.side);
        let notional = order.quantity * fill_price;

        let base = order.symbol.base().to_string();
        let quote = order.symbol.quote().to_string();

        let mut balances = self.balances.write().await;
        let (spend_asset, spend, receive_asset, receive) = match order.side {
            OrderSide::Buy => (quote, notional, base, order.quantity),
            OrderSide::Sell => (base, order.quantity, quote, notional),
        };

        let available = balances.get(&spend_asset).copied().unwrap_or(Decimal::ZERO);
        if available < spend {
            return Err(Error::InsufficientBalance {
                asset: spend_asset,
                needed: spend,
                available,
            });
        }
        balances.insert(spend_asset, available - spend);
        *balances.entry(receive_asset).or_insert(Decimal::ZERO) += receive;
        drop(balances);

        debug!(
            symbol = %order.symbol,
            side = %order.side,
            mid = %mid_price,
            fill = %fill_price,
            qty = %order.quantity,
            "Paper fill simulated"
        );

        Ok(OrderReceipt {
            order_id: order.client_id.clone(),
            symbol: order.symbol.clone(),
            side: order.side,
            executed_quantity: order.quantity,
            average_price: Some(fill_price),
            timestamp: Utc::now(),
        })
    }
}
