use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::Client;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Deserialize;
use sha2::Sha256;
use tokio::sync::RwLock;
use tracing::debug;

use common::{Error, ExchangeGateway, OrderReceipt, OrderRequest, Result, Symbol};

/// Binance spot accepts at most 8 decimals on order quantities. Used when a
/// market publishes no `LOT_SIZE` step.
const QUANTITY_DECIMALS: u32 = 8;

/// REST API client for Binance spot. Used for market data, balances and
/// market order placement.
pub struct BinanceClient {
    base_url: String,
    api_key: String,
    secret: String,
    http: Client,
    /// `LOT_SIZE` step per exchange symbol, filled from `exchangeInfo`.
    step_sizes: RwLock<HashMap<String, Option<Decimal>>>,
}

impl BinanceClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        secret: impl Into<String>,
    ) -> Result<Self> {
        let http = Client::builder()
            .use_rustls_tls()
            .build()
            .map_err(|e| Error::Http(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            secret: secret.into(),
            http,
            step_sizes: RwLock::new(HashMap::new()),
        })
    }

    fn sign(&self, query: &str) -> Result<String> {
        type HmacSha256 = Hmac<Sha256>;
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| Error::Config(format!("Invalid Binance secret: {e}")))?;
        mac.update(query.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    fn signed_query(&self, params: &str) -> Result<String> {
        let ts = Utc::now().timestamp_millis();
        let query = if params.is_empty() {
            format!("timestamp={ts}")
        } else {
            format!("{params}&timestamp={ts}")
        };
        let signature = self.sign(&query)?;
        Ok(format!("{query}&signature={signature}"))
    }

    async fn public_get(&self, path: &str, params: &str) -> Result<String> {
        let url = format!("{}{path}?{params}", self.base_url);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        read_body(resp).await
    }

    async fn signed_get(&self, path: &str, params: &str) -> Result<String> {
        let url = format!("{}{path}?{}", self.base_url, self.signed_query(params)?);
        let resp = self
            .http
            .get(&url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        read_body(resp).await
    }

    async fn signed_post(&self, path: &str, params: &str) -> Result<String> {
        let body = self.signed_query(params)?;
        let url = format!("{}{path}", self.base_url);
        let resp = self
            .http
            .post(&url)
            .header("X-MBX-APIKEY", &self.api_key)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        read_body(resp).await
    }

    async fn market_filters(&self, symbol: &Symbol) -> Result<MarketFilters> {
        let exchange_symbol = symbol.exchange_symbol();
        let params = format!("symbol={exchange_symbol}");
        let body = self.public_get("/api/v3/exchangeInfo", &params).await?;
        let info: ExchangeInfo = serde_json::from_str(&body)?;
        let filters = market_filters_from(&info, &exchange_symbol);
        self.step_sizes
            .write()
            .await
            .insert(exchange_symbol, filters.step_size);
        Ok(filters)
    }

    async fn step_size(&self, symbol: &Symbol) -> Result<Option<Decimal>> {
        let cached = self
            .step_sizes
            .read()
            .await
            .get(&symbol.exchange_symbol())
            .copied();
        match cached {
            Some(step) => Ok(step),
            None => Ok(self.market_filters(symbol).await?.step_size),
        }
    }
}

async fn read_body(resp: reqwest::Response) -> Result<String> {
    let status = resp.status();
    let body = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;
    if !status.is_success() {
        return Err(Error::Exchange(format!("HTTP {status}: {body}")));
    }
    Ok(body)
}

#[async_trait]
impl ExchangeGateway for BinanceClient {
    async fn fetch_price(&self, symbol: &Symbol) -> Result<Option<Decimal>> {
        let params = format!("symbol={}", symbol.exchange_symbol());
        let body = self.public_get("/api/v3/ticker/price", &params).await?;
        let ticker: PriceTicker = serde_json::from_str(&body)?;
        Ok(ticker.price)
    }

    async fn fetch_min_notional(&self, symbol: &Symbol) -> Result<Option<Decimal>> {
        Ok(self.market_filters(symbol).await?.min_notional)
    }

    async fn fetch_balance(&self, currency: &str) -> Result<Decimal> {
        let body = self.signed_get("/api/v3/account", "").await?;
        let account: AccountResponse = serde_json::from_str(&body)?;
        Ok(total_balance(&account, currency))
    }

    async fn place_market_order(&self, order: &OrderRequest) -> Result<OrderReceipt> {
        if order.quantity <= Decimal::ZERO {
            return Err(Error::InvalidQuantity(order.quantity));
        }
        let step = self.step_size(&order.symbol).await?;
        let params = format!(
            "symbol={}&side={}&type=MARKET&quantity={}&newClientOrderId={}",
            order.symbol.exchange_symbol(),
            order.side,
            format_quantity(order.quantity, step),
            order.client_id,
        );

        debug!(symbol = %order.symbol, side = %order.side, "Submitting market order to Binance");
        let body = self.signed_post("/api/v3/order", &params).await?;
        let resp: OrderResponse = serde_json::from_str(&body)?;

        let average_price = (!resp.executed_qty.is_zero())
            .then(|| resp.cummulative_quote_qty / resp.executed_qty);

        Ok(OrderReceipt {
            order_id: resp.order_id.to_string(),
            symbol: order.symbol.clone(),
            side: order.side,
            executed_quantity: resp.executed_qty,
            average_price,
            timestamp: Utc::now(),
        })
    }
}

/// Round up to a whole number of `LOT_SIZE` steps so a quantity lifted to the
/// minimum notional stays above it and passes the lot filter.
fn format_quantity(quantity: Decimal, step: Option<Decimal>) -> String {
    let rounded = match step {
        Some(step) if step > Decimal::ZERO => (quantity / step).ceil() * step,
        _ => quantity.round_dp_with_strategy(QUANTITY_DECIMALS, RoundingStrategy::AwayFromZero),
    };
    rounded.normalize().to_string()
}

/// Order-relevant filters of one market.
#[derive(Debug, Default, PartialEq)]
struct MarketFilters {
    min_notional: Option<Decimal>,
    step_size: Option<Decimal>,
}

/// Spot markets carry either the legacy `MIN_NOTIONAL` or the newer `NOTIONAL` filter.
fn market_filters_from(info: &ExchangeInfo, exchange_symbol: &str) -> MarketFilters {
    let market = info.symbols.iter().find(|s| s.symbol == exchange_symbol);
    let Some(market) = market else {
        debug!(symbol = exchange_symbol, "Market not found in exchangeInfo");
        return MarketFilters::default();
    };
    let min_notional = market
        .filters
        .iter()
        .filter(|f| f.filter_type == "MIN_NOTIONAL" || f.filter_type == "NOTIONAL")
        .find_map(|f| f.min_notional);
    let step_size = market
        .filters
        .iter()
        .filter(|f| f.filter_type == "LOT_SIZE")
        .find_map(|f| f.step_size);
    MarketFilters {
        min_notional,
        step_size,
    }
}

fn total_balance(account: &AccountResponse, currency: &str) -> Decimal {
    account
        .balances
        .iter()
        .find(|b| b.asset.eq_ignore_ascii_case(currency))
        .map(|b| b.free + b.locked)
        .unwrap_or(Decimal::ZERO)
}

// ─── Response types ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct PriceTicker {
    #[serde(default)]
    price: Option<Decimal>,
}

#[derive(Deserialize)]
struct ExchangeInfo {
    #[serde(default)]
    symbols: Vec<MarketInfo>,
}

#[derive(Deserialize)]
struct MarketInfo {
    symbol: String,
    #[serde(default)]
    filters: Vec<MarketFilter>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MarketFilter {
    filter_type: String,
    #[serde(default)]
    min_notional: Option<Decimal>,
    #[serde(default)]
    step_size: Option<Decimal>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResponse {
    order_id: u64,
    executed_qty: Decimal,
    cummulative_quote_qty: Decimal,
}

#[derive(Deserialize)]
struct AccountResponse {
    balances: Vec<Balance>,
}

#[derive(Deserialize)]
struct Balance {
    asset: String,
    free: Decimal,
    locked: Decimal,
}
