use rust_decimal::Decimal;
use tracing::{error, info, warn};

use common::{Error, ExchangeGateway, OrderReceipt, OrderRequest, OrderSide, Result};

use crate::config::TradingConfig;
use crate::normalizer::QuantityNormalizer;

/// Side of the most recent executed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LastAction {
    #[default]
    None,
    Bought,
    Sold,
}

/// Where the band currently stands. Each holding state carries the only
/// threshold that is meaningful in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Stance {
    #[default]
    Idle,
    /// Sold last; buy back once the price falls to `desired_buy`.
    HoldingShort { desired_buy: Decimal },
    /// Bought last; sell once the price rises to `desired_sell`.
    HoldingLong { desired_sell: Decimal },
}

/// What the strategy wants to do at a given price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Trade(OrderSide),
    Wait { side: OrderSide, target: Decimal },
}

/// Mutable trading state, owned by a single [`BandStrategy`].
/// Lives in memory only; a restart begins again from idle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StrategyState {
    last_price: Option<Decimal>,
    stance: Stance,
}

impl StrategyState {
    pub fn last_action(&self) -> LastAction {
        match self.stance {
            Stance::Idle => LastAction::None,
            Stance::HoldingShort { .. } => LastAction::Sold,
            Stance::HoldingLong { .. } => LastAction::Bought,
        }
    }

    pub fn last_price(&self) -> Option<Decimal> {
        self.last_price
    }

    pub fn desired_buy_price(&self) -> Option<Decimal> {
        match self.stance {
            Stance::HoldingShort { desired_buy } => Some(desired_buy),
            _ => None,
        }
    }

    pub fn desired_sell_price(&self) -> Option<Decimal> {
        match self.stance {
            Stance::HoldingLong { desired_sell } => Some(desired_sell),
            _ => None,
        }
    }

    /// Idle always sells first, whatever the account actually holds.
    pub fn decide(&self, price: Decimal) -> Decision {
        match self.stance {
            Stance::Idle => Decision::Trade(OrderSide::Sell),
            Stance::HoldingShort { desired_buy } if price <= desired_buy => {
                Decision::Trade(OrderSide::Buy)
            }
            Stance::HoldingShort { desired_buy } => Decision::Wait {
                side: OrderSide::Buy,
                target: desired_buy,
            },
            Stance::HoldingLong { desired_sell } if price >= desired_sell => {
                Decision::Trade(OrderSide::Sell)
            }
            Stance::HoldingLong { desired_sell } => Decision::Wait {
                side: OrderSide::Sell,
                target: desired_sell,
            },
        }
    }

    /// Record an executed order at `price` and return the new opposite threshold.
    /// The threshold is measured from `price`, not from the previous target.
    pub fn record_fill(&mut self, side: OrderSide, price: Decimal, percentage: Decimal) -> Decimal {
        self.last_price = Some(price);
        match side {
            OrderSide::Sell => {
                let desired_buy = buy_threshold(price, percentage);
                self.stance = Stance::HoldingShort { desired_buy };
                desired_buy
            }
            OrderSide::Buy => {
                let desired_sell = sell_threshold(price, percentage);
                self.stance = Stance::HoldingLong { desired_sell };
                desired_sell
            }
        }
    }
}

/// `price × (1 − percentage/100)`
pub fn buy_threshold(price: Decimal, percentage: Decimal) -> Decimal {
    price * (Decimal::ONE - percentage / Decimal::ONE_HUNDRED)
}

/// `price × (1 + percentage/100)`
pub fn sell_threshold(price: Decimal, percentage: Decimal) -> Decimal {
    price * (Decimal::ONE + percentage / Decimal::ONE_HUNDRED)
}

/// Why a tick ended without touching state or the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    PriceUnavailable,
    InvalidQuantity(Decimal),
}

/// Result of one evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Traded {
        side: OrderSide,
        price: Decimal,
        quantity: Decimal,
        next_threshold: Decimal,
        receipt: OrderReceipt,
    },
    Waiting {
        price: Decimal,
        side: OrderSide,
        target: Decimal,
    },
    Skipped(SkipReason),
}

/// The percentage-band state machine: sell, wait for the price to drop by the
/// band, buy, wait for it to rise by the band, sell again.
pub struct BandStrategy {
    config: TradingConfig,
    state: StrategyState,
    normalizer: QuantityNormalizer,
}

impl BandStrategy {
    pub fn new(config: TradingConfig) -> Self {
        let normalizer = QuantityNormalizer::new(config.base_amount);
        Self {
            config,
            state: StrategyState::default(),
            normalizer,
        }
    }

    pub fn config(&self) -> &TradingConfig {
        &self.config
    }

    pub fn state(&self) -> &StrategyState {
        &self.state
    }

    /// Run one evaluation against the gateway.
    ///
    /// `Err` means a gateway call failed; state is untouched and the caller
    /// should retry later. An order error also leaves state untouched.
    pub async fn tick(&mut self, gateway: &dyn ExchangeGateway) -> Result<TickOutcome> {
        let symbol = &self.config.symbol;

        let price = match gateway.fetch_price(symbol).await? {
            Some(p) if p > Decimal::ZERO => p,
            other => {
                warn!(%symbol, price = ?other, "Price unavailable. Skipping tick.");
                return Ok(TickOutcome::Skipped(SkipReason::PriceUnavailable));
            }
        };

        let min_notional = gateway.fetch_min_notional(symbol).await?;
        let quantity = match self.normalizer.normalize(symbol, Some(price), min_notional) {
            Ok(q) => q,
            Err(Error::InvalidQuantity(q)) => {
                return Ok(TickOutcome::Skipped(SkipReason::InvalidQuantity(q)))
            }
            Err(e) => return Err(e),
        };

        let side = match self.state.decide(price) {
            Decision::Trade(side) => side,
            Decision::Wait { side, target } => {
                let verb = if side == OrderSide::Buy { "buy" } else { "sell" };
                info!(
                    target: "status",
                    %symbol,
                    current = %price,
                    desired = %target,
                    "Waiting to {verb}"
                );
                return Ok(TickOutcome::Waiting { price, side, target });
            }
        };

        match (self.state.last_action(), side) {
            (LastAction::None, _) => {
                info!(%symbol, %quantity, %price, "Initial sell")
            }
            (_, OrderSide::Buy) => {
                info!(%symbol, %quantity, %price, "Price reached desired buy price. Buying")
            }
            (_, OrderSide::Sell) => {
                info!(%symbol, %quantity, %price, "Price reached desired sell price. Selling")
            }
        }

        let order = OrderRequest::market(symbol.clone(), side, quantity);
        let receipt = gateway.place_market_order(&order).await.map_err(|e| {
            error!(%symbol, %side, error = %e, "Order placement failed");
            e
        })?;
        info!(
            order_id = %receipt.order_id,
            executed = %receipt.executed_quantity,
            avg_price = ?receipt.average_price,
            "Order executed"
        );

        let next_threshold = self.state.record_fill(side, price, self.config.percentage);
        match side {
            OrderSide::Sell => {
                info!(%symbol, desired_buy = %next_threshold, "Desired buy price set")
            }
            OrderSide::Buy => {
                info!(%symbol, desired_sell = %next_threshold, "Desired sell price set")
            }
        }

        Ok(TickOutcome::Traded {
            side,
            price,
            quantity,
            next_threshold,
            receipt,
        })
    }
}
