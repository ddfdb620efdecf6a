use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use common::ExchangeGateway;
use strategy::{BandStrategy, TickOutcome};

/// Fixed-interval polling policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSchedule {
    /// Pause after a completed (or skipped) tick.
    pub interval: Duration,
    /// Pause after a tick aborted by an error.
    pub retry_after_error: Duration,
}

impl Default for PollSchedule {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            retry_after_error: Duration::from_secs(5),
        }
    }
}

/// Drives the strategy on a fixed cadence until the task is dropped.
///
/// Ticks are strictly sequential: the next one starts only after the
/// previous tick and its pause have finished. No error ends the loop.
pub struct Driver {
    strategy: BandStrategy,
    gateway: Arc<dyn ExchangeGateway>,
    schedule: PollSchedule,
}

impl Driver {
    pub fn new(
        strategy: BandStrategy,
        gateway: Arc<dyn ExchangeGateway>,
        schedule: PollSchedule,
    ) -> Self {
        Self {
            strategy,
            gateway,
            schedule,
        }
    }

    pub fn strategy(&self) -> &BandStrategy {
        &self.strategy
    }

    /// Run a single tick and return how long to wait before the next one.
    pub async fn step(&mut self) -> Duration {
        match self.strategy.tick(self.gateway.as_ref()).await {
            Ok(TickOutcome::Skipped(reason)) => {
                debug!(?reason, "Tick skipped");
                self.schedule.interval
            }
            Ok(_) => self.schedule.interval,
            Err(e) => {
                error!(error = %e, "Tick aborted");
                self.schedule.retry_after_error
            }
        }
    }

    /// Log base and quote balances once. Informational only; trade sizing
    /// does not depend on them.
    pub async fn log_balances(&self) {
        let symbol = &self.strategy.config().symbol;
        for asset in [symbol.base(), symbol.quote()] {
            match self.gateway.fetch_balance(asset).await {
                Ok(balance) => info!(%asset, %balance, "Balance"),
                Err(e) => warn!(%asset, error = %e, "Could not fetch balance"),
            }
        }
    }

    /// Run the polling loop. Call from `tokio::spawn` or race against a
    /// shutdown signal; it never returns on its own.
    pub async fn run(mut self) {
        let cfg = self.strategy.config();
        info!(
            symbol = %cfg.symbol,
            base_amount = %cfg.base_amount,
            percentage = %cfg.percentage,
            interval = ?self.schedule.interval,
            "Strategy started"
        );
        self.log_balances().await;

        loop {
            let delay = self.step().await;
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use common::{Error, OrderReceipt, OrderRequest, Result, Symbol};
    use strategy::{LastAction, TradingConfig};

    use super::*;

    /// Fixed price feed whose first `failures` price requests error out.
    struct FlakyGateway {
        price: Decimal,
        failures: usize,
        price_calls: AtomicUsize,
        balance_calls: AtomicUsize,
        orders: Mutex<Vec<OrderRequest>>,
    }

    impl FlakyGateway {
        fn new(price: Decimal, failures: usize) -> Self {
            Self {
                price,
                failures,
                price_calls: AtomicUsize::new(0),
                balance_calls: AtomicUsize::new(0),
                orders: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ExchangeGateway for FlakyGateway {
        async fn fetch_price(&self, _symbol: &Symbol) -> Result<Option<Decimal>> {
            let n = self.price_calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                return Err(Error::Http("connection reset".into()));
            }
            Ok(Some(self.price))
        }

        async fn fetch_min_notional(&self, _symbol: &Symbol) -> Result<Option<Decimal>> {
            Ok(Some(dec!(5)))
        }

        async fn fetch_balance(&self, _currency: &str) -> Result<Decimal> {
            self.balance_calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::Exchange("account endpoint unavailable".into()))
        }

        async fn place_market_order(&self, order: &OrderRequest) -> Result<OrderReceipt> {
            self.orders.lock().unwrap().push(order.clone());
            Ok(OrderReceipt {
                order_id: "1".into(),
                symbol: order.symbol.clone(),
                side: order.side,
                executed_quantity: order.quantity,
                average_price: Some(self.price),
                timestamp: Utc::now(),
            })
        }
    }

    fn schedule() -> PollSchedule {
        PollSchedule {
            interval: Duration::from_secs(5),
            retry_after_error: Duration::from_secs(1),
        }
    }

    #[tokio::test]
    async fn step_picks_delay_by_outcome() {
        let gateway = Arc::new(FlakyGateway::new(dec!(100), 1));
        let mut driver = Driver::new(
            BandStrategy::new(TradingConfig::default()),
            gateway.clone(),
            schedule(),
        );

        assert_eq!(driver.step().await, Duration::from_secs(1));
        assert_eq!(driver.strategy().state().last_action(), LastAction::None);

        assert_eq!(driver.step().await, Duration::from_secs(5));
        assert_eq!(driver.strategy().state().last_action(), LastAction::Sold);
    }

    #[tokio::test(start_paused = true)]
    async fn run_survives_errors_and_polls_on_schedule() {
        let gateway = Arc::new(FlakyGateway::new(dec!(100), 1));
        let driver = Driver::new(
            BandStrategy::new(TradingConfig::default()),
            gateway.clone(),
            schedule(),
        );

        let handle = tokio::spawn(driver.run());
        // Ticks at t=0 (error), t=1 (sell), t=6 (wait).
        tokio::time::sleep(Duration::from_secs(7)).await;
        handle.abort();

        assert_eq!(gateway.price_calls.load(Ordering::SeqCst), 3);
        assert_eq!(gateway.balance_calls.load(Ordering::SeqCst), 2);

        let orders = gateway.orders.lock().unwrap();
        assert_eq!(orders.len(), 1);
        // 5 / 100 lifts the default 0.0001 to 0.05.
        assert_eq!(orders[0].quantity, dec!(0.05));
    }
}
