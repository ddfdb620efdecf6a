use rust_decimal::Decimal;
use tracing::{error, warn};

use common::{Error, Result, Symbol};

/// Lifts the configured order size to the exchange's minimum order value.
///
/// Each fallback warning is emitted once per normalizer; a polling loop would
/// otherwise repeat it every tick. The non-positive quantity error is not
/// deduplicated.
#[derive(Debug, Clone)]
pub struct QuantityNormalizer {
    base_amount: Decimal,
    min_notional_warned: bool,
    price_warned: bool,
}

impl QuantityNormalizer {
    pub fn new(base_amount: Decimal) -> Self {
        Self {
            base_amount,
            min_notional_warned: false,
            price_warned: false,
        }
    }

    /// Effective quantity: `max(base_amount, min_notional / price)`.
    ///
    /// Falls back to `base_amount` when the minimum notional is unknown or the
    /// price is unknown or not positive. Returns `Error::InvalidQuantity` when
    /// the result is not positive; the caller must not place an order then.
    pub fn normalize(
        &mut self,
        symbol: &Symbol,
        price: Option<Decimal>,
        min_notional: Option<Decimal>,
    ) -> Result<Decimal> {
        let quantity = match (min_notional, price) {
            (None, _) => {
                if !self.min_notional_warned {
                    warn!(%symbol, "min_notional is unknown. Using default amount.");
                    self.min_notional_warned = true;
                }
                self.base_amount
            }
            (Some(_), None) => {
                self.warn_price(symbol, None);
                self.base_amount
            }
            (Some(_), Some(p)) if p <= Decimal::ZERO => {
                self.warn_price(symbol, Some(p));
                self.base_amount
            }
            (Some(notional), Some(p)) => self.base_amount.max(notional / p),
        };

        if quantity <= Decimal::ZERO {
            error!(%symbol, %quantity, "Invalid order quantity. Skipping trade.");
            return Err(Error::InvalidQuantity(quantity));
        }
        Ok(quantity)
    }

    fn warn_price(&mut self, symbol: &Symbol, price: Option<Decimal>) {
        if !self.price_warned {
            warn!(%symbol, ?price, "current price is unknown or zero. Using default amount.");
            self.price_warned = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn btc() -> Symbol {
        Symbol::new("BTC", "USDC")
    }

    #[test]
    fn min_notional_dominates_small_base_amount() {
        let mut n = QuantityNormalizer::new(dec!(0.0001));
        let q = n.normalize(&btc(), Some(dec!(100)), Some(dec!(10))).unwrap();
        assert_eq!(q, dec!(0.1));
    }

    #[test]
    fn base_amount_kept_when_above_minimum() {
        let mut n = QuantityNormalizer::new(dec!(0.5));
        let q = n.normalize(&btc(), Some(dec!(100)), Some(dec!(10))).unwrap();
        assert_eq!(q, dec!(0.5));
    }

    #[test]
    fn unknown_min_notional_falls_back_and_warns_once() {
        let mut n = QuantityNormalizer::new(dec!(0.0001));
        assert_eq!(n.normalize(&btc(), Some(dec!(100)), None).unwrap(), dec!(0.0001));
        assert!(n.min_notional_warned);
        assert!(!n.price_warned);
        assert_eq!(n.normalize(&btc(), Some(dec!(100)), None).unwrap(), dec!(0.0001));
    }

    #[test]
    fn unknown_or_zero_price_falls_back_to_base_amount() {
        let mut n = QuantityNormalizer::new(dec!(0.002));
        assert_eq!(n.normalize(&btc(), None, Some(dec!(10))).unwrap(), dec!(0.002));
        assert!(n.price_warned);
        assert_eq!(
            n.normalize(&btc(), Some(Decimal::ZERO), Some(dec!(10))).unwrap(),
            dec!(0.002)
        );
    }

    #[test]
    fn non_positive_quantity_is_rejected_every_time() {
        let mut n = QuantityNormalizer::new(Decimal::ZERO);
        for _ in 0..2 {
            let err = n.normalize(&btc(), Some(dec!(100)), None).unwrap_err();
            assert!(matches!(err, Error::InvalidQuantity(q) if q.is_zero()));
        }
    }
}
