use proptest::prelude::*;
use rust_decimal::Decimal;

use common::{OrderSide, Symbol};
use strategy::{Decision, LastAction, QuantityNormalizer, StrategyState};

fn decimal(mantissa: i64, scale: u32) -> Decimal {
    Decimal::new(mantissa, scale)
}

fn price() -> impl Strategy<Value = Decimal> {
    (1i64..100_000_000, 0u32..5).prop_map(|(m, s)| decimal(m, s))
}

fn percentage() -> impl Strategy<Value = Decimal> {
    (1i64..5_000, 2u32..3).prop_map(|(m, s)| decimal(m, s))
}

proptest! {
    /// Thresholds are exactly P × (1 ∓ pct/100) of the execution price.
    #[test]
    fn thresholds_are_exact_offsets_of_fill_price(p in price(), pct in percentage()) {
        let hundred = Decimal::ONE_HUNDRED;
        let mut state = StrategyState::default();

        let buy = state.record_fill(OrderSide::Sell, p, pct);
        prop_assert_eq!(buy, p * (Decimal::ONE - pct / hundred));
        prop_assert_eq!(state.desired_buy_price(), Some(buy));
        prop_assert!(buy < p);

        let sell = state.record_fill(OrderSide::Buy, p, pct);
        prop_assert_eq!(sell, p * (Decimal::ONE + pct / hundred));
        prop_assert_eq!(state.desired_sell_price(), Some(sell));
        prop_assert!(sell > p);
    }

    /// Whatever the price path, executed sides strictly alternate and start with a sell.
    #[test]
    fn executed_sides_alternate(
        prices in prop::collection::vec(price(), 1..60),
        pct in percentage(),
    ) {
        let mut state = StrategyState::default();
        let mut sides = Vec::new();

        for p in prices {
            if let Decision::Trade(side) = state.decide(p) {
                state.record_fill(side, p, pct);
                sides.push(side);
            }
        }

        prop_assert_eq!(sides.first().copied(), Some(OrderSide::Sell));
        for pair in sides.windows(2) {
            prop_assert_ne!(pair[0], pair[1]);
        }
        let expected = match sides.last() {
            Some(OrderSide::Sell) => LastAction::Sold,
            Some(OrderSide::Buy) => LastAction::Bought,
            None => LastAction::None,
        };
        prop_assert_eq!(state.last_action(), expected);
    }

    /// Prices that have not reached the live threshold never trigger and
    /// never change state, on either side of the band.
    #[test]
    fn waiting_is_idempotent(
        fill in price(),
        pct in percentage(),
        offsets in prop::collection::vec(1u32..=10_000, 1..20),
    ) {
        // Short: any price strictly above the buy target waits.
        let mut short = StrategyState::default();
        let desired_buy = short.record_fill(OrderSide::Sell, fill, pct);
        let short_snapshot = short.clone();
        for &bp in &offsets {
            let p = desired_buy * (Decimal::ONE + Decimal::new(bp as i64, 4));
            prop_assert!(p > desired_buy);
            let decision = short.decide(p);
            prop_assert_eq!(
                decision,
                Decision::Wait { side: OrderSide::Buy, target: desired_buy }
            );
        }
        prop_assert_eq!(&short, &short_snapshot);

        // Long: any positive price strictly below the sell target waits.
        let mut long = StrategyState::default();
        let desired_sell = long.record_fill(OrderSide::Buy, fill, pct);
        let long_snapshot = long.clone();
        for &bp in &offsets {
            // Fraction in [0.0001, 0.9999] of the target.
            let fraction = Decimal::new((bp % 9_999 + 1) as i64, 4);
            let p = desired_sell * fraction;
            prop_assert!(p > Decimal::ZERO && p < desired_sell);
            let decision = long.decide(p);
            prop_assert_eq!(
                decision,
                Decision::Wait { side: OrderSide::Sell, target: desired_sell }
            );
        }
        prop_assert_eq!(&long, &long_snapshot);
    }

    #[test]
    fn normalized_quantity_is_max_of_base_and_minimum(
        base in (0i64..1_000_000, 0u32..8).prop_map(|(m, s)| decimal(m + 1, s)),
        notional in (1i64..1_000_000, 0u32..3).prop_map(|(m, s)| decimal(m, s)),
        p in price(),
    ) {
        let symbol = Symbol::new("BTC", "USDC");
        let mut normalizer = QuantityNormalizer::new(base);

        let q = normalizer.normalize(&symbol, Some(p), Some(notional)).unwrap();
        prop_assert_eq!(q, base.max(notional / p));

        prop_assert_eq!(normalizer.normalize(&symbol, Some(p), None).unwrap(), base);
        prop_assert_eq!(normalizer.normalize(&symbol, None, Some(notional)).unwrap(), base);
        prop_assert_eq!(
            normalizer.normalize(&symbol, Some(Decimal::ZERO), Some(notional)).unwrap(),
            base
        );
    }
}
