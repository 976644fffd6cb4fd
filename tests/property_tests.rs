//! Property tests for band, sizing, spread and ledger invariants.
//!
//! 1. Readiness: a band is never reported before its window is full
//! 2. Band position stays in [-1, 1], including a flat market
//! 3. Sizing: scale is non-increasing in band position, quantity is capped
//! 4. Spreads: dynamic spreads stay inside the configured bounds
//! 5. Ledger: a rejected oversell leaves the position untouched

mod common;

use boll_maker::config::{BandConfig, BandsConfig, SizingConfig, SkewFormula, SpreadConfig};
use boll_maker::core::indicators::normalized_position;
use boll_maker::{BandSnapshot, IndicatorEngine, PositionLedger, PositionSizer, Side, SpreadCalculator, Timeframe};
use chrono::Utc;
use common::bars_from_closes;
use proptest::prelude::*;
use rust_decimal::Decimal;

// ── Strategies ───────────────────────────────────────────────────────

fn arb_price() -> impl Strategy<Value = Decimal> {
    (100i64..100_000).prop_map(|cents| Decimal::new(cents, 2))
}

fn arb_std() -> impl Strategy<Value = Decimal> {
    (0i64..5_000).prop_map(|cents| Decimal::new(cents, 2))
}

fn arb_position() -> impl Strategy<Value = Decimal> {
    (-1000i64..=1000).prop_map(|p| Decimal::new(p, 3))
}

fn arb_skew() -> impl Strategy<Value = Decimal> {
    (0i64..=200).prop_map(|k| Decimal::new(k, 2))
}

fn arb_formula() -> impl Strategy<Value = SkewFormula> {
    prop_oneof![
        Just(SkewFormula::Complementary),
        Just(SkewFormula::OneSided),
        Just(SkewFormula::SellAnchored),
    ]
}

fn arb_quantity() -> impl Strategy<Value = Decimal> {
    (1i64..10_000).prop_map(|q| Decimal::new(q, 2))
}

fn bands(period: usize) -> BandsConfig {
    let band = BandConfig {
        interval: "1m".to_string(),
        period,
        std_multiplier: Decimal::TWO,
    };
    BandsConfig {
        long: band.clone(),
        short: band,
    }
}

// ── 1. Readiness ─────────────────────────────────────────────────────

proptest! {
    #[test]
    fn band_not_ready_until_window_full(
        period in 1usize..30,
        closes in prop::collection::vec(arb_price(), 0..40),
    ) {
        let mut engine = IndicatorEngine::new(&bands(period));
        for bar in bars_from_closes(&closes) {
            engine.update(Timeframe::Short, &bar);
        }
        let reading = engine.snapshot(Timeframe::Short);
        prop_assert_eq!(reading.is_ready(), closes.len() >= period);
        prop_assert!(!engine.snapshot(Timeframe::Long).is_ready());
    }
}

// ── 2. Band position ─────────────────────────────────────────────────

proptest! {
    #[test]
    fn band_position_is_clamped(price in arb_price(), mean in arb_price(), std_dev in arb_std()) {
        let p = normalized_position(price, mean, Decimal::TWO * std_dev);
        prop_assert!(p >= Decimal::NEGATIVE_ONE && p <= Decimal::ONE);
        if std_dev.is_zero() {
            prop_assert_eq!(p, Decimal::ZERO);
        }
    }

    #[test]
    fn snapshot_bands_bracket_mean(mean in arb_price(), std_dev in arb_std()) {
        let snapshot = BandSnapshot::from_stats(Timeframe::Long, 21, Decimal::TWO, mean, std_dev, mean, Utc::now());
        prop_assert!(snapshot.lower_band <= snapshot.mean);
        prop_assert!(snapshot.mean <= snapshot.upper_band);
        prop_assert!(snapshot.contains(mean));
    }
}

// ── 3. Sizing ────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn scale_is_non_increasing(
        a in arb_position(),
        b in arb_position(),
        min_scale in 0i64..10,
        extra in 0i64..50,
    ) {
        let sizer = PositionSizer::new(SizingConfig {
            min_position_scale: Decimal::from(min_scale),
            max_position_scale: Decimal::from(min_scale + extra),
            ..SizingConfig::default()
        });
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(sizer.scale(low) >= sizer.scale(high));
    }

    #[test]
    fn order_quantity_capped_at_multiple(
        position in arb_position(),
        price in arb_price(),
        base in arb_quantity(),
        max_scale in 1i64..100,
    ) {
        let sizer = PositionSizer::new(SizingConfig {
            base_order_size: base,
            min_position_scale: Decimal::ONE,
            max_position_scale: Decimal::from(max_scale),
            ..SizingConfig::default()
        });
        let quantity = sizer.order_quantity(position, price);
        prop_assert!(quantity >= Decimal::ZERO);
        prop_assert!(quantity <= base * Decimal::from(5));
    }
}

// ── 4. Spreads ───────────────────────────────────────────────────────

proptest! {
    #[test]
    fn dynamic_spreads_within_bounds(
        mean in arb_price(),
        std_dev in arb_std(),
        price in arb_price(),
        up in arb_skew(),
        down in arb_skew(),
        formula in arb_formula(),
    ) {
        let calculator = SpreadCalculator::new(SpreadConfig {
            uptrend_skew: up,
            downtrend_skew: down,
            skew_formula: formula,
            ..SpreadConfig::default()
        });
        let snapshot = BandSnapshot::from_stats(Timeframe::Short, 21, Decimal::TWO, mean, std_dev, mean, Utc::now());
        let spreads = calculator.compute(&snapshot, price);
        let (lo, hi) = calculator.bounds();

        prop_assert!(spreads.volatility >= Decimal::ZERO && spreads.volatility <= Decimal::ONE);
        prop_assert!(spreads.buy >= lo && spreads.buy <= hi, "buy {} outside [{}, {}]", spreads.buy, lo, hi);
        prop_assert!(spreads.sell >= lo && spreads.sell <= hi, "sell {} outside [{}, {}]", spreads.sell, lo, hi);
    }
}

// ── 5. Ledger ────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn oversell_leaves_position_unchanged(
        buys in prop::collection::vec((arb_price(), arb_quantity()), 1..8),
        excess in arb_quantity(),
    ) {
        let mut ledger = PositionLedger::new();
        for (price, quantity) in &buys {
            ledger.apply_fill(Side::Buy, *price, *quantity).unwrap();
        }
        let before = ledger.position().clone();
        let realized = ledger.realized_pnl();

        let result = ledger.apply_fill(Side::Sell, Decimal::from(100), before.quantity_held + excess);
        prop_assert!(result.is_err());
        prop_assert_eq!(ledger.position(), &before);
        prop_assert_eq!(ledger.realized_pnl(), realized);
    }

    #[test]
    fn cost_basis_between_fill_prices(buys in prop::collection::vec((arb_price(), arb_quantity()), 1..8)) {
        let mut ledger = PositionLedger::new();
        for (price, quantity) in &buys {
            ledger.apply_fill(Side::Buy, *price, *quantity).unwrap();
        }
        let lowest = buys.iter().map(|(p, _)| *p).min().unwrap();
        let highest = buys.iter().map(|(p, _)| *p).max().unwrap();
        let basis = ledger.position().average_cost_basis.unwrap();
        // Allow for the last digit of decimal division
        let tolerance = Decimal::new(1, 20);
        prop_assert!(basis >= lowest - tolerance && basis <= highest + tolerance);
    }
}
