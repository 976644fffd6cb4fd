//! Dynamic bid/ask spreads from short-timeframe volatility and trend
//!
//! The band width relative to the mean is mapped linearly onto
//! `[volatility_floor, volatility_ceiling]` to get v in [0, 1], and the base
//! spread interpolates `spread_min..spread_max` by v. Trend skew then splits the
//! base spread between the two sides:
//!
//! | trend   | complementary                      | one_sided                  | sell_anchored                      |
//! |---------|------------------------------------|----------------------------|------------------------------------|
//! | up      | sell = b·up,   buy = b·(2 − up)    | sell = b·up,   buy = b     | sell = b·up,   buy = b·(2 − up)    |
//! | down    | buy = b·down,  sell = b·(2 − down) | buy = b·down,  sell = b    | sell = b·down, buy = b·(2 − down)  |
//! | neutral | buy = sell = b                     | buy = sell = b             | buy = sell = b                     |
//!
//! With `up < 1 < down` and `up + down = 2` (the defaults), complementary
//! quotes the same pair of spreads in either trend. Only `sell_anchored`
//! then tells the trends apart.
//!
//! Trend is the sign of the short-timeframe band position (price vs. short SMA).
//! No clamp is applied after skewing.

use rust_decimal::Decimal;
use tracing::debug;

use crate::config::{SkewFormula, SpreadConfig};
use crate::core::indicators::BandSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendDirection {
    Up,
    Down,
    Neutral,
}

impl TrendDirection {
    pub fn from_position(position: Decimal) -> Self {
        if position > Decimal::ZERO {
            TrendDirection::Up
        } else if position < Decimal::ZERO {
            TrendDirection::Down
        } else {
            TrendDirection::Neutral
        }
    }
}

/// Fractional offsets applied to the reference price
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spreads {
    pub base: Decimal,
    pub buy: Decimal,
    pub sell: Decimal,
    pub volatility: Decimal,
    pub trend: TrendDirection,
}

#[derive(Debug, Clone)]
pub struct SpreadCalculator {
    config: SpreadConfig,
}

impl SpreadCalculator {
    pub fn new(config: SpreadConfig) -> Self {
        Self { config }
    }

    /// Band width ratio mapped into [0, 1] against the reference range
    pub fn normalized_volatility(&self, width_ratio: Decimal) -> Decimal {
        let floor = self.config.volatility_floor;
        let range = self.config.volatility_ceiling - floor;
        if range <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        ((width_ratio - floor) / range).clamp(Decimal::ZERO, Decimal::ONE)
    }

    /// `spread_min + v · (spread_max − spread_min)`
    pub fn base_spread(&self, volatility: Decimal) -> Decimal {
        let v = volatility.clamp(Decimal::ZERO, Decimal::ONE);
        self.config.spread_min + v * (self.config.spread_max - self.config.spread_min)
    }

    /// Split a base spread into (buy, sell) for the given trend
    pub fn skew(&self, base: Decimal, trend: TrendDirection) -> (Decimal, Decimal) {
        if !self.config.trend_skew {
            return (base, base);
        }

        let k = match trend {
            TrendDirection::Up => self.config.uptrend_skew,
            TrendDirection::Down => self.config.downtrend_skew,
            TrendDirection::Neutral => return (base, base),
        };
        let skewed = base * k;
        let complement = base * (Decimal::TWO - k);

        // (buy, sell)
        let (buy, sell) = match (self.config.skew_formula, trend) {
            (SkewFormula::SellAnchored, _) => (complement, skewed),
            (SkewFormula::Complementary, TrendDirection::Up) => (complement, skewed),
            (SkewFormula::Complementary, _) => (skewed, complement),
            (SkewFormula::OneSided, TrendDirection::Up) => (base, skewed),
            (SkewFormula::OneSided, _) => (skewed, base),
        };

        (buy.max(Decimal::ZERO), sell.max(Decimal::ZERO))
    }

    /// Spreads for a tick at `price` against the short-timeframe band
    pub fn compute(&self, short: &BandSnapshot, price: Decimal) -> Spreads {
        if !self.config.dynamic {
            let fixed = self.config.fixed_spread;
            return Spreads {
                base: fixed,
                buy: fixed,
                sell: fixed,
                volatility: Decimal::ZERO,
                trend: TrendDirection::Neutral,
            };
        }

        let volatility = self.normalized_volatility(short.width_ratio());
        let base = self.base_spread(volatility);
        let trend = TrendDirection::from_position(short.position_of(price));
        let (buy, sell) = self.skew(base, trend);

        debug!(
            "Spread: width {:.6}, v {:.4}, base {:.6}, trend {:?} -> buy {:.6} / sell {:.6}",
            short.width_ratio(),
            volatility,
            base,
            trend,
            buy,
            sell
        );

        Spreads {
            base,
            buy,
            sell,
            volatility,
            trend,
        }
    }

    /// Inclusive range every dynamic spread falls into
    pub fn bounds(&self) -> (Decimal, Decimal) {
        if !self.config.trend_skew {
            return (self.config.spread_min, self.config.spread_max);
        }
        let factors = [
            Decimal::ONE,
            self.config.uptrend_skew,
            Decimal::TWO - self.config.uptrend_skew,
            self.config.downtrend_skew,
            Decimal::TWO - self.config.downtrend_skew,
        ];
        let lo = factors.iter().copied().min().unwrap_or(Decimal::ONE);
        let hi = factors.iter().copied().max().unwrap_or(Decimal::ONE);
        (self.config.spread_min * lo, self.config.spread_max * hi)
    }
}
