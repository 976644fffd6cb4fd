// Order sizing from the long-timeframe band position
//
// Price at the lower band buys `max_scale` units of the base size, price at the
// upper band buys `min_scale` units, linear in between. The result is clamped to
// [0, max_order_multiple · B] no matter what the scale bounds say.

use rust_decimal::Decimal;

use crate::config::{SizingConfig, SizingUnit};

#[derive(Debug, Clone)]
pub struct PositionSizer {
    config: SizingConfig,
}

impl PositionSizer {
    pub fn new(config: SizingConfig) -> Self {
        Self { config }
    }

    /// `max_scale − (p + 1)/2 · (max_scale − min_scale)`, with p clamped to [-1, 1]
    pub fn scale(&self, position: Decimal) -> Decimal {
        let p = position.clamp(Decimal::NEGATIVE_ONE, Decimal::ONE);
        let span = self.config.max_position_scale - self.config.min_position_scale;
        self.config.max_position_scale - (p + Decimal::ONE) / Decimal::TWO * span
    }

    /// Base order size B in base units at the given price
    pub fn base_size(&self, price: Decimal) -> Decimal {
        match self.config.unit {
            SizingUnit::Base => self.config.base_order_size,
            SizingUnit::Quote if price > Decimal::ZERO => self.config.quote_order_size / price,
            SizingUnit::Quote => Decimal::ZERO,
        }
    }

    /// Hard ceiling for a single order
    pub fn max_quantity(&self, price: Decimal) -> Decimal {
        self.base_size(price) * self.config.max_order_multiple
    }

    /// `clamp(scale(p) · B, 0, max_order_multiple · B)`
    pub fn order_quantity(&self, position: Decimal, price: Decimal) -> Decimal {
        let base = self.base_size(price);
        (self.scale(position) * base).clamp(Decimal::ZERO, self.max_quantity(price))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sizer(min_scale: Decimal, max_scale: Decimal) -> PositionSizer {
        PositionSizer::new(SizingConfig {
            min_position_scale: min_scale,
            max_position_scale: max_scale,
            base_order_size: dec!(1),
            ..SizingConfig::default()
        })
    }

    #[test]
    fn test_scale_endpoints() {
        let sizer = sizer(dec!(1), dec!(3));
        assert_eq!(sizer.scale(dec!(-1)), dec!(3));
        assert_eq!(sizer.scale(dec!(0)), dec!(2));
        assert_eq!(sizer.scale(dec!(1)), dec!(1));
    }

    #[test]
    fn test_quantity_is_capped_at_five_times_base() {
        // Default scale bounds 1..10 would ask for 10x at the lower band
        let sizer = sizer(dec!(1), dec!(10));
        assert_eq!(sizer.order_quantity(dec!(-1), dec!(100)), dec!(5));
        assert_eq!(sizer.order_quantity(dec!(1), dec!(100)), dec!(1));
    }

    #[test]
    fn test_quote_denominated_sizing() {
        let sizer = PositionSizer::new(SizingConfig {
            unit: SizingUnit::Quote,
            quote_order_size: dec!(4),
            min_position_scale: dec!(1),
            max_position_scale: dec!(1),
            ..SizingConfig::default()
        });
        assert_eq!(sizer.base_size(dec!(200)), dec!(0.02));
        assert_eq!(sizer.order_quantity(dec!(0), dec!(200)), dec!(0.02));
        assert_eq!(sizer.order_quantity(dec!(0), Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn test_buy_size_shrinks_toward_upper_band() {
        let sizer = sizer(dec!(1), dec!(4));
        let sizes: Vec<Decimal> = [dec!(-1), dec!(-0.5), dec!(0), dec!(0.5), dec!(1)]
            .into_iter()
            .map(|p| sizer.order_quantity(p, dec!(100)))
            .collect();
        assert!(sizes.windows(2).all(|w| w[0] >= w[1]));
    }
}
