// Per-tick order decisions
//
// One evaluation yields exactly one action. Order of precedence:
// triggered risk exit, pause, indicator readiness, sell gates, buy gates.

use std::fmt;

use rust_decimal::{Decimal, RoundingStrategy};
use tracing::debug;

use crate::config::{Config, EntryConfig, MarketConfig};
use crate::core::indicators::{BandReading, BandSnapshot};
use crate::core::position_ledger::Position;
use crate::core::position_sizer::PositionSizer;
use crate::core::risk::RiskState;
use crate::core::spread::{SpreadCalculator, Spreads};
use crate::core::types::{Balances, IntentReason, OrderIntent, OrderKind, Side, Timeframe};

/// Why one side of the book was not quoted
#[derive(Debug, Clone, PartialEq)]
pub enum Blocker {
    OutsideBand,
    AboveMean,
    NoInventory,
    BelowMinProfit { floor: Decimal },
    ZeroQuantity,
    InsufficientBalance { required: Decimal, available: Decimal },
}

impl fmt::Display for Blocker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Blocker::OutsideBand => write!(f, "outside short band"),
            Blocker::AboveMean => write!(f, "above long mean"),
            Blocker::NoInventory => write!(f, "no inventory"),
            Blocker::BelowMinProfit { floor } => write!(f, "below profit floor {}", floor),
            Blocker::ZeroQuantity => write!(f, "quantity rounds to zero"),
            Blocker::InsufficientBalance { required, available } => {
                write!(f, "insufficient balance ({} needed, {} available)", required, available)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum HoldReason {
    Paused,
    InsufficientData { timeframe: Timeframe, observed: usize, period: usize },
    /// Exit triggered while nothing is held
    NothingToExit,
    Blocked { buy: Blocker, sell: Blocker },
}

impl fmt::Display for HoldReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HoldReason::Paused => write!(f, "paused"),
            HoldReason::InsufficientData { timeframe, observed, period } => {
                write!(f, "{} band warming up ({}/{})", timeframe, observed, period)
            }
            HoldReason::NothingToExit => write!(f, "exit triggered with no inventory"),
            HoldReason::Blocked { buy, sell } => write!(f, "buy: {}; sell: {}", buy, sell),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Buy(OrderIntent),
    Sell(OrderIntent),
    ForcedExit(OrderIntent),
    Hold(HoldReason),
}

impl Action {
    pub fn intent(&self) -> Option<&OrderIntent> {
        match self {
            Action::Buy(intent) | Action::Sell(intent) | Action::ForcedExit(intent) => Some(intent),
            Action::Hold(_) => None,
        }
    }

    pub fn is_hold(&self) -> bool {
        matches!(self, Action::Hold(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub action: Action,
    pub risk_state: RiskState,
    /// Present once both bands are ready
    pub spreads: Option<Spreads>,
}

/// Everything one tick is evaluated against
#[derive(Debug, Clone, Copy)]
pub struct TickContext<'a> {
    pub price: Decimal,
    pub risk_state: RiskState,
    pub position: &'a Position,
    pub long: &'a BandReading,
    pub short: &'a BandReading,
    pub balances: &'a Balances,
}

pub struct OrderDecisionEngine {
    sizer: PositionSizer,
    spreads: SpreadCalculator,
    entry: EntryConfig,
    market: MarketConfig,
}

impl OrderDecisionEngine {
    pub fn new(config: &Config) -> Self {
        Self {
            sizer: PositionSizer::new(config.sizing.clone()),
            spreads: SpreadCalculator::new(config.spread.clone()),
            entry: config.entry.clone(),
            market: config.market.clone(),
        }
    }

    pub fn sizer(&self) -> &PositionSizer {
        &self.sizer
    }

    pub fn spread_calculator(&self) -> &SpreadCalculator {
        &self.spreads
    }

    pub fn decide(&self, ctx: &TickContext<'_>) -> Decision {
        let hold = |reason: HoldReason, spreads: Option<Spreads>| Decision {
            action: Action::Hold(reason),
            risk_state: ctx.risk_state,
            spreads,
        };

        // 1. Risk exits override everything, including a pause
        if ctx.risk_state.is_triggered() {
            return match self.forced_exit(ctx) {
                Some(intent) => Decision {
                    action: Action::ForcedExit(intent),
                    risk_state: ctx.risk_state,
                    spreads: None,
                },
                None => hold(HoldReason::NothingToExit, None),
            };
        }

        // 2. Pause suppresses new quotes
        if ctx.risk_state == RiskState::Paused {
            return hold(HoldReason::Paused, None);
        }

        // 3. Both bands must be final
        let (long, short) = match (ctx.long, ctx.short) {
            (BandReading::Ready(long), BandReading::Ready(short)) => (long, short),
            (BandReading::NotReady { timeframe, observed, period }, _)
            | (_, BandReading::NotReady { timeframe, observed, period }) => {
                return hold(
                    HoldReason::InsufficientData {
                        timeframe: *timeframe,
                        observed: *observed,
                        period: *period,
                    },
                    None,
                );
            }
        };

        let spreads = self.spreads.compute(short, ctx.price);

        // 4./5. Sell is checked first and wins when both sides qualify
        let sell = self.sell_gate(ctx, short, &spreads);
        let buy = self.buy_gate(ctx, long, short, &spreads);

        let action = match (sell, buy) {
            (Ok(intent), _) => Action::Sell(intent),
            (Err(_), Ok(intent)) => Action::Buy(intent),
            (Err(sell), Err(buy)) => Action::Hold(HoldReason::Blocked { buy, sell }),
        };

        debug!("Decision at {}: {:?}", ctx.price, action);

        Decision {
            action,
            risk_state: ctx.risk_state,
            spreads: Some(spreads),
        }
    }

    fn forced_exit(&self, ctx: &TickContext<'_>) -> Option<OrderIntent> {
        if ctx.position.quantity_held <= Decimal::ZERO {
            return None;
        }
        let reason = match ctx.risk_state {
            RiskState::TakeProfitTriggered => IntentReason::TakeProfit,
            _ => IntentReason::StopLoss,
        };
        // Full inventory, unrounded, so the fill flattens the ledger exactly
        Some(OrderIntent {
            side: Side::Sell,
            kind: OrderKind::Market,
            price: ctx.price,
            quantity: ctx.position.quantity_held,
            reason,
        })
    }

    fn buy_gate(
        &self,
        ctx: &TickContext<'_>,
        long: &BandSnapshot,
        short: &BandSnapshot,
        spreads: &Spreads,
    ) -> Result<OrderIntent, Blocker> {
        if self.entry.trade_in_band && !short.contains(ctx.price) {
            return Err(Blocker::OutsideBand);
        }
        if self.entry.buy_below_sma && ctx.price >= long.mean {
            return Err(Blocker::AboveMean);
        }

        let quantity = self.round_quantity(self.sizer.order_quantity(long.position_of(ctx.price), ctx.price));
        if quantity <= Decimal::ZERO {
            return Err(Blocker::ZeroQuantity);
        }

        let price = self.round_price(ctx.price * (Decimal::ONE - spreads.buy), Side::Buy);
        let required = price * quantity;
        let available = ctx.balances.spendable_quote(self.entry.include_borrowed);
        if required > available {
            return Err(Blocker::InsufficientBalance { required, available });
        }

        Ok(OrderIntent {
            side: Side::Buy,
            kind: OrderKind::Limit,
            price,
            quantity,
            reason: IntentReason::BandEntry,
        })
    }

    fn sell_gate(&self, ctx: &TickContext<'_>, short: &BandSnapshot, spreads: &Spreads) -> Result<OrderIntent, Blocker> {
        let held = ctx.position.quantity_held;
        let basis = match ctx.position.average_cost_basis {
            Some(basis) if held > Decimal::ZERO => basis,
            _ => return Err(Blocker::NoInventory),
        };

        let floor = basis * (Decimal::ONE + self.entry.min_profit_spread);
        if ctx.price < floor {
            return Err(Blocker::BelowMinProfit { floor });
        }
        if self.entry.trade_in_band && !short.contains(ctx.price) {
            return Err(Blocker::OutsideBand);
        }

        let quantity = self.round_quantity(self.sizer.base_size(ctx.price)).min(held);
        if quantity <= Decimal::ZERO {
            return Err(Blocker::ZeroQuantity);
        }

        let available = ctx.balances.sellable_base(self.entry.include_borrowed);
        if quantity > available {
            return Err(Blocker::InsufficientBalance {
                required: quantity,
                available,
            });
        }

        Ok(OrderIntent {
            side: Side::Sell,
            kind: OrderKind::Limit,
            price: self.round_price(ctx.price * (Decimal::ONE + spreads.sell), Side::Sell),
            quantity,
            reason: IntentReason::ProfitExit,
        })
    }

    /// Never round a quote to a more aggressive price than computed
    pub fn round_price(&self, price: Decimal, side: Side) -> Decimal {
        let strategy = match side {
            Side::Buy => RoundingStrategy::ToZero,
            Side::Sell => RoundingStrategy::AwayFromZero,
        };
        price.round_dp_with_strategy(self.market.price_precision, strategy)
    }

    pub fn round_quantity(&self, quantity: Decimal) -> Decimal {
        quantity.round_dp_with_strategy(self.market.quantity_precision, RoundingStrategy::ToZero)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SizingConfig;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn config() -> Config {
        let mut config = Config::default();
        config.sizing = SizingConfig {
            base_order_size: dec!(1),
            ..SizingConfig::default()
        };
        config.market.quantity_precision = 4;
        config
    }

    fn ready(timeframe: Timeframe, mean: Decimal, std_dev: Decimal) -> BandReading {
        BandReading::Ready(BandSnapshot::from_stats(timeframe, 21, dec!(2), mean, std_dev, mean, Utc::now()))
    }

    fn rich() -> Balances {
        Balances {
            base: dec!(100),
            quote: dec!(100000),
            ..Balances::default()
        }
    }

    #[test]
    fn test_lower_band_buys_capped_max_scale() {
        let engine = OrderDecisionEngine::new(&config());
        let long = ready(Timeframe::Long, dec!(100), dec!(2));
        let short = ready(Timeframe::Short, dec!(97), dec!(2));
        let position = Position::default();
        let balances = rich();

        let decision = engine.decide(&TickContext {
            price: dec!(96),
            risk_state: RiskState::Normal,
            position: &position,
            long: &long,
            short: &short,
            balances: &balances,
        });

        match decision.action {
            Action::Buy(intent) => {
                // scale 10 capped at 5x base
                assert_eq!(intent.quantity, dec!(5));
                assert!(intent.price < dec!(96));
                assert_eq!(intent.kind, OrderKind::Limit);
            }
            other => panic!("expected buy, got {:?}", other),
        }
    }

    #[test]
    fn test_forced_exit_overrides_everything() {
        let engine = OrderDecisionEngine::new(&config());
        let not_ready = BandReading::NotReady {
            timeframe: Timeframe::Long,
            observed: 3,
            period: 21,
        };
        let position = Position {
            quantity_held: dec!(2.5),
            average_cost_basis: Some(dec!(100)),
            borrowed_quantity: dec!(0),
        };
        let balances = Balances::default();

        let decision = engine.decide(&TickContext {
            price: dec!(96),
            risk_state: RiskState::StopLossTriggered,
            position: &position,
            long: &not_ready,
            short: &not_ready,
            balances: &balances,
        });

        let intent = match decision.action {
            Action::ForcedExit(intent) => intent,
            other => panic!("expected forced exit, got {:?}", other),
        };
        assert_eq!(intent.kind, OrderKind::Market);
        assert_eq!(intent.quantity, dec!(2.5));
        assert_eq!(intent.reason, IntentReason::StopLoss);
    }

    #[test]
    fn test_not_ready_and_paused_hold() {
        let engine = OrderDecisionEngine::new(&config());
        let long = ready(Timeframe::Long, dec!(100), dec!(2));
        let short = BandReading::NotReady {
            timeframe: Timeframe::Short,
            observed: 20,
            period: 21,
        };
        let position = Position::default();
        let balances = rich();
        let mut ctx = TickContext {
            price: dec!(100),
            risk_state: RiskState::Normal,
            position: &position,
            long: &long,
            short: &short,
            balances: &balances,
        };

        assert!(matches!(
            engine.decide(&ctx).action,
            Action::Hold(HoldReason::InsufficientData { timeframe: Timeframe::Short, observed: 20, .. })
        ));

        ctx.risk_state = RiskState::Paused;
        assert_eq!(engine.decide(&ctx).action, Action::Hold(HoldReason::Paused));
    }

    #[test]
    fn test_sell_wins_over_buy() {
        let engine = OrderDecisionEngine::new(&config());
        let long = ready(Timeframe::Long, dec!(100), dec!(2));
        let short = ready(Timeframe::Short, dec!(100), dec!(2));
        let position = Position {
            quantity_held: dec!(3),
            average_cost_basis: Some(dec!(90)),
            borrowed_quantity: dec!(0),
        };
        let balances = rich();

        let decision = engine.decide(&TickContext {
            price: dec!(100),
            risk_state: RiskState::Normal,
            position: &position,
            long: &long,
            short: &short,
            balances: &balances,
        });

        match decision.action {
            Action::Sell(intent) => {
                assert_eq!(intent.quantity, dec!(1));
                assert!(intent.price > dec!(100));
            }
            other => panic!("expected sell, got {:?}", other),
        }
    }

    #[test]
    fn test_blocked_sides_report_reasons() {
        let engine = OrderDecisionEngine::new(&config());
        let long = ready(Timeframe::Long, dec!(100), dec!(2));
        let short = ready(Timeframe::Short, dec!(100), dec!(2));
        let position = Position {
            quantity_held: dec!(1),
            average_cost_basis: Some(dec!(100)),
            borrowed_quantity: dec!(0),
        };
        let balances = Balances {
            base: dec!(1),
            quote: dec!(10),
            ..Balances::default()
        };

        let decision = engine.decide(&TickContext {
            price: dec!(100),
            risk_state: RiskState::Normal,
            position: &position,
            long: &long,
            short: &short,
            balances: &balances,
        });

        match decision.action {
            Action::Hold(HoldReason::Blocked { buy, sell }) => {
                assert!(matches!(buy, Blocker::InsufficientBalance { .. }));
                assert!(matches!(sell, Blocker::BelowMinProfit { .. }));
            }
            other => panic!("expected hold, got {:?}", other),
        }
    }

    #[test]
    fn test_buy_below_sma_gate() {
        let mut config = config();
        config.entry.buy_below_sma = true;
        let engine = OrderDecisionEngine::new(&config);
        let long = ready(Timeframe::Long, dec!(100), dec!(2));
        let short = ready(Timeframe::Short, dec!(101), dec!(2));
        let position = Position::default();
        let balances = rich();

        let decision = engine.decide(&TickContext {
            price: dec!(101),
            risk_state: RiskState::Normal,
            position: &position,
            long: &long,
            short: &short,
            balances: &balances,
        });
        assert!(matches!(
            decision.action,
            Action::Hold(HoldReason::Blocked { buy: Blocker::AboveMean, .. })
        ));
    }

    #[test]
    fn test_rounding_never_improves_price() {
        let engine = OrderDecisionEngine::new(&config());
        assert_eq!(engine.round_price(dec!(99.979), Side::Buy), dec!(99.97));
        assert_eq!(engine.round_price(dec!(100.021), Side::Sell), dec!(100.03));
        assert_eq!(engine.round_quantity(dec!(0.123456)), dec!(0.1234));
    }
}
