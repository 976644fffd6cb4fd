// Stop-loss / take-profit lifecycle and breakout pause
//
// Lifecycle per position: Normal -> StopLossArmed -> StopLossTriggered, or
// Normal/StopLossArmed -> TakeProfitTriggered. Armed may fall back to Normal,
// triggered states only clear when the position goes flat. Pause is tracked
// separately and never masks a triggered exit.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::RiskConfig;
use crate::core::indicators::BandSnapshot;
use crate::core::position_ledger::Position;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskState {
    Normal,
    StopLossArmed,
    StopLossTriggered,
    TakeProfitTriggered,
    Paused,
}

impl RiskState {
    pub fn is_triggered(&self) -> bool {
        matches!(self, RiskState::StopLossTriggered | RiskState::TakeProfitTriggered)
    }
}

impl fmt::Display for RiskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RiskState::Normal => "normal",
            RiskState::StopLossArmed => "stop-loss armed",
            RiskState::StopLossTriggered => "stop-loss triggered",
            RiskState::TakeProfitTriggered => "take-profit triggered",
            RiskState::Paused => "paused",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct RiskController {
    config: RiskConfig,
    pause_outside_band: bool,
    log_transitions: bool,
    lifecycle: RiskState,
    paused: bool,
}

impl RiskController {
    pub fn new(config: RiskConfig, pause_outside_band: bool) -> Self {
        Self {
            config,
            pause_outside_band,
            log_transitions: true,
            lifecycle: RiskState::Normal,
            paused: false,
        }
    }

    pub fn with_transition_logging(mut self, enabled: bool) -> Self {
        self.log_transitions = enabled;
        self
    }

    /// Effective state: a triggered exit outranks a pause
    pub fn state(&self) -> RiskState {
        if self.lifecycle.is_triggered() {
            self.lifecycle
        } else if self.paused {
            RiskState::Paused
        } else {
            self.lifecycle
        }
    }

    /// Lifecycle state ignoring the pause flag
    pub fn lifecycle(&self) -> RiskState {
        self.lifecycle
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// `(basis − price) / basis`, None when flat
    pub fn drawdown(price: Decimal, position: &Position) -> Option<Decimal> {
        Self::basis(position).map(|basis| (basis - price) / basis)
    }

    /// `(price − basis) / basis`, None when flat
    pub fn gain(price: Decimal, position: &Position) -> Option<Decimal> {
        Self::basis(position).map(|basis| (price - basis) / basis)
    }

    fn basis(position: &Position) -> Option<Decimal> {
        if position.quantity_held <= Decimal::ZERO {
            return None;
        }
        position.average_cost_basis.filter(|b| *b > Decimal::ZERO)
    }

    /// Advance the state machine for one tick
    pub fn evaluate(&mut self, price: Decimal, position: &Position, short: Option<&BandSnapshot>) -> RiskState {
        let before = self.state();

        self.paused = match short {
            Some(band) if self.pause_outside_band => !band.contains(price),
            _ => false,
        };

        match (Self::drawdown(price, position), Self::gain(price, position)) {
            (Some(drawdown), Some(gain)) => self.advance(drawdown, gain),
            _ => self.lifecycle = RiskState::Normal,
        }

        let after = self.state();
        if after != before {
            self.log_transition(before, after, price);
        }
        after
    }

    fn advance(&mut self, drawdown: Decimal, gain: Decimal) {
        if self.lifecycle.is_triggered() {
            return;
        }

        if gain >= self.config.take_profit_ratio {
            self.lifecycle = RiskState::TakeProfitTriggered;
            return;
        }

        if drawdown >= self.config.stop_loss_activation {
            // A gap through both thresholds arms and triggers in the same tick
            self.lifecycle = if drawdown >= self.config.stop_loss_ratio {
                RiskState::StopLossTriggered
            } else {
                RiskState::StopLossArmed
            };
        } else if self.lifecycle == RiskState::StopLossArmed {
            self.lifecycle = RiskState::Normal;
        }
    }

    /// New position lifecycle; called once the position is flat again
    pub fn reset(&mut self) {
        if self.lifecycle != RiskState::Normal {
            debug!("Risk lifecycle reset from {}", self.lifecycle);
        }
        self.lifecycle = RiskState::Normal;
    }

    fn log_transition(&self, from: RiskState, to: RiskState, price: Decimal) {
        if !self.log_transitions {
            return;
        }
        match to {
            RiskState::StopLossTriggered => warn!("🛑 Risk {} -> {} at {}", from, to, price),
            RiskState::TakeProfitTriggered => info!("🎯 Risk {} -> {} at {}", from, to, price),
            RiskState::Paused => info!("⏸️  Risk {} -> {} at {} (outside short band)", from, to, price),
            _ => info!("🛡️  Risk {} -> {} at {}", from, to, price),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Timeframe;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn held_at(basis: Decimal) -> Position {
        Position {
            quantity_held: dec!(1),
            average_cost_basis: Some(basis),
            borrowed_quantity: dec!(0),
        }
    }

    fn controller() -> RiskController {
        RiskController::new(RiskConfig::default(), true)
    }

    #[test]
    fn test_stop_loss_arms_then_triggers_at_exact_thresholds() {
        let mut risk = controller();
        let position = held_at(dec!(100));

        let states: Vec<RiskState> = [dec!(100), dec!(98), dec!(97)]
            .into_iter()
            .map(|price| risk.evaluate(price, &position, None))
            .collect();

        assert_eq!(
            states,
            vec![RiskState::Normal, RiskState::StopLossArmed, RiskState::StopLossTriggered]
        );
    }

    #[test]
    fn test_take_profit_at_exact_gain() {
        let mut risk = controller();
        assert_eq!(risk.evaluate(dec!(106.99), &held_at(dec!(100)), None), RiskState::Normal);
        assert_eq!(risk.evaluate(dec!(107), &held_at(dec!(100)), None), RiskState::TakeProfitTriggered);
    }

    #[test]
    fn test_armed_recovers_but_triggered_is_sticky() {
        let mut risk = controller();
        let position = held_at(dec!(100));

        assert_eq!(risk.evaluate(dec!(98), &position, None), RiskState::StopLossArmed);
        assert_eq!(risk.evaluate(dec!(99), &position, None), RiskState::Normal);

        assert_eq!(risk.evaluate(dec!(96), &position, None), RiskState::StopLossTriggered);
        assert_eq!(risk.evaluate(dec!(101), &position, None), RiskState::StopLossTriggered);
        assert_eq!(risk.evaluate(dec!(110), &position, None), RiskState::StopLossTriggered);
    }

    #[test]
    fn test_flat_position_resets_lifecycle() {
        let mut risk = controller();
        risk.evaluate(dec!(90), &held_at(dec!(100)), None);
        assert_eq!(risk.state(), RiskState::StopLossTriggered);

        assert_eq!(risk.evaluate(dec!(90), &Position::default(), None), RiskState::Normal);
    }

    #[test]
    fn test_pause_outside_short_band_never_masks_exit() {
        let mut risk = controller();
        // mean 100, std 1, k 2 -> band [98, 102]
        let band = BandSnapshot::from_stats(Timeframe::Short, 21, dec!(2), dec!(100), dec!(1), dec!(100), Utc::now());

        assert_eq!(risk.evaluate(dec!(103), &Position::default(), Some(&band)), RiskState::Paused);
        assert_eq!(risk.evaluate(dec!(101), &Position::default(), Some(&band)), RiskState::Normal);

        let state = risk.evaluate(dec!(90), &held_at(dec!(100)), Some(&band));
        assert_eq!(state, RiskState::StopLossTriggered);
        assert!(risk.is_paused());
    }

    #[test]
    fn test_pause_disabled() {
        let mut risk = RiskController::new(RiskConfig::default(), false);
        let band = BandSnapshot::from_stats(Timeframe::Short, 21, dec!(2), dec!(100), dec!(1), dec!(100), Utc::now());
        assert_eq!(risk.evaluate(dec!(120), &Position::default(), Some(&band)), RiskState::Normal);
    }
}
