// Inventory and weighted-average cost basis for the traded pair

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::types::{Fill, Side};
use crate::error::{TradingError, TradingResult};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub quantity_held: Decimal,
    /// Undefined while flat
    pub average_cost_basis: Option<Decimal>,
    pub borrowed_quantity: Decimal,
}

impl Position {
    pub fn is_flat(&self) -> bool {
        self.quantity_held.is_zero()
    }

    pub fn market_value(&self, price: Decimal) -> Decimal {
        self.quantity_held * price
    }

    pub fn unrealized_pnl(&self, price: Decimal) -> Decimal {
        match self.average_cost_basis {
            Some(basis) => self.quantity_held * (price - basis),
            None => Decimal::ZERO,
        }
    }
}

/// Result of applying one confirmed fill
#[derive(Debug, Clone, PartialEq)]
pub struct FillOutcome {
    /// Only reported for sells
    pub realized_pnl: Option<Decimal>,
    pub position: Position,
    pub closed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct PositionLedger {
    position: Position,
    realized_pnl: Decimal,
    fills_applied: u64,
    last_updated: Option<DateTime<Utc>>,
}

impl PositionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume from a stored position
    pub fn restore(position: Position) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn realized_pnl(&self) -> Decimal {
        self.realized_pnl
    }

    pub fn fills_applied(&self) -> u64 {
        self.fills_applied
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.last_updated
    }

    /// Record the exchange's borrow adjustment on the base asset
    pub fn set_borrowed(&mut self, quantity: Decimal) {
        self.position.borrowed_quantity = quantity.max(Decimal::ZERO);
    }

    pub fn apply(&mut self, fill: &Fill) -> TradingResult<FillOutcome> {
        let outcome = self.apply_fill(fill.side, fill.price, fill.quantity)?;
        self.last_updated = Some(fill.timestamp);
        Ok(outcome)
    }

    /// The only place quantity and cost basis change. Validation happens before
    /// any mutation so a rejected fill leaves the position untouched.
    pub fn apply_fill(&mut self, side: Side, price: Decimal, quantity: Decimal) -> TradingResult<FillOutcome> {
        if price <= Decimal::ZERO {
            return Err(TradingError::InvalidFill(format!("non-positive price {}", price)));
        }
        if quantity <= Decimal::ZERO {
            return Err(TradingError::InvalidFill(format!("non-positive quantity {}", quantity)));
        }

        let realized_pnl = match side {
            Side::Buy => {
                let held = self.position.quantity_held;
                let basis = self.position.average_cost_basis.unwrap_or(Decimal::ZERO);
                let new_qty = held + quantity;
                self.position.average_cost_basis = Some((held * basis + quantity * price) / new_qty);
                self.position.quantity_held = new_qty;
                None
            }
            Side::Sell => {
                if quantity > self.position.quantity_held {
                    return Err(TradingError::InvalidFill(format!(
                        "sell of {} exceeds held quantity {}",
                        quantity, self.position.quantity_held
                    )));
                }
                let basis = self.position.average_cost_basis.unwrap_or(price);
                let pnl = quantity * (price - basis);
                self.position.quantity_held -= quantity;
                if self.position.quantity_held.is_zero() {
                    self.position.average_cost_basis = None;
                }
                self.realized_pnl += pnl;
                Some(pnl)
            }
        };

        self.fills_applied += 1;
        let closed = side == Side::Sell && self.position.is_flat();

        match realized_pnl {
            Some(pnl) => info!(
                "💰 {} {} @ {} | held {} | realized {:+}",
                side, quantity, price, self.position.quantity_held, pnl
            ),
            None => info!(
                "📦 {} {} @ {} | held {} | basis {}",
                side,
                quantity,
                price,
                self.position.quantity_held,
                self.position.average_cost_basis.unwrap_or_default()
            ),
        }
        if closed {
            debug!("Position closed, cost basis cleared");
        }

        Ok(FillOutcome {
            realized_pnl,
            position: self.position.clone(),
            closed,
        })
    }
}
