// Paper exchange for dry runs and replays
//
// Fills at the intent's limit price (market intents at the reference price)
// and settles balances locally. Intents the balance cannot cover are rejected,
// the way a real venue would.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::core::types::{Balances, Fill, OrderIntent, OrderKind, Side};
use crate::error::{TradingError, TradingResult};
use crate::execution::{ExecutionClient, SubmitOutcome};

/// Fee structure in basis points of notional, charged in quote currency
#[derive(Debug, Clone, PartialEq)]
pub struct FeeConfig {
    pub maker_fee_bps: Decimal,
    pub taker_fee_bps: Decimal,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            maker_fee_bps: Decimal::ZERO,
            taker_fee_bps: Decimal::ZERO,
        }
    }
}

impl FeeConfig {
    /// Typical spot venue: 0.16% maker, 0.26% taker
    pub fn standard() -> Self {
        Self {
            maker_fee_bps: dec!(16),
            taker_fee_bps: dec!(26),
        }
    }

    fn fee(&self, kind: OrderKind, notional: Decimal) -> Decimal {
        let bps = match kind {
            OrderKind::Limit => self.maker_fee_bps,
            OrderKind::Market => self.taker_fee_bps,
        };
        notional * bps / dec!(10000)
    }
}

#[derive(Debug, Clone)]
pub struct PaperExchange {
    balances: Balances,
    fees: FeeConfig,
    immediate_fills: bool,
    resting: HashMap<String, OrderIntent>,
    cancelled: Vec<String>,
    fills: Vec<Fill>,
    total_fees: Decimal,
    clock: Option<DateTime<Utc>>,
}

impl PaperExchange {
    pub fn new(balances: Balances) -> Self {
        Self {
            balances,
            fees: FeeConfig::default(),
            immediate_fills: true,
            resting: HashMap::new(),
            cancelled: Vec::new(),
            fills: Vec::new(),
            total_fees: Decimal::ZERO,
            clock: None,
        }
    }

    pub fn with_fees(mut self, fees: FeeConfig) -> Self {
        self.fees = fees;
        self
    }

    /// Leave limit intents resting until `fill_resting` is called
    pub fn with_resting_orders(mut self) -> Self {
        self.immediate_fills = false;
        self
    }

    /// Pin fill timestamps to feed time instead of wall-clock time
    pub fn set_clock(&mut self, at: DateTime<Utc>) {
        self.clock = Some(at);
    }

    pub fn resting_orders(&self) -> impl Iterator<Item = (&String, &OrderIntent)> {
        self.resting.iter()
    }

    pub fn cancelled(&self) -> &[String] {
        &self.cancelled
    }

    pub fn fills(&self) -> &[Fill] {
        &self.fills
    }

    pub fn total_fees(&self) -> Decimal {
        self.total_fees
    }

    /// Fill a resting order in full at its limit price
    pub fn fill_resting(&mut self, order_id: &str) -> TradingResult<Fill> {
        let intent = self
            .resting
            .remove(order_id)
            .ok_or_else(|| TradingError::Execution(format!("unknown order {}", order_id)))?;
        if let Err(reason) = self.check_cover(&intent) {
            warn!("❌ Paper fill of {} rejected: {}", order_id, reason);
            return Err(TradingError::ExecutionRejected(reason));
        }
        Ok(self.settle(order_id.to_string(), &intent))
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.unwrap_or_else(Utc::now)
    }

    fn check_cover(&self, intent: &OrderIntent) -> Result<(), String> {
        match intent.side {
            Side::Buy => {
                let required = intent.notional() + self.fees.fee(intent.kind, intent.notional());
                if required > self.balances.quote {
                    return Err(format!(
                        "insufficient quote balance: {} required, {} available",
                        required, self.balances.quote
                    ));
                }
            }
            Side::Sell => {
                if intent.quantity > self.balances.base {
                    return Err(format!(
                        "insufficient base balance: {} required, {} available",
                        intent.quantity, self.balances.base
                    ));
                }
            }
        }
        Ok(())
    }

    fn settle(&mut self, order_id: String, intent: &OrderIntent) -> Fill {
        let notional = intent.notional();
        let fee = self.fees.fee(intent.kind, notional);
        match intent.side {
            Side::Buy => {
                self.balances.base += intent.quantity;
                self.balances.quote -= notional + fee;
            }
            Side::Sell => {
                self.balances.base -= intent.quantity;
                self.balances.quote += notional - fee;
            }
        }
        self.total_fees += fee;

        let fill = Fill {
            order_id,
            side: intent.side,
            price: intent.price,
            quantity: intent.quantity,
            timestamp: self.now(),
        };
        debug!(
            "Paper fill {} {} @ {} (fee {}) -> base {}, quote {}",
            fill.side, fill.quantity, fill.price, fee, self.balances.base, self.balances.quote
        );
        self.fills.push(fill.clone());
        fill
    }
}

impl ExecutionClient for PaperExchange {
    fn submit(&mut self, intent: &OrderIntent) -> TradingResult<SubmitOutcome> {
        if intent.price <= Decimal::ZERO || intent.quantity <= Decimal::ZERO {
            return Ok(SubmitOutcome::Rejected {
                reason: format!("invalid order {} @ {}", intent.quantity, intent.price),
            });
        }
        if let Err(reason) = self.check_cover(intent) {
            return Ok(SubmitOutcome::Rejected { reason });
        }

        let order_id = Uuid::new_v4().to_string();
        if self.immediate_fills || intent.kind == OrderKind::Market {
            return Ok(SubmitOutcome::Filled(self.settle(order_id, intent)));
        }

        self.resting.insert(order_id.clone(), intent.clone());
        Ok(SubmitOutcome::Resting { order_id })
    }

    fn cancel(&mut self, order_id: &str) -> TradingResult<()> {
        if self.resting.remove(order_id).is_some() {
            self.cancelled.push(order_id.to_string());
        }
        Ok(())
    }

    fn balances(&self) -> TradingResult<Balances> {
        Ok(self.balances.clone())
    }

    fn observe_time(&mut self, at: DateTime<Utc>) {
        self.set_clock(at);
    }
}
