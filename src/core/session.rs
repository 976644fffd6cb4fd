// One market-making session for a single pair
//
// Owns every component and runs one tick end to end:
// balances -> risk -> decision -> cancel/submit -> ledger -> store.
// A tick fully completes before the next one starts.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::core::decision::{Action, Decision, HoldReason, OrderDecisionEngine, TickContext};
use crate::core::indicators::{BandReading, BarUpdate, IndicatorEngine};
use crate::core::position_ledger::{FillOutcome, Position, PositionLedger};
use crate::core::risk::{RiskController, RiskState};
use crate::core::types::{Fill, OrderIntent, PriceBar, Side, Timeframe};
use crate::db::{PositionStore, TradeRecord};
use crate::error::TradingResult;
use crate::execution::{ExecutionClient, SubmitOutcome};

/// Counters for the session summary
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionStats {
    pub ticks: u64,
    pub buys: u64,
    pub sells: u64,
    pub forced_exits: u64,
    pub holds: u64,
    pub throttled: u64,
    pub rejections: u64,
    pub fills: u64,
    pub cancels: u64,
}

/// What one tick did
#[derive(Debug, Clone)]
pub struct TickReport {
    pub at: DateTime<Utc>,
    pub price: Decimal,
    pub decision: Decision,
    pub cancelled: Vec<String>,
    pub submitted: Option<SubmitOutcome>,
    /// Set when the exchange rejected the intent; nothing is retried
    pub rejection: Option<String>,
    pub fill: Option<FillOutcome>,
    /// Quote suppressed by the re-quote interval
    pub throttled: bool,
}

impl TickReport {
    fn new(at: DateTime<Utc>, price: Decimal, decision: Decision) -> Self {
        Self {
            at,
            price,
            decision,
            cancelled: Vec::new(),
            submitted: None,
            rejection: None,
            fill: None,
            throttled: false,
        }
    }
}

pub struct MakerSession<E: ExecutionClient, S: PositionStore> {
    config: Config,
    indicators: IndicatorEngine,
    ledger: PositionLedger,
    risk: RiskController,
    decisions: OrderDecisionEngine,
    executor: E,
    store: S,
    open_orders: HashMap<Side, String>,
    last_quote_at: Option<DateTime<Utc>>,
    stats: SessionStats,
}

impl<E: ExecutionClient, S: PositionStore> MakerSession<E, S> {
    /// Validate the config, build the components and restore the stored position
    pub fn restore(config: Config, executor: E, store: S) -> TradingResult<Self> {
        config.validate()?;

        let position = store.load_position(&config.market.symbol)?.unwrap_or_default();
        if position.is_flat() {
            info!("🆕 Starting {} flat", config.market.symbol);
        } else {
            info!(
                "♻️  Restored {} position: {} @ {}",
                config.market.symbol,
                position.quantity_held,
                position.average_cost_basis.unwrap_or_default()
            );
        }

        let risk = RiskController::new(config.risk.clone(), config.entry.pause_outside_band)
            .with_transition_logging(config.logging.log_risk_transitions);

        Ok(Self {
            indicators: IndicatorEngine::new(&config.bands),
            ledger: PositionLedger::restore(position),
            risk,
            decisions: OrderDecisionEngine::new(&config),
            executor,
            store,
            open_orders: HashMap::new(),
            last_quote_at: None,
            stats: SessionStats::default(),
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn symbol(&self) -> &str {
        &self.config.market.symbol
    }

    pub fn position(&self) -> &Position {
        self.ledger.position()
    }

    pub fn realized_pnl(&self) -> Decimal {
        self.ledger.realized_pnl()
    }

    pub fn risk_state(&self) -> RiskState {
        self.risk.state()
    }

    pub fn indicators(&self) -> &IndicatorEngine {
        &self.indicators
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn executor_mut(&mut self) -> &mut E {
        &mut self.executor
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn open_order(&self, side: Side) -> Option<&str> {
        self.open_orders.get(&side).map(String::as_str)
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn on_bar(&mut self, timeframe: Timeframe, bar: &PriceBar) -> BarUpdate {
        let update = self.indicators.update(timeframe, bar);
        if self.config.logging.log_bands && update != BarUpdate::Stale {
            if let BandReading::Ready(band) = self.indicators.snapshot(timeframe) {
                info!(
                    "📈 {} band: mean {:.4} | lower {:.4} | upper {:.4} | pos {:.3}",
                    timeframe, band.mean, band.lower_band, band.upper_band, band.normalized_position
                );
            }
        }
        update
    }

    /// Run one evaluation tick at `price`
    pub fn on_price(&mut self, price: Decimal, at: DateTime<Utc>) -> TradingResult<TickReport> {
        self.stats.ticks += 1;
        self.executor.observe_time(at);

        let balances = self.executor.balances()?;
        let borrowed = if self.config.entry.include_borrowed {
            balances.borrowed_base
        } else {
            Decimal::ZERO
        };
        self.ledger.set_borrowed(borrowed);

        let long = self.indicators.snapshot(Timeframe::Long);
        let short = self.indicators.snapshot(Timeframe::Short);
        let risk_state = self.risk.evaluate(price, self.ledger.position(), short.ready());

        let decision = self.decisions.decide(&TickContext {
            price,
            risk_state,
            position: self.ledger.position(),
            long: &long,
            short: &short,
            balances: &balances,
        });

        if self.config.logging.log_ticks {
            self.log_tick(price, &decision);
        }

        let mut report = TickReport::new(at, price, decision.clone());
        match decision.action {
            Action::ForcedExit(intent) => {
                self.stats.forced_exits += 1;
                report.cancelled = self.cancel_all()?;
                self.submit(&intent, &mut report)?;
            }
            Action::Buy(intent) | Action::Sell(intent) => {
                if self.is_throttled(at) {
                    self.stats.throttled += 1;
                    report.throttled = true;
                    debug!("Re-quote throttled until {}s after last order", self.config.session.min_order_interval_secs);
                } else {
                    match intent.side {
                        Side::Buy => self.stats.buys += 1,
                        Side::Sell => self.stats.sells += 1,
                    }
                    if let Some(order_id) = self.cancel_side(intent.side)? {
                        report.cancelled.push(order_id);
                    }
                    self.last_quote_at = Some(at);
                    self.submit(&intent, &mut report)?;
                }
            }
            Action::Hold(HoldReason::Paused) => {
                self.stats.holds += 1;
                report.cancelled = self.cancel_all()?;
            }
            Action::Hold(_) => {
                self.stats.holds += 1;
            }
        }

        Ok(report)
    }

    /// Apply a confirmed fill: ledger, store, risk lifecycle, open orders
    ///
    /// The fill is applied to a copy of the ledger and only committed once the
    /// store has accepted it, so a storage failure leaves the session unchanged.
    pub fn on_fill(&mut self, fill: &Fill) -> TradingResult<FillOutcome> {
        let mut ledger = self.ledger.clone();
        let outcome = ledger.apply(fill)?;

        let symbol = self.config.market.symbol.clone();
        let keep_days = self.config.database.keep_days;
        let trade = TradeRecord::from_fill(&symbol, fill, outcome.realized_pnl);
        let pruned = self.store.commit_fill(&symbol, &outcome.position, &trade, keep_days)?;
        if pruned > 0 {
            debug!("Pruned {} trades older than {} days", pruned, keep_days);
        }

        self.ledger = ledger;
        self.stats.fills += 1;
        if outcome.closed {
            self.risk.reset();
        }
        self.open_orders.retain(|_, id| *id != fill.order_id);

        Ok(outcome)
    }

    /// Total account value in quote currency at `price`
    pub fn portfolio_value(&self, price: Decimal) -> TradingResult<Decimal> {
        let balances = self.executor.balances()?;
        Ok(balances.total_value(price, self.config.entry.include_borrowed))
    }

    fn is_throttled(&self, at: DateTime<Utc>) -> bool {
        let interval = self.config.session.min_order_interval_secs;
        match self.last_quote_at {
            // A clock running backwards counts as too soon
            Some(last) => u64::try_from((at - last).num_seconds()).map_or(true, |elapsed| elapsed < interval),
            None => false,
        }
    }

    fn submit(&mut self, intent: &OrderIntent, report: &mut TickReport) -> TradingResult<()> {
        let outcome = self.executor.submit(intent)?;
        match &outcome {
            SubmitOutcome::Filled(fill) => {
                report.fill = Some(self.on_fill(fill)?);
            }
            SubmitOutcome::Resting { order_id } => {
                info!(
                    "📝 {} {} @ {} resting ({})",
                    intent.side, intent.quantity, intent.price, order_id
                );
                self.open_orders.insert(intent.side, order_id.clone());
            }
            SubmitOutcome::Rejected { reason } => {
                self.stats.rejections += 1;
                warn!("❌ {} {} @ {} rejected: {}", intent.side, intent.quantity, intent.price, reason);
                report.rejection = Some(reason.clone());
            }
        }
        report.submitted = Some(outcome);
        Ok(())
    }

    fn cancel_side(&mut self, side: Side) -> TradingResult<Option<String>> {
        match self.open_orders.remove(&side) {
            Some(order_id) => {
                self.executor.cancel(&order_id)?;
                self.stats.cancels += 1;
                debug!("Cancelled open {} order {}", side, order_id);
                Ok(Some(order_id))
            }
            None => Ok(None),
        }
    }

    fn cancel_all(&mut self) -> TradingResult<Vec<String>> {
        let mut cancelled = Vec::new();
        for side in [Side::Buy, Side::Sell] {
            if let Some(order_id) = self.cancel_side(side)? {
                cancelled.push(order_id);
            }
        }
        if !cancelled.is_empty() {
            info!("🧹 Cancelled {} open order(s)", cancelled.len());
        }
        Ok(cancelled)
    }

    fn log_tick(&self, price: Decimal, decision: &Decision) {
        match &decision.action {
            Action::Hold(reason) => debug!("⏳ {} | {} | hold: {}", price, decision.risk_state, reason),
            Action::ForcedExit(intent) => warn!(
                "🚨 {} | {} | forced exit {} @ market",
                price, decision.risk_state, intent.quantity
            ),
            Action::Buy(intent) | Action::Sell(intent) => info!(
                "🎯 {} | {} | {} {} @ {}",
                price, decision.risk_state, intent.side, intent.quantity, intent.price
            ),
        }
    }
}
