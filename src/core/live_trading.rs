// Async event loop driving a session from a market event channel
//
// Feeds push events; the loop applies them one at a time so a tick always
// completes before the next event is read. Transient errors are logged and the
// loop keeps going; only configuration errors stop it.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::core::indicators::BarUpdate;
use crate::core::session::MakerSession;
use crate::core::types::{Fill, PriceBar, Timeframe};
use crate::db::PositionStore;
use crate::error::TradingResult;
use crate::execution::ExecutionClient;

#[derive(Debug, Clone, PartialEq)]
pub enum MarketEvent {
    Bar { timeframe: Timeframe, bar: PriceBar },
    Price { price: Decimal, at: DateTime<Utc> },
    /// Fill of a resting order reported by the exchange
    Fill(Fill),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoopSummary {
    pub bars: u64,
    pub stale_bars: u64,
    pub ticks: u64,
    pub fills: u64,
    pub errors: u64,
    pub last_price: Option<Decimal>,
}

pub async fn run_event_loop<E, S>(
    session: &mut MakerSession<E, S>,
    rx: mpsc::Receiver<MarketEvent>,
) -> TradingResult<LoopSummary>
where
    E: ExecutionClient,
    S: PositionStore,
{
    run_event_loop_with(session, rx, |_| {}).await
}

/// Same as `run_event_loop`, calling `observe` after every event
pub async fn run_event_loop_with<E, S, F>(
    session: &mut MakerSession<E, S>,
    mut rx: mpsc::Receiver<MarketEvent>,
    mut observe: F,
) -> TradingResult<LoopSummary>
where
    E: ExecutionClient,
    S: PositionStore,
    F: FnMut(&MarketEvent),
{
    info!("🚀 Event loop started for {}", session.symbol());
    let mut summary = LoopSummary::default();

    while let Some(event) = rx.recv().await {
        let result = match &event {
            MarketEvent::Bar { timeframe, bar } => {
                summary.bars += 1;
                if session.on_bar(*timeframe, bar) == BarUpdate::Stale {
                    summary.stale_bars += 1;
                }
                Ok(())
            }
            MarketEvent::Price { price, at } => {
                summary.ticks += 1;
                summary.last_price = Some(*price);
                session.on_price(*price, *at).map(|_| ())
            }
            MarketEvent::Fill(fill) => {
                summary.fills += 1;
                session.on_fill(fill).map(|_| ())
            }
        };

        if let Err(e) = result {
            summary.errors += 1;
            if e.is_fatal() {
                error!("❌ Fatal {} error, stopping: {}", e.category(), e);
                return Err(e);
            }
            warn!("⚠️  {}", e.user_message());
        }

        observe(&event);
    }

    info!(
        "⏹️  Event loop finished: {} bars, {} ticks, {} fills, {} errors",
        summary.bars, summary.ticks, summary.fills, summary.errors
    );
    Ok(summary)
}
