// Core market-making logic

pub mod decision;
pub mod indicators;
pub mod live_trading;
pub mod position_ledger;
pub mod position_sizer;
pub mod risk;
pub mod session;
pub mod spread;
pub mod types;

// Re-export commonly used types
pub use decision::{Action, Blocker, Decision, HoldReason, OrderDecisionEngine, TickContext};
pub use indicators::{BandReading, BandSnapshot, BarUpdate, IndicatorEngine, RollingWindow};
pub use live_trading::{run_event_loop, run_event_loop_with, LoopSummary, MarketEvent};
pub use position_ledger::{FillOutcome, Position, PositionLedger};
pub use position_sizer::PositionSizer;
pub use risk::{RiskController, RiskState};
pub use session::{MakerSession, SessionStats, TickReport};
pub use spread::{SpreadCalculator, Spreads, TrendDirection};
pub use types::{Balances, Fill, IntentReason, OrderIntent, OrderKind, PriceBar, Side, Timeframe};
