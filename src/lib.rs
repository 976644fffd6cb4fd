// Bollinger Band Market Maker Library
//
// Two-timeframe volatility bands drive order sizing, dynamic spreads and a
// stop-loss / take-profit lifecycle for a single spot pair

pub mod clients;     // Market data feeds
pub mod config;
pub mod core;
pub mod db;          // SQLite persistence layer
pub mod error;       // Unified error handling
pub mod execution;   // Exchange seam and paper exchange
pub mod progress;

// Re-export core types
pub use core::{
    Action, Balances, BandReading, BandSnapshot, Decision, Fill, HoldReason, IndicatorEngine, MakerSession,
    MarketEvent, OrderDecisionEngine, OrderIntent, Position, PositionLedger, PositionSizer, PriceBar, RiskController,
    RiskState, Side, SpreadCalculator, Spreads, Timeframe,
};

// Re-export error types
pub use error::{TradingError, TradingResult};

// Re-export configuration
pub use config::{Config, ConfigError};

// Re-export database types
pub use db::{Database, MemoryStore, PositionStore, TradeRecord};

// Re-export execution types
pub use execution::{ExecutionClient, PaperExchange, SubmitOutcome};
