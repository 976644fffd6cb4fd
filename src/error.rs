//! Unified error handling for the band market maker
//!
//! Transient conditions (missing data, balance shortfalls, exchange
//! rejections) are ordinary values of this type and degrade a tick to Hold.
//! Only configuration errors are fatal.

use std::io;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::config::ConfigError;
use crate::core::types::{Side, Timeframe};

/// Main error type for the market maker
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TradingError {
    #[error("Insufficient data on {timeframe} band: {observed}/{period} bars")]
    InsufficientData {
        timeframe: Timeframe,
        observed: usize,
        period: usize,
    },

    #[error("Insufficient balance for {side}: required {required}, available {available}")]
    InsufficientBalance {
        side: Side,
        required: Decimal,
        available: Decimal,
    },

    #[error("Invalid fill: {0}")]
    InvalidFill(String),

    #[error("Order rejected: {0}")]
    ExecutionRejected(String),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Market data feed error: {0}")]
    Feed(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl TradingError {
    /// Get a user-friendly error message with helpful context
    pub fn user_message(&self) -> String {
        match self {
            TradingError::Configuration(msg) => {
                format!(
                    "Configuration error: {}\n\n\
                    💡 Check config.toml for:\n\
                    - spread_min <= spread_max\n\
                    - min_position_scale <= max_position_scale\n\
                    - positive periods, multipliers and order sizes\n\
                    Run: boll-maker check",
                    msg
                )
            }
            TradingError::Database(msg) => {
                format!(
                    "Database error: {}\n\n\
                    💡 Try:\n\
                    1. Check the data/ directory permissions\n\
                    2. Point database.path at a writable file",
                    msg
                )
            }
            TradingError::InsufficientBalance {
                side,
                required,
                available,
            } => {
                format!(
                    "Insufficient balance for {} order\n\
                    Required: {}\n\
                    Available: {}\n\n\
                    💡 Either top up the account or reduce sizing.base_order_size",
                    side, required, available
                )
            }
            _ => self.to_string(),
        }
    }

    /// Only configuration problems halt the process; everything else degrades the tick
    pub fn is_fatal(&self) -> bool {
        matches!(self, TradingError::Configuration(_))
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            TradingError::InsufficientData { .. } => "data",
            TradingError::InsufficientBalance { .. } => "balance",
            TradingError::InvalidFill(_) => "ledger",
            TradingError::ExecutionRejected(_) | TradingError::Execution(_) => "execution",
            TradingError::Configuration(_) => "config",
            TradingError::Database(_) => "database",
            TradingError::Feed(_) => "feed",
            TradingError::Io(_) => "io",
        }
    }
}

impl From<ConfigError> for TradingError {
    fn from(err: ConfigError) -> Self {
        TradingError::Configuration(err.to_string())
    }
}

impl From<rusqlite::Error> for TradingError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(_, Some(msg)) => TradingError::Database(msg),
            rusqlite::Error::QueryReturnedNoRows => {
                TradingError::Database("Query returned no rows".to_string())
            }
            _ => TradingError::Database(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for TradingError {
    fn from(err: serde_json::Error) -> Self {
        TradingError::Feed(format!("JSON parse error: {}", err))
    }
}

impl From<io::Error> for TradingError {
    fn from(err: io::Error) -> Self {
        TradingError::Io(err.to_string())
    }
}

/// Result type alias using TradingError
pub type TradingResult<T> = Result<T, TradingError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_error_display() {
        let err = TradingError::InsufficientData {
            timeframe: Timeframe::Short,
            observed: 3,
            period: 21,
        };
        assert!(err.to_string().contains("3/21"));
    }

    #[test]
    fn test_error_category() {
        assert_eq!(TradingError::Configuration("x".into()).category(), "config");
        assert_eq!(TradingError::InvalidFill("x".into()).category(), "ledger");
        assert_eq!(TradingError::ExecutionRejected("x".into()).category(), "execution");
    }

    #[test]
    fn test_only_configuration_is_fatal() {
        assert!(TradingError::Configuration("bad".into()).is_fatal());
        assert!(!TradingError::ExecutionRejected("post only".into()).is_fatal());
        assert!(!TradingError::InvalidFill("oversell".into()).is_fatal());
    }

    #[test]
    fn test_user_message() {
        let err = TradingError::InsufficientBalance {
            side: Side::Buy,
            required: dec!(100.50),
            available: dec!(50),
        };
        let msg = err.user_message();
        assert!(msg.contains("100.50"));
        assert!(msg.contains("💡"));
    }

    #[test]
    fn test_io_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "bars.jsonl");
        let err: TradingError = io_err.into();
        assert!(matches!(err, TradingError::Io(_)));
    }
}
