// Execution collaborator seam
//
// The core submits one intent at a time and observes the outcome. Retries,
// backoff and connectivity belong to the implementation, never to the caller.

pub mod paper;

pub use paper::{FeeConfig, PaperExchange};

use chrono::{DateTime, Utc};

use crate::core::types::{Balances, Fill, OrderIntent};
use crate::error::TradingResult;

/// What the exchange did with a submitted intent
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Filled(Fill),
    /// Accepted and resting on the book
    Resting { order_id: String },
    Rejected { reason: String },
}

impl SubmitOutcome {
    pub fn order_id(&self) -> Option<&str> {
        match self {
            SubmitOutcome::Filled(fill) => Some(&fill.order_id),
            SubmitOutcome::Resting { order_id } => Some(order_id),
            SubmitOutcome::Rejected { .. } => None,
        }
    }
}

pub trait ExecutionClient {
    fn submit(&mut self, intent: &OrderIntent) -> TradingResult<SubmitOutcome>;

    /// Cancelling an unknown or already-filled order is not an error
    fn cancel(&mut self, order_id: &str) -> TradingResult<()>;

    fn balances(&self) -> TradingResult<Balances>;

    /// Market time of the tick about to be evaluated. Live venues stamp fills
    /// themselves and can ignore it.
    fn observe_time(&mut self, _at: DateTime<Utc>) {}
}
