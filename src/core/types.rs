// Common types used across the market maker

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The two independent band timeframes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    Long,  // Drives position sizing
    Short, // Drives spreads, trend and band gating
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timeframe::Long => write!(f, "long"),
            Timeframe::Short => write!(f, "short"),
        }
    }
}

/// One OHLCV bar; immutable once produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub timestamp: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl PriceBar {
    /// Flat bar where every price equals `close` (handy for ticks and tests)
    pub fn flat(timestamp: DateTime<Utc>, close: Decimal) -> Self {
        Self {
            timestamp,
            open: close,
            high: close,
            low: close,
            close,
            volume: Decimal::ZERO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "BUY" | "BID" => Some(Side::Buy),
            "SELL" | "ASK" => Some(Side::Sell),
            _ => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderKind {
    /// Post-only limit quote at the intent price
    Limit,
    /// Immediate exit at market; `price` is the reference price
    Market,
}

/// Why an intent was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntentReason {
    BandEntry,
    ProfitExit,
    StopLoss,
    TakeProfit,
}

impl IntentReason {
    pub fn is_forced_exit(&self) -> bool {
        matches!(self, IntentReason::StopLoss | IntentReason::TakeProfit)
    }
}

/// Ephemeral output of one tick. The execution collaborator owns the order lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderIntent {
    pub side: Side,
    pub kind: OrderKind,
    pub price: Decimal,
    pub quantity: Decimal,
    pub reason: IntentReason,
}

impl OrderIntent {
    pub fn notional(&self) -> Decimal {
        self.price * self.quantity
    }
}

/// A confirmed execution reported by the exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub order_id: String,
    pub side: Side,
    pub price: Decimal,
    pub quantity: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// Account balances as reported by the execution collaborator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Balances {
    pub base: Decimal,
    pub quote: Decimal,
    /// Net borrow/lend adjustment on the base asset
    pub borrowed_base: Decimal,
    /// Net borrow/lend adjustment on the quote asset
    pub borrowed_quote: Decimal,
}

impl Balances {
    /// Quote currency that may be spent on a buy
    pub fn spendable_quote(&self, include_borrowed: bool) -> Decimal {
        if include_borrowed {
            self.quote + self.borrowed_quote
        } else {
            self.quote
        }
    }

    /// Base currency that may be sold
    pub fn sellable_base(&self, include_borrowed: bool) -> Decimal {
        if include_borrowed {
            self.base + self.borrowed_base
        } else {
            self.base
        }
    }

    /// Total account value expressed in the quote currency
    pub fn total_value(&self, price: Decimal, include_borrowed: bool) -> Decimal {
        self.sellable_base(include_borrowed) * price + self.spendable_quote(include_borrowed)
    }
}
