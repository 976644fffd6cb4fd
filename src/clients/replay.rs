// Recorded bar feed (JSON lines)
//
// One bar per line:
// {"timeframe":"short","timestamp":"2024-01-01T00:05:00Z","open":"100","high":"101","low":"99","close":"100.5","volume":"12"}
// Blank lines and lines starting with '#' are skipped. Bars are stably sorted
// by timestamp, so bars sharing a timestamp keep their file order.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::core::live_trading::MarketEvent;
use crate::core::types::{PriceBar, Timeframe};
use crate::error::{TradingError, TradingResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedBar {
    pub timeframe: Timeframe,
    pub timestamp: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    #[serde(default)]
    pub volume: Decimal,
}

impl RecordedBar {
    pub fn bar(&self) -> PriceBar {
        PriceBar {
            timestamp: self.timestamp,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
        }
    }
}

pub fn load_bars<P: AsRef<Path>>(path: P) -> TradingResult<Vec<RecordedBar>> {
    let path = path.as_ref();
    let file = File::open(path)
        .map_err(|e| TradingError::Feed(format!("cannot open {}: {}", path.display(), e)))?;
    let bars = parse_bars(BufReader::new(file))?;
    info!("📂 Loaded {} bars from {}", bars.len(), path.display());
    Ok(bars)
}

pub fn parse_bars<R: BufRead>(reader: R) -> TradingResult<Vec<RecordedBar>> {
    let mut bars = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let bar: RecordedBar = serde_json::from_str(trimmed)
            .map_err(|e| TradingError::Feed(format!("line {}: {}", idx + 1, e)))?;
        if bar.close <= Decimal::ZERO {
            return Err(TradingError::Feed(format!("line {}: non-positive close {}", idx + 1, bar.close)));
        }
        bars.push(bar);
    }
    bars.sort_by_key(|b| b.timestamp);
    Ok(bars)
}

/// A `Bar` for every bar, and a `Price` tick at every short-timeframe close
pub fn to_events(bars: &[RecordedBar]) -> Vec<MarketEvent> {
    let mut events = Vec::with_capacity(bars.len() * 2);
    for recorded in bars {
        events.push(MarketEvent::Bar {
            timeframe: recorded.timeframe,
            bar: recorded.bar(),
        });
        if recorded.timeframe == Timeframe::Short {
            events.push(MarketEvent::Price {
                price: recorded.close,
                at: recorded.timestamp,
            });
        }
    }
    events
}

/// Push events into a bounded channel from a background task
pub fn spawn_replay(events: Vec<MarketEvent>, capacity: usize) -> (mpsc::Receiver<MarketEvent>, JoinHandle<usize>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let handle = tokio::spawn(async move {
        let mut sent = 0;
        for event in events {
            if tx.send(event).await.is_err() {
                debug!("Replay receiver dropped after {} events", sent);
                break;
            }
            sent += 1;
        }
        sent
    });
    (rx, handle)
}
