//! Volatility bands over two independent timeframes
//!
//! Each timeframe owns a fixed-capacity circular buffer of closing prices
//! with a running sum and sum of squares, so a new bar costs O(1). The window
//! is only rescanned when a running sum leaves the Decimal range. Sums are
//! kept in `Decimal`, which makes them exact: repeated eviction never
//! accumulates drift.
//!
//! Population standard deviation (divide by N), as in the classic
//! Bollinger definition.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, MathematicalOps};
use tracing::{debug, warn};

use crate::config::{BandConfig, BandsConfig};
use crate::core::types::{PriceBar, Timeframe};
use crate::error::{TradingError, TradingResult};

/// Fixed-size ring of the most recent `capacity` values
///
/// A running sum that would overflow the Decimal mantissa is dropped and
/// rebuilt from the window on the next update; statistics that cannot be
/// represented at all come back as `None`.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    values: Vec<Decimal>,
    capacity: usize,
    next: usize,
    len: usize,
    sum: Option<Decimal>,
    sum_sq: Option<Decimal>,
}

impl RollingWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            values: vec![Decimal::ZERO; capacity],
            capacity,
            next: 0,
            len: 0,
            sum: Some(Decimal::ZERO),
            sum_sq: Some(Decimal::ZERO),
        }
    }

    /// Append a value, returning the evicted one once the window is full
    pub fn push(&mut self, value: Decimal) -> Option<Decimal> {
        let evicted = if self.len == self.capacity {
            Some(self.values[self.next])
        } else {
            self.len += 1;
            None
        };
        let old = evicted.unwrap_or(Decimal::ZERO);

        self.values[self.next] = value;
        self.next = (self.next + 1) % self.capacity;
        self.apply_delta(old, value);

        evicted
    }

    /// Overwrite the most recent value (a revised bar with the same timestamp)
    pub fn replace_latest(&mut self, value: Decimal) -> bool {
        if self.len == 0 {
            return false;
        }
        let idx = (self.next + self.capacity - 1) % self.capacity;
        let old = self.values[idx];
        self.values[idx] = value;
        self.apply_delta(old, value);
        true
    }

    /// Swap `old` for `new` in the running sums, rescanning on overflow
    fn apply_delta(&mut self, old: Decimal, new: Decimal) {
        self.sum = self.sum.and_then(|sum| sum.checked_sub(old)?.checked_add(new));
        self.sum_sq = self
            .sum_sq
            .and_then(|sum_sq| sum_sq.checked_sub(old.checked_mul(old)?)?.checked_add(new.checked_mul(new)?));

        if self.sum.is_none() || self.sum_sq.is_none() {
            let sum = self.iter().try_fold(Decimal::ZERO, |acc, v| acc.checked_add(v));
            let sum_sq = self
                .iter()
                .try_fold(Decimal::ZERO, |acc, v| acc.checked_add(v.checked_mul(v)?));
            self.sum = sum;
            self.sum_sq = sum_sq;
        }
    }

    pub fn latest(&self) -> Option<Decimal> {
        if self.len == 0 {
            return None;
        }
        Some(self.values[(self.next + self.capacity - 1) % self.capacity])
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Values oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = Decimal> + '_ {
        let start = (self.next + self.capacity - self.len) % self.capacity;
        (0..self.len).map(move |i| self.values[(start + i) % self.capacity])
    }

    pub fn mean(&self) -> Option<Decimal> {
        if self.len == 0 {
            return None;
        }
        self.sum?.checked_div(Decimal::from(self.len))
    }

    /// Population standard deviation from the running sums
    pub fn std_dev(&self) -> Option<Decimal> {
        if self.len == 0 {
            return None;
        }
        let variance = match self.running_variance() {
            Some(variance) => variance,
            None => self.centered_variance()?,
        };
        Some(variance.max(Decimal::ZERO).sqrt().unwrap_or(Decimal::ZERO))
    }

    /// `(n·Σx² − (Σx)²) / n²`, exact up to the final division
    fn running_variance(&self) -> Option<Decimal> {
        let n = Decimal::from(self.len);
        let (sum, sum_sq) = (self.sum?, self.sum_sq?);
        let numerator = n.checked_mul(sum_sq)?.checked_sub(sum.checked_mul(sum)?)?;
        numerator.checked_div(n.checked_mul(n)?)
    }

    /// `Σ(x − mean)² / n`, for windows whose raw squares are too large
    fn centered_variance(&self) -> Option<Decimal> {
        let mean = self.mean()?;
        let squares = self.iter().try_fold(Decimal::ZERO, |acc, v| {
            let d = v.checked_sub(mean)?;
            acc.checked_add(d.checked_mul(d)?)
        })?;
        squares.checked_div(Decimal::from(self.len))
    }
}

/// Band statistics for one timeframe, recomputed on demand; never persisted
#[derive(Debug, Clone, PartialEq)]
pub struct BandSnapshot {
    pub timeframe: Timeframe,
    pub period: usize,
    pub std_multiplier: Decimal,
    pub mean: Decimal,
    pub std_dev: Decimal,
    pub upper_band: Decimal,
    pub lower_band: Decimal,
    pub last_close: Decimal,
    /// Band position of `last_close`
    pub normalized_position: Decimal,
    pub as_of: DateTime<Utc>,
}

impl BandSnapshot {
    /// Build a snapshot from raw statistics
    pub fn from_stats(
        timeframe: Timeframe,
        period: usize,
        std_multiplier: Decimal,
        mean: Decimal,
        std_dev: Decimal,
        last_close: Decimal,
        as_of: DateTime<Utc>,
    ) -> Self {
        let half_width = std_multiplier * std_dev;
        Self {
            timeframe,
            period,
            std_multiplier,
            mean,
            std_dev,
            upper_band: mean + half_width,
            lower_band: mean - half_width,
            last_close,
            normalized_position: normalized_position(last_close, mean, half_width),
            as_of,
        }
    }

    /// Band position of an arbitrary price, in [-1, 1]
    pub fn position_of(&self, price: Decimal) -> Decimal {
        normalized_position(price, self.mean, self.std_multiplier * self.std_dev)
    }

    /// Inclusive band containment
    pub fn contains(&self, price: Decimal) -> bool {
        self.lower_band <= price && price <= self.upper_band
    }

    /// Band width relative to the mean, the raw volatility measure
    pub fn width_ratio(&self) -> Decimal {
        if self.mean.is_zero() {
            return Decimal::ZERO;
        }
        ((self.upper_band - self.lower_band) / self.mean).abs()
    }
}

/// `clamp((price − mean) / half_width, −1, 1)`, and 0 for a flat market
pub fn normalized_position(price: Decimal, mean: Decimal, half_width: Decimal) -> Decimal {
    if half_width.is_zero() {
        return Decimal::ZERO;
    }
    let offset = price - mean;
    match offset.checked_div(half_width) {
        Some(position) => position.clamp(Decimal::NEGATIVE_ONE, Decimal::ONE),
        None if offset.is_sign_negative() == half_width.is_sign_negative() => Decimal::ONE,
        None => Decimal::NEGATIVE_ONE,
    }
}

/// Result of asking for a band: either final statistics or the fill level
#[derive(Debug, Clone, PartialEq)]
pub enum BandReading {
    Ready(BandSnapshot),
    NotReady {
        timeframe: Timeframe,
        observed: usize,
        period: usize,
    },
}

impl BandReading {
    pub fn ready(&self) -> Option<&BandSnapshot> {
        match self {
            BandReading::Ready(snapshot) => Some(snapshot),
            BandReading::NotReady { .. } => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, BandReading::Ready(_))
    }

    /// Convert into a result, mapping "not ready" to `InsufficientData`
    pub fn require(self) -> TradingResult<BandSnapshot> {
        match self {
            BandReading::Ready(snapshot) => Ok(snapshot),
            BandReading::NotReady {
                timeframe,
                observed,
                period,
            } => Err(TradingError::InsufficientData {
                timeframe,
                observed,
                period,
            }),
        }
    }
}

/// What happened to an incoming bar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarUpdate {
    Appended,
    /// Same timestamp as the newest bar: its close was revised in place
    Revised,
    /// Older than the newest accepted bar; dropped
    Stale,
}

#[derive(Debug, Clone)]
struct TimeframeBand {
    timeframe: Timeframe,
    period: usize,
    std_multiplier: Decimal,
    window: RollingWindow,
    last_timestamp: Option<DateTime<Utc>>,
}

impl TimeframeBand {
    fn new(timeframe: Timeframe, config: &BandConfig) -> Self {
        Self {
            timeframe,
            period: config.period,
            std_multiplier: config.std_multiplier,
            window: RollingWindow::new(config.period),
            last_timestamp: None,
        }
    }

    fn update(&mut self, bar: &PriceBar) -> BarUpdate {
        match self.last_timestamp {
            Some(last) if bar.timestamp < last => BarUpdate::Stale,
            Some(last) if bar.timestamp == last => {
                self.window.replace_latest(bar.close);
                BarUpdate::Revised
            }
            _ => {
                self.window.push(bar.close);
                self.last_timestamp = Some(bar.timestamp);
                BarUpdate::Appended
            }
        }
    }

    fn reading(&self) -> BandReading {
        // Only a full window is final; partial windows are never reported
        let stats = match (self.window.is_full(), self.window.mean(), self.window.std_dev(), self.window.latest(), self.last_timestamp) {
            (true, Some(mean), Some(std_dev), Some(close), Some(as_of)) => Some((mean, std_dev, close, as_of)),
            _ => None,
        };

        match stats {
            Some((mean, std_dev, close, as_of)) => BandReading::Ready(BandSnapshot::from_stats(
                self.timeframe,
                self.period,
                self.std_multiplier,
                mean,
                std_dev,
                close,
                as_of,
            )),
            None => BandReading::NotReady {
                timeframe: self.timeframe,
                observed: self.window.len(),
                period: self.period,
            },
        }
    }
}

/// Owns both rolling windows; updated deterministically as bars arrive
#[derive(Debug, Clone)]
pub struct IndicatorEngine {
    long: TimeframeBand,
    short: TimeframeBand,
}

impl IndicatorEngine {
    pub fn new(config: &BandsConfig) -> Self {
        Self {
            long: TimeframeBand::new(Timeframe::Long, &config.long),
            short: TimeframeBand::new(Timeframe::Short, &config.short),
        }
    }

    fn band(&self, timeframe: Timeframe) -> &TimeframeBand {
        match timeframe {
            Timeframe::Long => &self.long,
            Timeframe::Short => &self.short,
        }
    }

    fn band_mut(&mut self, timeframe: Timeframe) -> &mut TimeframeBand {
        match timeframe {
            Timeframe::Long => &mut self.long,
            Timeframe::Short => &mut self.short,
        }
    }

    /// Feed one bar into its timeframe's window
    pub fn update(&mut self, timeframe: Timeframe, bar: &PriceBar) -> BarUpdate {
        let band = self.band_mut(timeframe);
        let outcome = band.update(bar);

        match outcome {
            BarUpdate::Stale => {
                warn!(
                    "⏪ Dropping stale {} bar at {} (newest is {:?})",
                    timeframe, bar.timestamp, band.last_timestamp
                );
            }
            _ => {
                debug!(
                    "{} bar {:?}: close {} ({}/{} bars)",
                    timeframe,
                    outcome,
                    bar.close,
                    band.window.len(),
                    band.period
                );
            }
        }

        outcome
    }

    /// Band statistics, or "not ready" while fewer than `period` bars were seen
    pub fn snapshot(&self, timeframe: Timeframe) -> BandReading {
        self.band(timeframe).reading()
    }

    /// Number of bars currently held for a timeframe
    pub fn observed(&self, timeframe: Timeframe) -> usize {
        self.band(timeframe).window.len()
    }

    /// Both bands ready
    pub fn is_ready(&self) -> bool {
        self.long.window.is_full() && self.short.window.is_full()
    }
}
