// Common test utilities and helpers
#![allow(dead_code)]

use boll_maker::config::SizingConfig;
use boll_maker::{Balances, Config, PriceBar};
use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::path::PathBuf;
use tempfile::TempDir;

/// Small windows and whole-unit sizing so scenarios stay readable
pub fn create_test_config() -> Config {
    let mut config = Config::default();
    config.bands.long.period = 5;
    config.bands.short.period = 5;
    config.sizing = SizingConfig {
        base_order_size: dec!(1),
        ..SizingConfig::default()
    };
    config.market.quantity_precision = 4;
    config.session.min_order_interval_secs = 0;
    config.logging.log_ticks = false;
    config
}

/// Create a temporary directory for test databases
pub fn create_temp_db_dir() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let db_path = temp_dir.path().join("test.db");
    (temp_dir, db_path)
}

pub fn funded(quote: Decimal, base: Decimal) -> Balances {
    Balances {
        base,
        quote,
        ..Balances::default()
    }
}

/// Fixed start so tests don't depend on wall-clock time
pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// Flat bars one minute apart
pub fn bars_from_closes(closes: &[Decimal]) -> Vec<PriceBar> {
    let start = start_time();
    closes
        .iter()
        .enumerate()
        .map(|(i, close)| PriceBar::flat(start + Duration::minutes(i as i64), *close))
        .collect()
}

/// Closes oscillating around `center` by +/- `amplitude`
pub fn oscillating_closes(center: Decimal, amplitude: Decimal, count: usize) -> Vec<Decimal> {
    (0..count)
        .map(|i| match i % 4 {
            0 => center,
            1 => center + amplitude,
            2 => center,
            _ => center - amplitude,
        })
        .collect()
}
