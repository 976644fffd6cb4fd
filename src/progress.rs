//! Progress bars for replays and other long-running operations

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use rust_decimal::Decimal;

/// Progress over a recorded feed, one step per market event
pub struct ReplayProgress {
    pub progress: ProgressBar,
}

impl ReplayProgress {
    pub fn new(total_events: usize) -> Self {
        let progress = ProgressBar::new(total_events as u64);
        progress.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})\n{msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        Self { progress }
    }

    /// Hidden bar for quiet runs and tests
    pub fn hidden() -> Self {
        Self {
            progress: ProgressBar::hidden(),
        }
    }

    pub fn tick(&self) {
        self.progress.inc(1);
    }

    /// Show the latest price and inventory under the bar
    pub fn set_status(&self, price: Decimal, held: Decimal) {
        self.progress
            .set_message(format!("💹 Price: {} | Held: {}", price, held));
    }

    pub fn finish(&self, fills: u64) {
        self.progress
            .finish_with_message(format!("✅ Replay complete! {} fills", fills));
    }

    pub fn finish_with_error(&self, error: &str) {
        self.progress.abandon_with_message(format!("❌ Failed: {}", error));
    }
}

/// Create a simple spinner for indeterminate operations
pub fn spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}
