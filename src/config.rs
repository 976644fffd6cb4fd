// Configuration management for the band market maker
//
// Loaded once per process, validated before the first tick and never mutated
// afterwards. Components receive the sections they need at construction.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::core::types::Timeframe;

/// Hard ceiling on any order relative to the base order size
pub const MAX_ORDER_MULTIPLE: Decimal = dec!(5);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    pub symbol: String,          // e.g. "SOL_USDC"
    pub price_precision: u32,    // Decimal places accepted by the exchange
    pub quantity_precision: u32,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            symbol: "SOL_USDC".to_string(),
            price_precision: 2,
            quantity_precision: 2,
        }
    }
}

impl MarketConfig {
    /// Split "BASE_QUOTE" into its two assets
    pub fn assets(&self) -> (&str, &str) {
        match self.symbol.split_once('_') {
            Some((base, quote)) => (base, quote),
            None => (self.symbol.as_str(), ""),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizingUnit {
    Base,  // base_order_size is in base currency
    Quote, // quote_order_size is converted at the current price
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SizingConfig {
    pub unit: SizingUnit,
    pub base_order_size: Decimal,
    pub quote_order_size: Decimal,
    pub max_order_multiple: Decimal,
    pub min_position_scale: Decimal,
    pub max_position_scale: Decimal,
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            unit: SizingUnit::Base,
            base_order_size: dec!(0.1),
            quote_order_size: dec!(4),
            max_order_multiple: MAX_ORDER_MULTIPLE,
            min_position_scale: dec!(1),
            max_position_scale: dec!(10),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandConfig {
    pub interval: String,   // Informational, e.g. "1h"; the feed decides what a bar is
    pub period: usize,
    pub std_multiplier: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BandsConfig {
    pub long: BandConfig,
    pub short: BandConfig,
}

impl Default for BandsConfig {
    fn default() -> Self {
        Self {
            long: BandConfig {
                interval: "1h".to_string(),
                period: 21,
                std_multiplier: dec!(2),
            },
            short: BandConfig {
                interval: "5m".to_string(),
                period: 21,
                std_multiplier: dec!(2),
            },
        }
    }
}

impl BandsConfig {
    pub fn get(&self, timeframe: Timeframe) -> &BandConfig {
        match timeframe {
            Timeframe::Long => &self.long,
            Timeframe::Short => &self.short,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntryConfig {
    pub min_profit_spread: Decimal,
    pub trade_in_band: bool,      // Only quote while price is inside the short band
    pub buy_below_sma: bool,      // Only buy below the long-timeframe mean
    pub pause_outside_band: bool, // Pause new entries on a short band breakout
    pub include_borrowed: bool,   // Count borrow/lend positions as spendable balance
}

impl Default for EntryConfig {
    fn default() -> Self {
        Self {
            min_profit_spread: dec!(0.0005),
            trade_in_band: true,
            buy_below_sma: false,
            pause_outside_band: true,
            include_borrowed: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkewFormula {
    /// Skewed side gets `k`, the opposite side `2 - k`
    Complementary,
    /// Skewed side gets `k`, the opposite side keeps the base spread
    OneSided,
    /// The sell side always gets `k`, the buy side `2 - k`, whatever the trend.
    /// With the default skews a downtrend widens the sell quote and an uptrend
    /// narrows it. Under `Complementary` the same defaults give identical
    /// quotes in both trends.
    SellAnchored,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpreadConfig {
    pub dynamic: bool,
    pub fixed_spread: Decimal, // Used for both sides when `dynamic` is off
    pub spread_min: Decimal,
    pub spread_max: Decimal,
    pub volatility_floor: Decimal,   // Band width at or below which v = 0
    pub volatility_ceiling: Decimal, // Band width at or above which v = 1
    pub trend_skew: bool,
    pub uptrend_skew: Decimal,
    pub downtrend_skew: Decimal,
    pub skew_formula: SkewFormula,
}

impl Default for SpreadConfig {
    fn default() -> Self {
        Self {
            dynamic: true,
            fixed_spread: dec!(0.00018),
            spread_min: dec!(0.00022),
            spread_max: dec!(0.001),
            volatility_floor: dec!(0.0025),
            volatility_ceiling: dec!(0.05),
            trend_skew: true,
            uptrend_skew: dec!(0.8),
            downtrend_skew: dec!(1.2),
            skew_formula: SkewFormula::Complementary,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub stop_loss_activation: Decimal, // Drawdown that arms the stop
    pub stop_loss_ratio: Decimal,      // Drawdown that forces the exit
    pub take_profit_ratio: Decimal,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            stop_loss_activation: dec!(0.02),
            stop_loss_ratio: dec!(0.03),
            take_profit_ratio: dec!(0.07),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Minimum seconds between entry/exit re-quotes; forced exits ignore it
    pub min_order_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            min_order_interval_secs: 120,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
    pub keep_days: u32, // Trade history retention
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "data/positions.db".to_string(),
            keep_days: 15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub log_ticks: bool,
    pub log_bands: bool,
    pub log_risk_transitions: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_ticks: true,
            log_bands: false,
            log_risk_transitions: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub market: MarketConfig,
    #[serde(default)]
    pub sizing: SizingConfig,
    #[serde(default)]
    pub bands: BandsConfig,
    #[serde(default)]
    pub entry: EntryConfig,
    #[serde(default)]
    pub spread: SpreadConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(e.to_string()))?;

        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)
            .map_err(|e| ConfigError::Parse(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;

        fs::write(path, content)
            .map_err(|e| ConfigError::FileWrite(e.to_string()))?;

        Ok(())
    }

    /// Load configuration from file, or create default if file doesn't exist
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            let config = Self::default();
            config.to_file(&path)?;
            tracing::info!("📁 Created default config file: {}", path.as_ref().display());
            Ok(config)
        }
    }

    /// Validate parameter combinations; any failure is fatal at startup
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.market.symbol.trim().is_empty() {
            return Err(invalid("market.symbol must not be empty"));
        }
        if self.market.price_precision > 18 || self.market.quantity_precision > 18 {
            return Err(invalid("price/quantity precision must be at most 18"));
        }

        let sizing = &self.sizing;
        if sizing.base_order_size <= Decimal::ZERO {
            return Err(invalid("sizing.base_order_size must be positive"));
        }
        if sizing.unit == SizingUnit::Quote && sizing.quote_order_size <= Decimal::ZERO {
            return Err(invalid("sizing.quote_order_size must be positive"));
        }
        if sizing.max_order_multiple <= Decimal::ZERO || sizing.max_order_multiple > MAX_ORDER_MULTIPLE {
            return Err(invalid(format!(
                "sizing.max_order_multiple must be in (0, {}]",
                MAX_ORDER_MULTIPLE
            )));
        }
        if sizing.min_position_scale < Decimal::ZERO {
            return Err(invalid("sizing.min_position_scale must be non-negative"));
        }
        if sizing.min_position_scale > sizing.max_position_scale {
            return Err(invalid("sizing.min_position_scale must not exceed max_position_scale"));
        }

        for (name, band) in [("long", &self.bands.long), ("short", &self.bands.short)] {
            if band.period == 0 {
                return Err(invalid(format!("bands.{}.period must be greater than 0", name)));
            }
            if band.std_multiplier <= Decimal::ZERO {
                return Err(invalid(format!("bands.{}.std_multiplier must be positive", name)));
            }
        }

        if self.entry.min_profit_spread < Decimal::ZERO {
            return Err(invalid("entry.min_profit_spread must be non-negative"));
        }

        let spread = &self.spread;
        if spread.fixed_spread < Decimal::ZERO || spread.spread_min < Decimal::ZERO {
            return Err(invalid("spreads must be non-negative"));
        }
        if spread.spread_min > spread.spread_max {
            return Err(invalid("spread.spread_min must not exceed spread.spread_max"));
        }
        if spread.volatility_floor < Decimal::ZERO || spread.volatility_floor >= spread.volatility_ceiling {
            return Err(invalid("spread.volatility_floor must be below spread.volatility_ceiling"));
        }
        for (name, skew) in [("uptrend_skew", spread.uptrend_skew), ("downtrend_skew", spread.downtrend_skew)] {
            if skew < Decimal::ZERO || skew > Decimal::TWO {
                return Err(invalid(format!("spread.{} must be within [0, 2]", name)));
            }
        }

        let risk = &self.risk;
        if risk.stop_loss_activation <= Decimal::ZERO
            || risk.stop_loss_ratio <= Decimal::ZERO
            || risk.take_profit_ratio <= Decimal::ZERO
        {
            return Err(invalid("risk ratios must be positive"));
        }
        if risk.stop_loss_activation > risk.stop_loss_ratio {
            return Err(invalid("risk.stop_loss_activation must not exceed risk.stop_loss_ratio"));
        }

        if self.database.path.trim().is_empty() {
            return Err(invalid("database.path must not be empty"));
        }

        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::Validation(msg.into())
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to read config file: {0}")]
    FileRead(String),

    #[error("Failed to write config file: {0}")]
    FileWrite(String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Failed to serialize config: {0}")]
    Serialize(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}
