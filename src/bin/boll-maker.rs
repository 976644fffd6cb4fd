// Bollinger Band Market Maker - CLI
// Single entry point for configuration, replays and position inspection

use std::path::Path;

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use boll_maker::{Config, ConfigError, TradingError};

// Load command modules from cli directory
#[path = "../cli/position_commands.rs"]
mod position_commands;
#[path = "../cli/replay_commands.rs"]
mod replay_commands;

#[derive(Parser)]
#[command(name = "boll-maker")]
#[command(version = "0.2.0")]
#[command(about = "Bollinger Band Market Maker", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the example config and create the data directory
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Load and validate the config, then print the effective parameters
    Check,

    /// Dry-run the maker over a recorded bar feed (JSON lines)
    Replay {
        /// Bar file, one JSON bar per line
        #[arg(short, long)]
        bars: String,

        /// Starting quote balance
        #[arg(long, default_value = "1000")]
        quote: Decimal,

        /// Starting base balance
        #[arg(long, default_value = "0")]
        base: Decimal,

        /// Keep state in memory instead of the configured database
        #[arg(long)]
        memory: bool,

        /// Charge standard maker/taker fees on paper fills
        #[arg(long)]
        fees: bool,

        /// Hide the progress bar
        #[arg(short, long)]
        quiet: bool,
    },

    /// Show the stored position and recent trades
    Position {
        /// Number of recent trades to list
        #[arg(short, long, default_value = "10")]
        trades: usize,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging first (before full config validation so config errors are visible)
    init_logging(cli.verbose, &cli.config);

    info!("🚀 Bollinger Band Market Maker v0.2.0");
    info!("📁 Config: {}", cli.config);

    let result = match cli.command {
        // Init doesn't require config (it creates it)
        Commands::Init { force } => init_workspace(force, &cli.config),
        Commands::Check => load_config_or_exit(&cli.config).map(|config| print_config(&config)),
        Commands::Replay {
            bars,
            quote,
            base,
            memory,
            fees,
            quiet,
        } => {
            let config = load_config_or_exit(&cli.config)?;
            let options = replay_commands::ReplayOptions {
                bars,
                quote,
                base,
                memory,
                fees,
                quiet,
            };
            replay_commands::run_replay(options, config).await
        }
        Commands::Position { trades } => {
            let config = load_config_or_exit(&cli.config)?;
            position_commands::show_position(trades, &config)
        }
    };

    if let Err(e) = result {
        error!("❌ {}", e.user_message());
        std::process::exit(1);
    }
    Ok(())
}

/// `--verbose` wins, then RUST_LOG, then `logging.level` from the config
fn init_logging(verbose: bool, config_path: &str) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            let level = Config::from_file(config_path)
                .map(|c| c.logging.level)
                .unwrap_or_else(|_| "info".to_string());
            EnvFilter::new(level)
        })
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Load config or exit with helpful error message
fn load_config_or_exit(path: &str) -> Result<Config, TradingError> {
    match Config::from_file(path) {
        Ok(config) => Ok(config),
        Err(e) => {
            error!("❌ Configuration Error");
            error!("{}", e);

            if matches!(e, ConfigError::FileNotFound(_)) {
                error!("");
                error!("💡 Quick fix:");
                error!("   1. Run: boll-maker init");
                error!("   2. Edit config.toml for your pair and sizing");
                error!("   3. Try again");
            }

            std::process::exit(1);
        }
    }
}

fn init_workspace(force: bool, config_path: &str) -> Result<(), TradingError> {
    use std::fs;

    info!("🔧 Initializing workspace...");
    fs::create_dir_all("data")?;

    if force || !Path::new(config_path).exists() {
        let default_config = include_str!("../../config.toml.example");
        fs::write(config_path, default_config)?;
        info!("📝 Created {}", config_path);
    } else {
        warn!("⚠️  {} already exists, skipping", config_path);
    }

    info!("✅ Workspace initialized successfully!");
    info!("💡 Next steps:");
    info!("   1. Edit {} for your pair and sizing", config_path);
    info!("   2. Run: boll-maker check");
    info!("   3. Run: boll-maker replay --bars feed.jsonl --memory");
    Ok(())
}

fn print_config(config: &Config) {
    let (base, quote) = config.market.assets();
    info!("✅ Configuration valid");
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!(
        "   Market: {} ({} / {}), precision {}/{}",
        config.market.symbol, base, quote, config.market.price_precision, config.market.quantity_precision
    );
    info!(
        "   Sizing: {:?} unit, B = {} base / {} quote, scale {}..{}, cap {}x",
        config.sizing.unit,
        config.sizing.base_order_size,
        config.sizing.quote_order_size,
        config.sizing.min_position_scale,
        config.sizing.max_position_scale,
        config.sizing.max_order_multiple
    );
    for (name, band) in [("Long", &config.bands.long), ("Short", &config.bands.short)] {
        info!(
            "   {} band: {} x {} bars, k = {}",
            name, band.interval, band.period, band.std_multiplier
        );
    }
    info!(
        "   Entry: min profit {}, in band {}, below SMA {}, pause outside band {}, borrowed {}",
        config.entry.min_profit_spread,
        config.entry.trade_in_band,
        config.entry.buy_below_sma,
        config.entry.pause_outside_band,
        config.entry.include_borrowed
    );
    if config.spread.dynamic {
        info!(
            "   Spread: {}..{} over width {}..{}, skew {} (up {}, down {}, {:?})",
            config.spread.spread_min,
            config.spread.spread_max,
            config.spread.volatility_floor,
            config.spread.volatility_ceiling,
            config.spread.trend_skew,
            config.spread.uptrend_skew,
            config.spread.downtrend_skew,
            config.spread.skew_formula
        );
    } else {
        info!("   Spread: fixed {}", config.spread.fixed_spread);
    }
    info!(
        "   Risk: stop arms at {}, triggers at {}, take profit at {}",
        config.risk.stop_loss_activation, config.risk.stop_loss_ratio, config.risk.take_profit_ratio
    );
    info!("   Re-quote interval: {}s", config.session.min_order_interval_secs);
    info!(
        "   Database: {} (keep {} days)",
        config.database.path, config.database.keep_days
    );
}
