// Replay command: dry-run the session over a recorded feed
use rust_decimal::Decimal;
use tracing::{info, warn};

use boll_maker::clients::{load_bars, spawn_replay, to_events};
use boll_maker::core::run_event_loop_with;
use boll_maker::execution::FeeConfig;
use boll_maker::progress::ReplayProgress;
use boll_maker::{Balances, Config, Database, MakerSession, MemoryStore, PaperExchange, PositionStore, TradingResult};

pub struct ReplayOptions {
    pub bars: String,
    pub quote: Decimal,
    pub base: Decimal,
    pub memory: bool,
    pub fees: bool,
    pub quiet: bool,
}

pub async fn run_replay(options: ReplayOptions, config: Config) -> TradingResult<()> {
    info!("🧪 DRY RUN replay of {} on {}", options.bars, config.market.symbol);

    let mut exchange = PaperExchange::new(Balances {
        base: options.base,
        quote: options.quote,
        ..Balances::default()
    });
    if options.fees {
        exchange = exchange.with_fees(FeeConfig::standard());
    }

    if options.memory {
        replay_with_store(options, config, exchange, MemoryStore::new()).await
    } else {
        let db = Database::new(&config.database.path)?;
        info!("🗄️  Using database {}", config.database.path);
        replay_with_store(options, config, exchange, db).await
    }
}

async fn replay_with_store<S: PositionStore>(
    options: ReplayOptions,
    config: Config,
    exchange: PaperExchange,
    store: S,
) -> TradingResult<()> {
    let bars = load_bars(&options.bars)?;
    if bars.is_empty() {
        warn!("⚠️  {} contains no bars", options.bars);
        return Ok(());
    }

    let (base_asset, quote_asset) = config.market.assets();
    let (base_asset, quote_asset) = (base_asset.to_string(), quote_asset.to_string());

    let mut session = MakerSession::restore(config, exchange, store)?;
    let start_value = session.portfolio_value(bars[0].close)?;

    let events = to_events(&bars);
    let progress = if options.quiet {
        ReplayProgress::hidden()
    } else {
        ReplayProgress::new(events.len())
    };
    let (rx, feeder) = spawn_replay(events, 256);

    let summary = {
        let progress = &progress;
        let result = run_event_loop_with(&mut session, rx, |_| progress.tick()).await;
        match result {
            Ok(summary) => summary,
            Err(e) => {
                progress.finish_with_error(&e.to_string());
                return Err(e);
            }
        }
    };
    if let Err(e) = feeder.await {
        warn!("⚠️  Replay feeder stopped early: {}", e);
    }

    let stats = session.stats().clone();
    let last_price = summary.last_price.unwrap_or(bars[bars.len() - 1].close);
    if let Some(price) = summary.last_price {
        progress.set_status(price, session.position().quantity_held);
    }
    progress.finish(stats.fills);

    let end_value = session.portfolio_value(last_price)?;
    let position = session.position();

    info!("");
    info!("📊 Replay Summary");
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("   Events: {} bars ({} stale), {} ticks", summary.bars, summary.stale_bars, summary.ticks);
    info!(
        "   Orders: {} buys, {} sells, {} forced exits, {} throttled, {} rejected",
        stats.buys, stats.sells, stats.forced_exits, stats.throttled, stats.rejections
    );
    info!("   Fills: {} | Errors: {}", stats.fills, summary.errors);
    info!(
        "   Position: {} {} @ {}",
        position.quantity_held,
        base_asset,
        position
            .average_cost_basis
            .map(|b| b.to_string())
            .unwrap_or_else(|| "-".to_string())
    );
    info!("   Realized PnL: {:+} {}", session.realized_pnl(), quote_asset);
    info!("   Unrealized PnL: {:+} {}", position.unrealized_pnl(last_price), quote_asset);
    info!("   Fees paid: {} {}", session.executor().total_fees(), quote_asset);
    info!(
        "   Portfolio: {} -> {} {} ({:+})",
        start_value.round_dp(4),
        end_value.round_dp(4),
        quote_asset,
        (end_value - start_value).round_dp(4)
    );
    info!("   Risk state: {}", session.risk_state());

    Ok(())
}
