// Position command: show the stored position and recent trade history
use tracing::{info, warn};

use boll_maker::{Config, Database, PositionStore, TradingResult};

pub fn show_position(trades: usize, config: &Config) -> TradingResult<()> {
    let path = &config.database.path;
    if !std::path::Path::new(path).exists() {
        warn!("⚠️  No database at {} yet. Run a replay first.", path);
        return Ok(());
    }

    let db = Database::new(path)?;
    let symbol = &config.market.symbol;
    let (base_asset, quote_asset) = config.market.assets();

    info!("📦 Position for {}", symbol);
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    match db.load_position(symbol)? {
        Some(position) if !position.is_flat() => {
            info!("   Held: {} {}", position.quantity_held, base_asset);
            if let Some(basis) = position.average_cost_basis {
                info!("   Cost basis: {} {}", basis, quote_asset);
            }
            if !position.borrowed_quantity.is_zero() {
                info!("   Borrowed: {} {}", position.borrowed_quantity, base_asset);
            }
        }
        _ => info!("   Flat"),
    }

    if trades == 0 {
        return Ok(());
    }

    let recent = db.recent_trades(symbol, trades)?;
    info!("");
    info!("🧾 Last {} trades", recent.len());
    for trade in &recent {
        let pnl = trade
            .realized_pnl
            .map(|p| format!(" | PnL {:+}", p))
            .unwrap_or_default();
        info!(
            "   {} {:<4} {} @ {}{}",
            trade.timestamp.format("%Y-%m-%d %H:%M:%S"),
            trade.side.as_str(),
            trade.quantity,
            trade.price,
            pnl
        );
    }

    Ok(())
}
