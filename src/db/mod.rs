//! SQLite-backed position and trade persistence

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::Connection;
use rust_decimal::Decimal;

use crate::core::position_ledger::Position;
use crate::error::{TradingError, TradingResult};

pub mod position;
pub mod trade;

pub use trade::TradeRecord;

/// Storage seam for the session: restore at startup, write after every fill
pub trait PositionStore {
    fn load_position(&self, symbol: &str) -> TradingResult<Option<Position>>;

    fn save_position(&mut self, symbol: &str, position: &Position) -> TradingResult<()>;

    fn record_trade(&mut self, trade: &TradeRecord) -> TradingResult<i64>;

    /// Newest first
    fn recent_trades(&self, symbol: &str, limit: usize) -> TradingResult<Vec<TradeRecord>>;

    /// Drop trades older than `keep_days` before `now`; returns rows removed
    fn prune_trades(&mut self, keep_days: u32, now: DateTime<Utc>) -> TradingResult<usize>;

    /// Persist one fill: position snapshot, trade row, then retention measured
    /// from the trade time. Returns rows pruned. Stores that support
    /// transactions override this to make the three writes atomic.
    fn commit_fill(
        &mut self,
        symbol: &str,
        position: &Position,
        trade: &TradeRecord,
        keep_days: u32,
    ) -> TradingResult<usize> {
        self.save_position(symbol, position)?;
        self.record_trade(trade)?;
        self.prune_trades(keep_days, trade.timestamp)
    }
}

/// Database handle with a shared connection
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) a database file and apply the schema
    pub fn new<P: AsRef<Path>>(path: P) -> TradingResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        let db = Database {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Create an in-memory database (for testing)
    pub fn new_in_memory() -> TradingResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Run migrations to set up or update the schema
    pub fn run_migrations(&self) -> TradingResult<()> {
        let conn = self.lock()?;
        let migration_sql = include_str!("migrations/V1__initial_schema.sql");
        conn.execute_batch(migration_sql)?;
        Ok(())
    }

    /// Get a reference to the connection (for custom queries)
    pub fn get_connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    /// Check database health
    pub fn health_check(&self) -> TradingResult<bool> {
        let conn = self.lock()?;
        let result: i32 = conn.query_row("SELECT 1", [], |row| row.get(0))?;
        Ok(result == 1)
    }

    fn lock(&self) -> TradingResult<MutexGuard<'_, Connection>> {
        lock(&self.conn)
    }
}

impl PositionStore for Database {
    fn load_position(&self, symbol: &str) -> TradingResult<Option<Position>> {
        position::load(&*self.lock()?, symbol)
    }

    fn save_position(&mut self, symbol: &str, position: &Position) -> TradingResult<()> {
        position::save(&*self.lock()?, symbol, position)
    }

    fn record_trade(&mut self, trade: &TradeRecord) -> TradingResult<i64> {
        trade.insert(&*self.lock()?)
    }

    fn recent_trades(&self, symbol: &str, limit: usize) -> TradingResult<Vec<TradeRecord>> {
        TradeRecord::recent(&*self.lock()?, symbol, limit)
    }

    fn prune_trades(&mut self, keep_days: u32, now: DateTime<Utc>) -> TradingResult<usize> {
        TradeRecord::prune_before(&*self.lock()?, retention_cutoff(keep_days, now))
    }

    fn commit_fill(
        &mut self,
        symbol: &str,
        position: &Position,
        trade: &TradeRecord,
        keep_days: u32,
    ) -> TradingResult<usize> {
        let mut conn = self.lock()?;
        // Dropping the transaction on an early return rolls it back
        let tx = conn.transaction()?;
        position::save(&tx, symbol, position)?;
        trade.insert(&tx)?;
        let pruned = TradeRecord::prune_before(&tx, retention_cutoff(keep_days, trade.timestamp))?;
        tx.commit()?;
        Ok(pruned)
    }
}

/// In-process store for tests and dry runs
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    positions: HashMap<String, Position>,
    trades: Vec<TradeRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_position(mut self, symbol: &str, position: Position) -> Self {
        self.positions.insert(symbol.to_string(), position);
        self
    }

    pub fn trades(&self) -> &[TradeRecord] {
        &self.trades
    }
}

impl PositionStore for MemoryStore {
    fn load_position(&self, symbol: &str) -> TradingResult<Option<Position>> {
        Ok(self.positions.get(symbol).cloned())
    }

    fn save_position(&mut self, symbol: &str, position: &Position) -> TradingResult<()> {
        self.positions.insert(symbol.to_string(), position.clone());
        Ok(())
    }

    fn record_trade(&mut self, trade: &TradeRecord) -> TradingResult<i64> {
        let id = self.trades.len() as i64 + 1;
        let mut stored = trade.clone();
        stored.id = Some(id);
        self.trades.push(stored);
        Ok(id)
    }

    fn recent_trades(&self, symbol: &str, limit: usize) -> TradingResult<Vec<TradeRecord>> {
        let mut trades: Vec<TradeRecord> = self.trades.iter().filter(|t| t.symbol == symbol).cloned().collect();
        trades.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        trades.truncate(limit);
        Ok(trades)
    }

    fn prune_trades(&mut self, keep_days: u32, now: DateTime<Utc>) -> TradingResult<usize> {
        let cutoff = retention_cutoff(keep_days, now);
        let before = self.trades.len();
        self.trades.retain(|t| t.timestamp >= cutoff);
        Ok(before - self.trades.len())
    }
}

pub(crate) fn lock(conn: &Mutex<Connection>) -> TradingResult<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|_| TradingError::Database("connection mutex poisoned".to_string()))
}

pub(crate) fn retention_cutoff(keep_days: u32, now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::days(i64::from(keep_days))
}

/// Fixed-width UTC timestamps so TEXT ordering matches time ordering
pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn parse_decimal(idx: usize, raw: &str) -> rusqlite::Result<Decimal> {
    Decimal::from_str(raw).map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Side;
    use rust_decimal_macros::dec;

    #[test]
    fn test_database_creation() {
        let db = Database::new_in_memory().unwrap();
        assert!(db.health_check().unwrap());
    }

    #[test]
    fn test_migrations() {
        let db = Database::new_in_memory().unwrap();
        // Re-running is harmless
        db.run_migrations().unwrap();

        let conn = db.lock().unwrap();
        let count: i32 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN ('positions', 'trades')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_memory_store_prunes_by_age() {
        let now = Utc::now();
        let mut store = MemoryStore::new();
        for age in [1, 20] {
            store
                .record_trade(&TradeRecord::new(
                    "SOL_USDC",
                    "order",
                    Side::Buy,
                    dec!(100),
                    dec!(1),
                    None,
                    now - Duration::days(age),
                ))
                .unwrap();
        }

        assert_eq!(store.prune_trades(15, now).unwrap(), 1);
        assert_eq!(store.recent_trades("SOL_USDC", 10).unwrap().len(), 1);
    }

    fn fill_trade(age_days: i64, now: DateTime<Utc>) -> TradeRecord {
        TradeRecord::new(
            "SOL_USDC",
            "order",
            Side::Buy,
            dec!(100),
            dec!(1),
            None,
            now - Duration::days(age_days),
        )
    }

    #[test]
    fn test_commit_fill_writes_and_prunes_from_trade_time() {
        let mut db = Database::new_in_memory().unwrap();
        let now = Utc::now();
        db.record_trade(&fill_trade(30, now)).unwrap();

        let position = Position {
            quantity_held: dec!(1),
            average_cost_basis: Some(dec!(100)),
            borrowed_quantity: dec!(0),
        };
        let pruned = db.commit_fill("SOL_USDC", &position, &fill_trade(0, now), 15).unwrap();

        assert_eq!(pruned, 1);
        assert_eq!(db.load_position("SOL_USDC").unwrap(), Some(position));
        assert_eq!(db.recent_trades("SOL_USDC", 10).unwrap().len(), 1);
    }

    #[test]
    fn test_commit_fill_rolls_back_on_failure() {
        let mut db = Database::new_in_memory().unwrap();
        db.lock().unwrap().execute_batch("DROP TABLE trades").unwrap();

        let position = Position {
            quantity_held: dec!(1),
            average_cost_basis: Some(dec!(100)),
            borrowed_quantity: dec!(0),
        };
        let result = db.commit_fill("SOL_USDC", &position, &fill_trade(0, Utc::now()), 15);

        assert!(result.is_err());
        assert_eq!(db.load_position("SOL_USDC").unwrap(), None);
    }
}
