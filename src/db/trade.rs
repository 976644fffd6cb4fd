//! Trade history operations

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::types::{Fill, Side};
use crate::db::{format_timestamp, parse_decimal, parse_timestamp};
use crate::error::TradingResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub id: Option<i64>,
    pub symbol: String,
    pub order_id: String,
    pub side: Side,
    pub price: Decimal,
    pub quantity: Decimal,
    /// Sells only
    pub realized_pnl: Option<Decimal>,
    pub timestamp: DateTime<Utc>,
}

impl TradeRecord {
    pub fn new(
        symbol: &str,
        order_id: &str,
        side: Side,
        price: Decimal,
        quantity: Decimal,
        realized_pnl: Option<Decimal>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: None,
            symbol: symbol.to_string(),
            order_id: order_id.to_string(),
            side,
            price,
            quantity,
            realized_pnl,
            timestamp,
        }
    }

    pub fn from_fill(symbol: &str, fill: &Fill, realized_pnl: Option<Decimal>) -> Self {
        Self::new(
            symbol,
            &fill.order_id,
            fill.side,
            fill.price,
            fill.quantity,
            realized_pnl,
            fill.timestamp,
        )
    }

    pub fn notional(&self) -> Decimal {
        self.price * self.quantity
    }

    /// Parse a row from the database
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let side: String = row.get(3)?;
        let price: String = row.get(4)?;
        let quantity: String = row.get(5)?;
        let pnl: Option<String> = row.get(6)?;
        let timestamp: String = row.get(7)?;
        Ok(TradeRecord {
            id: Some(row.get(0)?),
            symbol: row.get(1)?,
            order_id: row.get(2)?,
            side: Side::parse(&side).unwrap_or(Side::Buy),
            price: parse_decimal(4, &price)?,
            quantity: parse_decimal(5, &quantity)?,
            realized_pnl: pnl.map(|p| parse_decimal(6, &p)).transpose()?,
            timestamp: parse_timestamp(7, &timestamp)?,
        })
    }

    /// Insert trade into database
    pub fn insert(&self, conn: &Connection) -> TradingResult<i64> {
        conn.execute(
            "INSERT INTO trades (symbol, order_id, side, price, quantity, realized_pnl, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                self.symbol,
                self.order_id,
                self.side.as_str(),
                self.price.to_string(),
                self.quantity.to_string(),
                self.realized_pnl.map(|p| p.to_string()),
                format_timestamp(&self.timestamp),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Newest trades for a symbol
    pub fn recent(conn: &Connection, symbol: &str, limit: usize) -> TradingResult<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, symbol, order_id, side, price, quantity, realized_pnl, timestamp
             FROM trades WHERE symbol = ?1
             ORDER BY timestamp DESC, id DESC
             LIMIT ?2",
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt.query_map(params![symbol, limit], |row| Self::from_row(row))?;
        let trades = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(trades)
    }

    /// Delete trades strictly older than `cutoff`
    pub fn prune_before(conn: &Connection, cutoff: DateTime<Utc>) -> TradingResult<usize> {
        let removed = conn.execute(
            "DELETE FROM trades WHERE timestamp < ?1",
            params![format_timestamp(&cutoff)],
        )?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    #[test]
    fn test_trade_insert_recent_and_prune() {
        let db = Database::new_in_memory().unwrap();
        let conn = db.get_connection();
        let conn = conn.lock().unwrap();
        let now = Utc::now();

        let old = TradeRecord::new("SOL_USDC", "a", Side::Buy, dec!(100), dec!(1), None, now - Duration::days(30));
        let new = TradeRecord::new("SOL_USDC", "b", Side::Sell, dec!(110.5), dec!(1), Some(dec!(10.5)), now);
        old.insert(&conn).unwrap();
        new.insert(&conn).unwrap();

        let trades = TradeRecord::recent(&conn, "SOL_USDC", 10).unwrap();
        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].order_id, "b");
        assert_eq!(trades[0].side, Side::Sell);
        assert_eq!(trades[0].realized_pnl, Some(dec!(10.5)));
        assert_eq!(trades[0].notional(), dec!(110.5));

        let removed = TradeRecord::prune_before(&conn, now - Duration::days(15)).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(TradeRecord::recent(&conn, "SOL_USDC", 10).unwrap().len(), 1);
    }
}
