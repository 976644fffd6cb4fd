//! Position snapshot operations (one row per symbol)

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use crate::core::position_ledger::Position;
use crate::db::{format_timestamp, parse_decimal};
use crate::error::TradingResult;

pub fn load(conn: &Connection, symbol: &str) -> TradingResult<Option<Position>> {
    let position = conn
        .query_row(
            "SELECT quantity_held, average_cost_basis, borrowed_quantity
             FROM positions WHERE symbol = ?1",
            params![symbol],
            |row| {
                let quantity: String = row.get(0)?;
                let basis: Option<String> = row.get(1)?;
                let borrowed: String = row.get(2)?;
                Ok(Position {
                    quantity_held: parse_decimal(0, &quantity)?,
                    average_cost_basis: basis.map(|b| parse_decimal(1, &b)).transpose()?,
                    borrowed_quantity: parse_decimal(2, &borrowed)?,
                })
            },
        )
        .optional()?;
    Ok(position)
}

/// Upsert the snapshot for `symbol`
pub fn save(conn: &Connection, symbol: &str, position: &Position) -> TradingResult<()> {
    conn.execute(
        "INSERT INTO positions (symbol, quantity_held, average_cost_basis, borrowed_quantity, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(symbol) DO UPDATE SET
             quantity_held = excluded.quantity_held,
             average_cost_basis = excluded.average_cost_basis,
             borrowed_quantity = excluded.borrowed_quantity,
             updated_at = excluded.updated_at",
        params![
            symbol,
            position.quantity_held.to_string(),
            position.average_cost_basis.map(|b| b.to_string()),
            position.borrowed_quantity.to_string(),
            format_timestamp(&Utc::now()),
        ],
    )?;
    Ok(())
}
