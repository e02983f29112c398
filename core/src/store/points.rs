//! Store methods for the append-only points transaction table.

use super::{GameStore, StoreTx};
use crate::{error::GameResult, points::PointsTransaction};
use rusqlite::params;

impl GameStore {
    /// Newest first.
    pub fn recent_points_transactions(
        &self,
        user_id: &str,
        limit: usize,
    ) -> GameResult<Vec<PointsTransaction>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, amount, source, spend_type, description, metadata, created_at
             FROM points_transaction
             WHERE user_id = ?1
             ORDER BY rowid DESC
             LIMIT ?2",
        )?;
        let txns = stmt
            .query_map(params![user_id, limit as i64], |row| {
                Ok(PointsTransaction {
                    id:          row.get(0)?,
                    user_id:     row.get(1)?,
                    amount:      row.get(2)?,
                    source:      row.get(3)?,
                    spend_type:  row.get(4)?,
                    description: row.get(5)?,
                    metadata:    row.get(6)?,
                    created_at:  row.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(txns)
    }

    // ── Test / summary helpers ────────────────────────────────────────

    pub fn points_transaction_count(&self, user_id: &str) -> GameResult<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM points_transaction WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

impl StoreTx<'_> {
    pub fn insert_points_transaction(&self, txn: &PointsTransaction) -> GameResult<()> {
        self.tx.execute(
            "INSERT INTO points_transaction (
                id, user_id, amount, source, spend_type, description, metadata, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                txn.id,
                txn.user_id,
                txn.amount,
                txn.source,
                txn.spend_type,
                txn.description,
                txn.metadata,
                txn.created_at,
            ],
        )?;
        Ok(())
    }
}
