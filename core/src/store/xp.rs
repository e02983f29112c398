//! Store methods for the append-only XP transaction table.

use super::{GameStore, StoreTx};
use crate::{error::GameResult, leveling::{XpSource, XpTransaction}};
use rusqlite::{params, Connection};
use std::collections::HashMap;

pub(super) fn xp_source_counts(
    conn: &Connection,
    user_id: &str,
) -> GameResult<HashMap<XpSource, i64>> {
    let mut stmt = conn.prepare(
        "SELECT source, COUNT(*) FROM xp_transaction
         WHERE user_id = ?1
         GROUP BY source",
    )?;
    let counts = stmt
        .query_map(params![user_id], |row| {
            Ok((row.get::<_, XpSource>(0)?, row.get::<_, i64>(1)?))
        })?
        .collect::<Result<HashMap<_, _>, _>>()?;
    Ok(counts)
}

impl GameStore {
    /// Newest first.
    pub fn recent_xp_transactions(
        &self,
        user_id: &str,
        limit: usize,
    ) -> GameResult<Vec<XpTransaction>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, amount, source, source_id, description, earned_at
             FROM xp_transaction
             WHERE user_id = ?1
             ORDER BY rowid DESC
             LIMIT ?2",
        )?;
        let txns = stmt
            .query_map(params![user_id, limit as i64], |row| {
                Ok(XpTransaction {
                    id:          row.get(0)?,
                    user_id:     row.get(1)?,
                    amount:      row.get(2)?,
                    source:      row.get(3)?,
                    source_id:   row.get(4)?,
                    description: row.get(5)?,
                    earned_at:   row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(txns)
    }

    pub fn xp_source_counts(&self, user_id: &str) -> GameResult<HashMap<XpSource, i64>> {
        xp_source_counts(&self.conn, user_id)
    }

    // ── Test / summary helpers ────────────────────────────────────────

    pub fn xp_transaction_count(&self, user_id: &str) -> GameResult<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM xp_transaction WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Sum of all XP ever recorded for the user. Equals `total_xp` on the
    /// state row when the audit trail is complete.
    pub fn xp_transaction_total(&self, user_id: &str) -> GameResult<i64> {
        let total: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(amount), 0) FROM xp_transaction WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(total)
    }
}

impl StoreTx<'_> {
    pub fn insert_xp_transaction(&self, txn: &XpTransaction) -> GameResult<()> {
        self.tx.execute(
            "INSERT INTO xp_transaction (
                id, user_id, amount, source, source_id, description, earned_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                txn.id,
                txn.user_id,
                txn.amount,
                txn.source,
                txn.source_id,
                txn.description,
                txn.earned_at,
            ],
        )?;
        Ok(())
    }
}
