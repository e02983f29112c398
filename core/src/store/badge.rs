//! Store methods for earned badges.

use super::{GameStore, StoreTx};
use crate::{badges::UserBadge, error::GameResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

impl GameStore {
    pub fn user_badges(&self, user_id: &str) -> GameResult<Vec<UserBadge>> {
        let mut stmt = self.conn.prepare(
            "SELECT user_id, badge_id, earned_at
             FROM user_badge
             WHERE user_id = ?1
             ORDER BY earned_at ASC, badge_id ASC",
        )?;
        let badges = stmt
            .query_map(params![user_id], |row| {
                Ok(UserBadge {
                    user_id:   row.get(0)?,
                    badge_id:  row.get(1)?,
                    earned_at: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(badges)
    }

    // ── Test / summary helpers ────────────────────────────────────────

    pub fn user_badge_count(&self, user_id: &str, badge_id: &str) -> GameResult<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM user_badge WHERE user_id = ?1 AND badge_id = ?2",
            params![user_id, badge_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

impl StoreTx<'_> {
    /// Record the badge as earned. Returns false when a row already existed
    /// (earlier evaluation or a concurrent writer); the existing row wins.
    pub fn insert_user_badge(
        &self,
        user_id: &str,
        badge_id: &str,
        earned_at: DateTime<Utc>,
    ) -> GameResult<bool> {
        let inserted = self.tx.execute(
            "INSERT OR IGNORE INTO user_badge (user_id, badge_id, earned_at)
             VALUES (?1, ?2, ?3)",
            params![user_id, badge_id, earned_at],
        )?;
        Ok(inserted == 1)
    }

    pub fn badge_earned_at(
        &self,
        user_id: &str,
        badge_id: &str,
    ) -> GameResult<Option<DateTime<Utc>>> {
        let earned_at = self
            .tx
            .query_row(
                "SELECT earned_at FROM user_badge WHERE user_id = ?1 AND badge_id = ?2",
                params![user_id, badge_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(earned_at)
    }
}
