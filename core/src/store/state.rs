//! Store methods for the per-user aggregate row.

use super::{GameStore, StoreTx};
use crate::{
    error::{GameError, GameResult},
    points::PointsBalance,
    state::UserGamificationState,
    types::{Level, UserId, Xp},
};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

const STATE_COLUMNS: &str = "user_id, total_xp, current_level, level_progress,
    monthly_points, points_used, points_earned, points_reset_date,
    streak, last_activity_date, version, created_at, updated_at";

fn state_from_row(row: &Row<'_>) -> rusqlite::Result<UserGamificationState> {
    Ok(UserGamificationState {
        user_id:        row.get(0)?,
        total_xp:       row.get(1)?,
        current_level:  row.get(2)?,
        level_progress: row.get(3)?,
        points: PointsBalance {
            monthly_points:    row.get(4)?,
            points_used:       row.get(5)?,
            points_earned:     row.get(6)?,
            points_reset_date: row.get(7)?,
        },
        streak:             row.get(8)?,
        last_activity_date: row.get(9)?,
        version:            row.get(10)?,
        created_at:         row.get(11)?,
        updated_at:         row.get(12)?,
    })
}

pub(super) fn load_state(
    conn: &Connection,
    user_id: &str,
) -> GameResult<Option<UserGamificationState>> {
    let sql = format!("SELECT {STATE_COLUMNS} FROM user_gamification WHERE user_id = ?1");
    let state = conn
        .query_row(&sql, params![user_id], state_from_row)
        .optional()?;
    Ok(state)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardRow {
    pub user_id:       UserId,
    #[serde(rename = "totalXP")]
    pub total_xp:      Xp,
    pub current_level: Level,
}

impl GameStore {
    pub fn load_state(&self, user_id: &str) -> GameResult<Option<UserGamificationState>> {
        load_state(&self.conn, user_id)
    }

    /// Users ordered by total XP, ties broken by who got there first.
    pub fn top_users_by_xp(&self, limit: usize) -> GameResult<Vec<LeaderboardRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT user_id, total_xp, current_level
             FROM user_gamification
             ORDER BY total_xp DESC, updated_at ASC, user_id ASC
             LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok(LeaderboardRow {
                    user_id:       row.get(0)?,
                    total_xp:      row.get(1)?,
                    current_level: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn user_count(&self) -> GameResult<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM user_gamification",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

impl StoreTx<'_> {
    pub fn load_state(&self, user_id: &str) -> GameResult<Option<UserGamificationState>> {
        load_state(&self.tx, user_id)
    }

    pub fn insert_state(&self, state: &UserGamificationState) -> GameResult<()> {
        self.tx.execute(
            "INSERT INTO user_gamification (
                user_id, total_xp, current_level, level_progress,
                monthly_points, points_used, points_earned, points_reset_date,
                streak, last_activity_date, version, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                state.user_id,
                state.total_xp,
                state.current_level,
                state.level_progress,
                state.points.monthly_points,
                state.points.points_used,
                state.points.points_earned,
                state.points.points_reset_date,
                state.streak,
                state.last_activity_date,
                state.version,
                state.created_at,
                state.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Compare-and-set write of the whole row. Succeeds only when the stored
    /// version still equals `state.version`; bumps the version on success.
    pub fn update_state(&self, state: &mut UserGamificationState) -> GameResult<()> {
        let changed = self.tx.execute(
            "UPDATE user_gamification
             SET total_xp = ?1, current_level = ?2, level_progress = ?3,
                 monthly_points = ?4, points_used = ?5, points_earned = ?6,
                 points_reset_date = ?7, streak = ?8, last_activity_date = ?9,
                 updated_at = ?10, version = version + 1
             WHERE user_id = ?11 AND version = ?12",
            params![
                state.total_xp,
                state.current_level,
                state.level_progress,
                state.points.monthly_points,
                state.points.points_used,
                state.points.points_earned,
                state.points.points_reset_date,
                state.streak,
                state.last_activity_date,
                state.updated_at,
                state.user_id,
                state.version,
            ],
        )?;
        if changed == 0 {
            return Err(GameError::conflict(
                &state.user_id,
                format!("state version {} is stale", state.version),
            ));
        }
        state.version += 1;
        Ok(())
    }
}
