//! Store methods for user stats: reported values plus the derived
//! snapshot badge requirements are evaluated against.

use super::{xp::xp_source_counts, GameStore, StoreTx};
use crate::{
    badges::{StatField, UserStats},
    error::GameResult,
    leveling::XpSource,
    state::UserGamificationState,
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

fn reported_stats(conn: &Connection, user_id: &str) -> GameResult<Vec<(StatField, i64)>> {
    let mut stmt = conn.prepare("SELECT field, value FROM user_stat WHERE user_id = ?1")?;
    let stats = stmt
        .query_map(params![user_id], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(stats)
}

fn user_stats(conn: &Connection, state: &UserGamificationState) -> GameResult<UserStats> {
    let counts = xp_source_counts(conn, &state.user_id)?;
    let count = |source: XpSource| counts.get(&source).copied().unwrap_or(0);

    let mut stats = UserStats {
        cvs_uploaded:           count(XpSource::CvUploaded),
        cv_analyses:            count(XpSource::CvAnalyzed),
        jobs_saved:             count(XpSource::JobSaved),
        applications_submitted: count(XpSource::ApplicationSubmitted),
        streak:                 i64::from(state.streak),
        level:                  i64::from(state.current_level),
        total_xp:               state.total_xp,
        ..UserStats::default()
    };

    for (field, value) in reported_stats(conn, &state.user_id)? {
        match field {
            StatField::ProfileCompleteness => stats.profile_completeness = value,
            StatField::HasAvatar => stats.has_avatar = value != 0,
            StatField::HasGithubLinked => stats.has_github_linked = value != 0,
            // Derived fields are never written to user_stat.
            _ => {}
        }
    }
    Ok(stats)
}

impl GameStore {
    pub fn user_stats(&self, state: &UserGamificationState) -> GameResult<UserStats> {
        user_stats(&self.conn, state)
    }
}

impl StoreTx<'_> {
    pub fn upsert_stat(
        &self,
        user_id: &str,
        field: StatField,
        value: i64,
        at: DateTime<Utc>,
    ) -> GameResult<()> {
        self.tx.execute(
            "INSERT INTO user_stat (user_id, field, value, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (user_id, field)
             DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![user_id, field, value, at],
        )?;
        Ok(())
    }
}
