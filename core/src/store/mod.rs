//! SQLite persistence layer.
//!
//! RULE: Only store/ talks to the database.
//! The engine calls store methods; it never executes SQL directly.
//!
//! Reads go through `GameStore`. Every mutation goes through a `StoreTx`,
//! an IMMEDIATE transaction that takes the write lock up front, so
//! read-modify-write sequences on one user's row are serialised across
//! connections. Dropping a `StoreTx` without `commit()` rolls it back.

use crate::{
    badges::StatField,
    error::{GameError, GameResult},
    event::{EventLogEntry, GamificationEvent},
    leveling::XpSource,
    points::{PointsSource, SpendType},
};
use chrono::{DateTime, Utc};
use rusqlite::{
    params,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
    Connection, ToSql, Transaction, TransactionBehavior,
};
use std::time::Duration;

mod badge;
mod points;
mod stat;
mod state;
mod xp;

pub use state::LeaderboardRow;

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct GameStore {
    conn: Connection,
}

impl GameStore {
    pub fn open(path: &str) -> GameResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> GameResult<Self> {
        let conn = Connection::open(":memory:")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    pub fn set_busy_timeout(&self, timeout: Duration) -> GameResult<()> {
        self.conn.busy_timeout(timeout)?;
        Ok(())
    }

    /// Apply all schema migrations in order. Idempotent.
    pub fn migrate(&self) -> GameResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_gamification_state.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_transactions.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/003_badges_and_stats.sql"))?;
        Ok(())
    }

    /// Start a write transaction. Fails with `ConcurrencyConflict` when
    /// another connection still holds the write lock after the busy timeout.
    pub fn begin_write(&mut self) -> GameResult<StoreTx<'_>> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        Ok(StoreTx { tx })
    }

    // ── Event log ──────────────────────────────────────────────

    pub fn events_for_user(&self, user_id: &str) -> GameResult<Vec<EventLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, event_type, payload, created_at
             FROM event_log WHERE user_id = ?1
             ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map(params![user_id], |row| {
                Ok(EventLogEntry {
                    id:         Some(row.get(0)?),
                    user_id:    row.get(1)?,
                    event_type: row.get(2)?,
                    payload:    row.get(3)?,
                    created_at: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}

/// One atomic unit of work. Every mutation and its audit records are
/// written through the same `StoreTx` and land together or not at all.
pub struct StoreTx<'a> {
    tx: Transaction<'a>,
}

impl StoreTx<'_> {
    pub fn commit(self) -> GameResult<()> {
        self.tx.commit()?;
        Ok(())
    }

    pub fn append_event(&self, event: &GamificationEvent, at: DateTime<Utc>) -> GameResult<()> {
        let payload = serde_json::to_string(event)?;
        self.tx.execute(
            "INSERT INTO event_log (user_id, event_type, payload, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![event.user_id(), event.type_name(), payload, at],
        )?;
        Ok(())
    }

    pub fn append_events(&self, events: &[GamificationEvent], at: DateTime<Utc>) -> GameResult<()> {
        for event in events {
            self.append_event(event, at)?;
        }
        Ok(())
    }
}

// ── Enum <-> TEXT column mapping ───────────────────────────────

macro_rules! text_enum_sql {
    ($($ty:ty),* $(,)?) => {$(
        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e: GameError| FromSqlError::Other(Box::new(e)))
            }
        }
    )*};
}

text_enum_sql!(XpSource, PointsSource, SpendType, StatField);
