//! Engine events: the record of every state change.
//!
//! RULE: Every mutation appends its events to `event_log` inside the same
//! SQLite transaction as the change itself. Events never replace the XP or
//! points transaction tables; they are the cross-cutting activity feed.

use crate::{
    leveling::XpSource,
    points::{PointsSource, SpendType},
    types::{Level, Points, UserId, Xp},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Variants are added over time; never removed or reordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GamificationEvent {
    // ── XP ─────────────────────────────────────────
    XpAwarded {
        user_id:   UserId,
        amount:    Xp,
        source:    XpSource,
        total_xp:  Xp,
    },
    LevelUp {
        user_id:   UserId,
        from:      Level,
        to:        Level,
    },

    // ── Badges ─────────────────────────────────────
    BadgeEarned {
        user_id:   UserId,
        badge_id:  String,
        xp_reward: Xp,
    },

    // ── Points ─────────────────────────────────────
    PointsSpent {
        user_id:    UserId,
        amount:     Points,
        spend_type: SpendType,
        available:  Points,
    },
    PointsCredited {
        user_id:   UserId,
        amount:    Points,
        source:    PointsSource,
        available: Points,
    },
    PointsSetExact {
        user_id:  UserId,
        target:   Points,
        delta:    Points,
        admin_id: Option<String>,
    },
    PointsMonthlyReset {
        user_id:         UserId,
        restored:        Points,
        next_reset_date: DateTime<Utc>,
    },

    // ── Activity ───────────────────────────────────
    StreakUpdated {
        user_id: UserId,
        streak:  u32,
    },
}

impl GamificationEvent {
    pub fn user_id(&self) -> &str {
        match self {
            GamificationEvent::XpAwarded { user_id, .. }
            | GamificationEvent::LevelUp { user_id, .. }
            | GamificationEvent::BadgeEarned { user_id, .. }
            | GamificationEvent::PointsSpent { user_id, .. }
            | GamificationEvent::PointsCredited { user_id, .. }
            | GamificationEvent::PointsSetExact { user_id, .. }
            | GamificationEvent::PointsMonthlyReset { user_id, .. }
            | GamificationEvent::StreakUpdated { user_id, .. } => user_id,
        }
    }

    /// Stable name stored in the `event_type` column.
    pub fn type_name(&self) -> &'static str {
        match self {
            GamificationEvent::XpAwarded { .. }          => "xp_awarded",
            GamificationEvent::LevelUp { .. }            => "level_up",
            GamificationEvent::BadgeEarned { .. }        => "badge_earned",
            GamificationEvent::PointsSpent { .. }        => "points_spent",
            GamificationEvent::PointsCredited { .. }     => "points_credited",
            GamificationEvent::PointsSetExact { .. }     => "points_set_exact",
            GamificationEvent::PointsMonthlyReset { .. } => "points_monthly_reset",
            GamificationEvent::StreakUpdated { .. }      => "streak_updated",
        }
    }
}

/// A persisted row of the event log.
#[derive(Debug, Clone)]
pub struct EventLogEntry {
    pub id:         Option<i64>,
    pub user_id:    UserId,
    pub event_type: String,
    pub payload:    String,
    pub created_at: DateTime<Utc>,
}
