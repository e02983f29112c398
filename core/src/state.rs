//! Per-user aggregate gamification state.

use crate::{
    error::GameResult,
    leveling::XpOutcome,
    points::PointsBalance,
    types::{Level, Points, UserId, Xp},
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserGamificationState {
    pub user_id:            UserId,
    #[serde(rename = "totalXP")]
    pub total_xp:           Xp,
    pub current_level:      Level,
    pub level_progress:     f64,
    #[serde(flatten)]
    pub points:             PointsBalance,
    pub streak:             u32,
    pub last_activity_date: Option<NaiveDate>,
    /// Bumped on every write; updates compare-and-set against it.
    pub version:            i64,
    pub created_at:         DateTime<Utc>,
    pub updated_at:         DateTime<Utc>,
}

impl UserGamificationState {
    pub fn new(user_id: &str, monthly_points: Points, now: DateTime<Utc>) -> GameResult<Self> {
        Ok(Self {
            user_id:            user_id.to_string(),
            total_xp:           0,
            current_level:      1,
            level_progress:     0.0,
            points:             PointsBalance::new(monthly_points, now)?,
            streak:             0,
            last_activity_date: None,
            version:            0,
            created_at:         now,
            updated_at:         now,
        })
    }

    pub fn apply_xp(&mut self, outcome: &XpOutcome) {
        debug_assert!(outcome.new_total >= self.total_xp);
        self.total_xp = outcome.new_total;
        self.current_level = outcome.level.level;
        self.level_progress = outcome.level.progress;
    }

    /// Update the daily streak for activity on `today`.
    /// Same day: unchanged. Next day: +1. Any gap: back to 1.
    /// Returns true when the streak or activity date changed.
    pub fn record_activity(&mut self, today: NaiveDate) -> bool {
        let next = match self.last_activity_date {
            None => 1,
            Some(last) => match (today - last).num_days() {
                d if d <= 0 => self.streak.max(1),
                1 => self.streak + 1,
                _ => 1,
            },
        };
        let is_new_day = self.last_activity_date.map_or(true, |d| d < today);
        let changed = next != self.streak || is_new_day;
        self.streak = next;
        if is_new_day {
            self.last_activity_date = Some(today);
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn state() -> UserGamificationState {
        let now = Utc.with_ymd_and_hms(2026, 5, 10, 8, 0, 0).unwrap();
        UserGamificationState::new("dev-1", 100, now).unwrap()
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, d).unwrap()
    }

    #[test]
    fn first_activity_starts_streak() {
        let mut s = state();
        assert!(s.record_activity(day(10)));
        assert_eq!(s.streak, 1);
        assert_eq!(s.last_activity_date, Some(day(10)));
    }

    #[test]
    fn consecutive_days_extend_streak() {
        let mut s = state();
        s.record_activity(day(10));
        s.record_activity(day(11));
        s.record_activity(day(12));
        assert_eq!(s.streak, 3);
    }

    #[test]
    fn same_day_is_a_no_op() {
        let mut s = state();
        s.record_activity(day(10));
        assert!(!s.record_activity(day(10)));
        assert_eq!(s.streak, 1);
    }

    #[test]
    fn gap_resets_streak() {
        let mut s = state();
        s.record_activity(day(10));
        s.record_activity(day(11));
        s.record_activity(day(14));
        assert_eq!(s.streak, 1);
        assert_eq!(s.last_activity_date, Some(day(14)));
    }
}
