//! Points: a monthly budget topped up by non-expiring earned points.
//!
//!   available = monthly_points - points_used + points_earned
//!
//! `points_used` returns to 0 at each monthly reset; `points_earned`
//! carries across months. Admin "set exact" never overwrites the
//! allocation: it folds the difference into `points_earned`.
//!
//! Resets are lazy. Every read or write of a balance first calls
//! `reset_if_due` with the current time.

use crate::{
    error::{GameError, GameResult},
    types::{Points, TransactionId, UserId},
};
use chrono::{DateTime, Datelike, Months, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PointsSource {
    Spend,
    AdminGranted,
    AdminSetExact,
    Bonus,
    Referral,
    MonthlyReset,
}

impl PointsSource {
    pub const ALL: [PointsSource; 6] = [
        PointsSource::Spend,
        PointsSource::AdminGranted,
        PointsSource::AdminSetExact,
        PointsSource::Bonus,
        PointsSource::Referral,
        PointsSource::MonthlyReset,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PointsSource::Spend         => "SPEND",
            PointsSource::AdminGranted  => "ADMIN_GRANTED",
            PointsSource::AdminSetExact => "ADMIN_SET_EXACT",
            PointsSource::Bonus         => "BONUS",
            PointsSource::Referral      => "REFERRAL",
            PointsSource::MonthlyReset  => "MONTHLY_RESET",
        }
    }
}

impl fmt::Display for PointsSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PointsSource {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PointsSource::ALL
            .into_iter()
            .find(|src| src.as_str() == s)
            .ok_or_else(|| GameError::invalid(format!("unknown points source '{s}'")))
    }
}

/// What spent points were used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpendType {
    CvAnalysis,
    JobApplication,
    ProfileBoost,
    PremiumSearch,
}

impl SpendType {
    pub const ALL: [SpendType; 4] = [
        SpendType::CvAnalysis,
        SpendType::JobApplication,
        SpendType::ProfileBoost,
        SpendType::PremiumSearch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SpendType::CvAnalysis     => "CV_ANALYSIS",
            SpendType::JobApplication => "JOB_APPLICATION",
            SpendType::ProfileBoost   => "PROFILE_BOOST",
            SpendType::PremiumSearch  => "PREMIUM_SEARCH",
        }
    }
}

impl fmt::Display for SpendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SpendType {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SpendType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| GameError::invalid(format!("unknown spend type '{s}'")))
    }
}

/// Immutable audit record for one points change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointsTransaction {
    pub id:          TransactionId,
    pub user_id:     UserId,
    pub amount:      Points,
    pub source:      PointsSource,
    pub spend_type:  Option<SpendType>,
    pub description: Option<String>,
    pub metadata:    serde_json::Value,
    pub created_at:  DateTime<Utc>,
}

/// The points portion of a user's state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointsBalance {
    pub monthly_points:    Points,
    pub points_used:       Points,
    pub points_earned:     Points,
    pub points_reset_date: DateTime<Utc>,
}

/// A reset that `reset_if_due` applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonthlyReset {
    pub restored:            Points,
    pub previous_reset_date: DateTime<Utc>,
    pub next_reset_date:     DateTime<Utc>,
}

impl PointsBalance {
    /// Fresh balance for a user first seen at `now`.
    pub fn new(monthly_points: Points, now: DateTime<Utc>) -> GameResult<Self> {
        Ok(Self {
            monthly_points,
            points_used: 0,
            points_earned: 0,
            points_reset_date: start_of_next_month(now)?,
        })
    }

    /// Fails when the three counters no longer fit in a `Points`.
    pub fn available(&self) -> GameResult<Points> {
        self.monthly_points
            .checked_sub(self.points_used)
            .and_then(|p| p.checked_add(self.points_earned))
            .ok_or_else(out_of_range)
    }

    /// Apply the monthly reset when `now` has reached the reset date.
    /// Several missed months collapse into one reset.
    pub fn reset_if_due(&mut self, now: DateTime<Utc>) -> GameResult<Option<MonthlyReset>> {
        if now < self.points_reset_date {
            return Ok(None);
        }
        let previous_reset_date = self.points_reset_date;
        let mut next = previous_reset_date;
        while next <= now {
            next = add_one_month(next)?;
        }

        let restored = self.points_used;
        self.points_used = 0;
        self.points_reset_date = next;

        Ok(Some(MonthlyReset {
            restored,
            previous_reset_date,
            next_reset_date: next,
        }))
    }

    /// Consume `amount`. Leaves the balance untouched on error.
    pub fn spend(&mut self, amount: Points) -> GameResult<()> {
        require_positive(amount, "spend")?;
        let available = self.available()?;
        if amount > available {
            return Err(GameError::InsufficientPoints {
                requested: amount,
                available,
            });
        }
        let points_used = self.points_used.checked_add(amount).ok_or_else(out_of_range)?;
        self.commit(Self { points_used, ..*self })
    }

    /// Add `amount` earned points. Leaves the balance untouched on error.
    pub fn credit(&mut self, amount: Points) -> GameResult<()> {
        require_positive(amount, "credit")?;
        let points_earned = self.points_earned.checked_add(amount).ok_or_else(out_of_range)?;
        self.commit(Self { points_earned, ..*self })
    }

    /// Make `available()` equal `target` by adjusting `points_earned`.
    /// Returns the applied delta, which may be negative or zero.
    pub fn set_exact(&mut self, target: Points) -> GameResult<Points> {
        if target < 0 {
            return Err(GameError::invalid(format!(
                "target points must be non-negative, got {target}"
            )));
        }
        let delta = target.checked_sub(self.available()?).ok_or_else(out_of_range)?;
        let points_earned = self.points_earned.checked_add(delta).ok_or_else(out_of_range)?;
        self.commit(Self { points_earned, ..*self })?;
        Ok(delta)
    }

    /// Replace `self` with `next` only if its balance is representable.
    fn commit(&mut self, next: Self) -> GameResult<()> {
        next.available()?;
        *self = next;
        Ok(())
    }
}

fn out_of_range() -> GameError {
    GameError::invalid("points balance would overflow")
}

fn require_positive(amount: Points, op: &str) -> GameResult<()> {
    if amount <= 0 {
        return Err(GameError::invalid(format!(
            "{op} amount must be positive, got {amount}"
        )));
    }
    Ok(())
}

/// Midnight UTC on the first day of the month after `now`.
/// Anchoring resets to day 1 keeps month arithmetic from drifting.
pub fn start_of_next_month(now: DateTime<Utc>) -> GameResult<DateTime<Utc>> {
    let first = NaiveDate::from_ymd_opt(now.year(), now.month(), 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| GameError::invalid(format!("cannot derive month start from {now}")))?;
    add_one_month(Utc.from_utc_datetime(&first))
}

fn add_one_month(at: DateTime<Utc>) -> GameResult<DateTime<Utc>> {
    at.checked_add_months(Months::new(1))
        .ok_or_else(|| GameError::invalid(format!("reset date out of range after {at}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    fn balance() -> PointsBalance {
        PointsBalance::new(100, at(2026, 3, 14)).unwrap()
    }

    #[test]
    fn new_balance_resets_on_first_of_next_month() {
        let b = balance();
        assert_eq!(b.points_reset_date, Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap());
        assert_eq!(b.available().unwrap(), 100);
    }

    #[test]
    fn december_rolls_into_next_year() {
        let b = PointsBalance::new(100, at(2026, 12, 31)).unwrap();
        assert_eq!(b.points_reset_date, Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn spending_everything_leaves_zero() {
        let mut b = balance();
        b.spend(100).unwrap();
        assert_eq!(b.available().unwrap(), 0);
        assert!(b.spend(1).is_err());
    }

    #[test]
    fn overspend_is_rejected_without_change() {
        let mut b = balance();
        let before = b;
        let err = b.spend(150).unwrap_err();
        assert!(matches!(
            err,
            GameError::InsufficientPoints { requested: 150, available: 100 }
        ));
        assert_eq!(b, before);
    }

    #[test]
    fn earned_points_extend_the_budget() {
        let mut b = balance();
        b.credit(50).unwrap();
        b.spend(140).unwrap();
        assert_eq!(b.available().unwrap(), 10);
    }

    #[test]
    fn non_positive_amounts_are_rejected() {
        let mut b = balance();
        assert!(matches!(b.spend(0), Err(GameError::InvalidArgument(_))));
        assert!(matches!(b.spend(-3), Err(GameError::InvalidArgument(_))));
        assert!(matches!(b.credit(0), Err(GameError::InvalidArgument(_))));
    }

    #[test]
    fn set_exact_applies_delta_to_earned() {
        let mut b = balance();
        b.spend(60).unwrap(); // available 40
        let delta = b.set_exact(100).unwrap();
        assert_eq!(delta, 60);
        assert_eq!(b.points_earned, 60);
        assert_eq!(b.monthly_points, 100);
        assert_eq!(b.available().unwrap(), 100);
    }

    #[test]
    fn set_exact_can_lower_the_balance() {
        let mut b = balance();
        let delta = b.set_exact(30).unwrap();
        assert_eq!(delta, -70);
        assert_eq!(b.available().unwrap(), 30);
        assert!(b.set_exact(-1).is_err());
    }

    #[test]
    fn reset_clears_used_and_keeps_earned() {
        let mut b = balance();
        b.credit(25).unwrap();
        b.spend(90).unwrap();

        assert_eq!(b.reset_if_due(at(2026, 3, 31)).unwrap(), None);

        let reset = b.reset_if_due(at(2026, 4, 1)).unwrap().expect("reset due");
        assert_eq!(reset.restored, 90);
        assert_eq!(b.points_used, 0);
        assert_eq!(b.points_earned, 25);
        assert_eq!(b.points_reset_date, Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn missed_months_collapse_into_one_reset() {
        let mut b = balance();
        b.spend(10).unwrap();
        let reset = b.reset_if_due(at(2026, 8, 20)).unwrap().expect("reset due");
        assert_eq!(reset.previous_reset_date, Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap());
        assert_eq!(b.points_reset_date, Utc.with_ymd_and_hms(2026, 9, 1, 0, 0, 0).unwrap());
        assert_eq!(b.reset_if_due(at(2026, 8, 21)).unwrap(), None);
    }

    #[test]
    fn overflowing_credit_is_rejected_without_change() {
        let mut b = balance();
        let before = b;
        // earned alone fits, but available = 100 + earned does not.
        let err = b.credit(Points::MAX - 50).unwrap_err();
        assert!(matches!(err, GameError::InvalidArgument(_)), "got {err:?}");
        assert_eq!(b, before);

        b.credit(Points::MAX - 200).unwrap();
        assert_eq!(b.available().unwrap(), Points::MAX - 100);
        assert!(b.credit(101).is_err());
        assert_eq!(b.available().unwrap(), Points::MAX - 100);
    }

    #[test]
    fn unrepresentable_balance_reports_an_error() {
        let b = PointsBalance {
            points_used: Points::MIN,
            ..balance()
        };
        assert!(matches!(b.available(), Err(GameError::InvalidArgument(_))));
        let mut b = b;
        assert!(b.set_exact(10).is_err());
        assert!(b.spend(1).is_err());
    }
}
