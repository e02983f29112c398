//! XP and leveling.
//!
//! Level thresholds follow `threshold(n) = round(base * (n - 1)^exponent)`,
//! so level 1 starts at 0 XP and every later level costs more than the one
//! before it. The constants live in `LevelCurveConfig`; the table is built
//! once per engine and every lookup is a binary search.

use crate::{
    config::LevelCurveConfig,
    error::{GameError, GameResult},
    types::{Level, TransactionId, UserId, Xp},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Why XP was awarded. Wire names are SCREAMING_SNAKE_CASE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum XpSource {
    CvUploaded,
    CvAnalyzed,
    ProfileUpdated,
    ProfileCompleted,
    JobSaved,
    ApplicationSubmitted,
    DailyLogin,
    StreakBonus,
    BadgeEarned,
    Referral,
    AdminGrant,
}

impl XpSource {
    pub const ALL: [XpSource; 11] = [
        XpSource::CvUploaded,
        XpSource::CvAnalyzed,
        XpSource::ProfileUpdated,
        XpSource::ProfileCompleted,
        XpSource::JobSaved,
        XpSource::ApplicationSubmitted,
        XpSource::DailyLogin,
        XpSource::StreakBonus,
        XpSource::BadgeEarned,
        XpSource::Referral,
        XpSource::AdminGrant,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            XpSource::CvUploaded           => "CV_UPLOADED",
            XpSource::CvAnalyzed           => "CV_ANALYZED",
            XpSource::ProfileUpdated       => "PROFILE_UPDATED",
            XpSource::ProfileCompleted     => "PROFILE_COMPLETED",
            XpSource::JobSaved             => "JOB_SAVED",
            XpSource::ApplicationSubmitted => "APPLICATION_SUBMITTED",
            XpSource::DailyLogin           => "DAILY_LOGIN",
            XpSource::StreakBonus          => "STREAK_BONUS",
            XpSource::BadgeEarned          => "BADGE_EARNED",
            XpSource::Referral             => "REFERRAL",
            XpSource::AdminGrant           => "ADMIN_GRANT",
        }
    }
}

impl fmt::Display for XpSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for XpSource {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        XpSource::ALL
            .into_iter()
            .find(|src| src.as_str() == s)
            .ok_or_else(|| GameError::invalid(format!("unknown XP source '{s}'")))
    }
}

/// Immutable audit record for one XP award.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XpTransaction {
    pub id:          TransactionId,
    pub user_id:     UserId,
    pub amount:      Xp,
    pub source:      XpSource,
    pub source_id:   Option<String>,
    pub description: Option<String>,
    pub earned_at:   DateTime<Utc>,
}

/// Level and progress derived from a total XP value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelInfo {
    pub level:             Level,
    /// Fraction of the way to the next level, in `[0, 1)`.
    /// Exactly 1.0 once the maximum level is reached.
    pub progress:          f64,
    pub current_threshold: Xp,
    pub next_threshold:    Option<Xp>,
}

impl LevelInfo {
    pub fn xp_to_next_level(&self, total_xp: Xp) -> Option<Xp> {
        self.next_threshold.map(|t| (t - total_xp).max(0))
    }
}

/// Precomputed threshold table. `thresholds[i]` is the XP needed for level `i + 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelCurve {
    thresholds: Vec<Xp>,
}

impl LevelCurve {
    pub fn from_config(cfg: &LevelCurveConfig) -> GameResult<Self> {
        cfg.validate()?;
        let thresholds = (1..=cfg.max_level)
            .map(|n| (cfg.base * f64::from(n - 1).powf(cfg.exponent)).round() as Xp)
            .collect::<Vec<_>>();
        if let Some(w) = thresholds.windows(2).find(|w| w[0] >= w[1]) {
            return Err(GameError::invalid(format!(
                "level thresholds must strictly increase, found {} then {}",
                w[0], w[1]
            )));
        }
        Ok(Self { thresholds })
    }

    pub fn max_level(&self) -> Level {
        self.thresholds.len() as Level
    }

    /// XP required to reach `level`. `None` outside `1..=max_level`.
    pub fn threshold(&self, level: Level) -> Option<Xp> {
        if level == 0 {
            return None;
        }
        self.thresholds.get(level as usize - 1).copied()
    }

    pub fn compute_level(&self, total_xp: Xp) -> GameResult<LevelInfo> {
        if total_xp < 0 {
            return Err(GameError::invalid(format!(
                "total XP must be non-negative, got {total_xp}"
            )));
        }

        // thresholds[0] == 0, so at least one entry always satisfies `<=`.
        let level = self.thresholds.partition_point(|t| *t <= total_xp);
        let current_threshold = self.thresholds[level - 1];
        let next_threshold = self.thresholds.get(level).copied();

        let progress = match next_threshold {
            Some(next) => {
                let span = (next - current_threshold) as f64;
                ((total_xp - current_threshold) as f64 / span).clamp(0.0, 1.0 - f64::EPSILON)
            }
            None => 1.0,
        };

        Ok(LevelInfo {
            level: level as Level,
            progress,
            current_threshold,
            next_threshold,
        })
    }
}

/// Result of adding XP to a running total.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct XpOutcome {
    pub previous_xp:    Xp,
    pub new_total:      Xp,
    pub previous_level: Level,
    pub level:          LevelInfo,
}

impl XpOutcome {
    /// The new level when this award crossed at least one threshold.
    pub fn level_up(&self) -> Option<Level> {
        (self.level.level > self.previous_level).then_some(self.level.level)
    }
}

/// Add `amount` to `current_xp` and recompute the level.
pub fn apply_xp(curve: &LevelCurve, current_xp: Xp, amount: Xp) -> GameResult<XpOutcome> {
    if amount <= 0 {
        return Err(GameError::invalid(format!("XP amount must be positive, got {amount}")));
    }
    let previous = curve.compute_level(current_xp)?;
    let new_total = current_xp
        .checked_add(amount)
        .ok_or_else(|| GameError::invalid("XP total would overflow"))?;
    let level = curve.compute_level(new_total)?;

    Ok(XpOutcome {
        previous_xp: current_xp,
        new_total,
        previous_level: previous.level,
        level,
    })
}
