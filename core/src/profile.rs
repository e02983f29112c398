//! Read models and request/response shapes at the engine boundary.
//! Field names follow the platform's camelCase JSON.

use crate::{
    badges::BadgeWithProgress,
    error::{GameError, GameResult},
    leveling::{LevelInfo, XpSource, XpTransaction},
    points::PointsTransaction,
    state::UserGamificationState,
    store::LeaderboardRow,
    types::{Level, Points, TransactionId, UserId, Xp},
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwardXpRequest {
    pub user_id:     UserId,
    pub amount:      Xp,
    pub source:      XpSource,
    #[serde(default)]
    pub source_id:   Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl AwardXpRequest {
    pub fn new(user_id: &str, amount: Xp, source: XpSource) -> Self {
        Self {
            user_id: user_id.to_string(),
            amount,
            source,
            source_id: None,
            description: None,
        }
    }

    pub fn with_source_id(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn validate(&self) -> GameResult<()> {
        require_user_id(&self.user_id)?;
        if self.amount <= 0 {
            return Err(GameError::invalid(format!(
                "XP amount must be positive, got {}",
                self.amount
            )));
        }
        Ok(())
    }
}

pub(crate) fn require_user_id(user_id: &str) -> GameResult<()> {
    if user_id.trim().is_empty() {
        return Err(GameError::invalid("user id must not be empty"));
    }
    Ok(())
}

/// What `award_xp` did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct XpAward {
    pub user_id:        UserId,
    pub xp_awarded:     Xp,
    #[serde(rename = "totalXP")]
    pub total_xp:       Xp,
    pub level:          Level,
    /// Present only when the award crossed a level threshold.
    pub new_level:      Option<Level>,
    pub transaction_id: TransactionId,
}

/// Wire response for an XP award.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwardXpResponse {
    pub success:    bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xp_awarded: Option<Xp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_level:  Option<Level>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error:      Option<String>,
}

impl From<GameResult<XpAward>> for AwardXpResponse {
    fn from(result: GameResult<XpAward>) -> Self {
        match result {
            Ok(award) => AwardXpResponse {
                success:    true,
                xp_awarded: Some(award.xp_awarded),
                new_level:  award.new_level,
                error:      None,
            },
            Err(e) => AwardXpResponse {
                success:    false,
                xp_awarded: None,
                new_level:  None,
                error:      Some(e.to_string()),
            },
        }
    }
}

/// What a points mutation did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PointsReceipt {
    pub user_id:        UserId,
    /// Signed change applied to the balance.
    pub delta:          Points,
    pub available:      Points,
    /// None when nothing changed (set-exact to the current value).
    pub transaction_id: Option<TransactionId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecentTransaction {
    Xp(XpTransaction),
    Points(PointsTransaction),
}

impl RecentTransaction {
    pub fn at(&self) -> DateTime<Utc> {
        match self {
            RecentTransaction::Xp(t)     => t.earned_at,
            RecentTransaction::Points(t) => t.created_at,
        }
    }
}

/// Newest-first merge of XP and points history, truncated to `limit`.
/// Both inputs must already be newest first.
pub fn merge_recent(
    xp: Vec<XpTransaction>,
    points: Vec<PointsTransaction>,
    limit: usize,
) -> Vec<RecentTransaction> {
    let mut merged: Vec<RecentTransaction> = xp
        .into_iter()
        .map(RecentTransaction::Xp)
        .chain(points.into_iter().map(RecentTransaction::Points))
        .collect();
    // Stable sort keeps per-table insertion order for equal timestamps.
    merged.sort_by(|a, b| b.at().cmp(&a.at()));
    merged.truncate(limit);
    merged
}

/// Aggregate gamification view of one user.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GamificationProfile {
    pub user_id:            UserId,
    #[serde(rename = "totalXP")]
    pub total_xp:           Xp,
    pub current_level:      Level,
    pub level_progress:     f64,
    pub xp_to_next_level:   Option<Xp>,
    pub monthly_points:     Points,
    pub points_used:        Points,
    pub points_earned:      Points,
    pub available_points:   Points,
    pub points_reset_date:  DateTime<Utc>,
    pub streak:             u32,
    pub last_activity_date: Option<NaiveDate>,
    pub badges:             Vec<BadgeWithProgress>,
    pub recent_transactions: Vec<RecentTransaction>,
}

impl GamificationProfile {
    pub fn assemble(
        state: &UserGamificationState,
        level: &LevelInfo,
        badges: Vec<BadgeWithProgress>,
        recent_transactions: Vec<RecentTransaction>,
    ) -> GameResult<Self> {
        Ok(Self {
            user_id:            state.user_id.clone(),
            total_xp:           state.total_xp,
            current_level:      state.current_level,
            level_progress:     state.level_progress,
            xp_to_next_level:   level.xp_to_next_level(state.total_xp),
            monthly_points:     state.points.monthly_points,
            points_used:        state.points.points_used,
            points_earned:      state.points.points_earned,
            available_points:   state.points.available()?,
            points_reset_date:  state.points.points_reset_date,
            streak:             state.streak,
            last_activity_date: state.last_activity_date,
            badges,
            recent_transactions,
        })
    }

    pub fn earned_badge_count(&self) -> usize {
        self.badges.iter().filter(|b| b.is_earned).count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: usize,
    #[serde(flatten)]
    pub row:  LeaderboardRow,
}
