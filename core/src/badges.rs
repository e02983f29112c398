//! Badge definitions and requirement evaluation.
//!
//! Definitions are static reference data. Each badge carries one or more
//! `Requirement`s, a tagged variant evaluated by `Requirement::progress`
//! against a `UserStats` snapshot. Evaluation here is pure; earning
//! (the idempotent insert) happens in the engine.

use crate::{
    error::{GameError, GameResult},
    types::{BadgeId, UserId, Xp},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// A stat a requirement can read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatField {
    // Reported by the profile layer through `record_stat`.
    ProfileCompleteness,
    HasAvatar,
    HasGithubLinked,
    // Derived from XP transaction counts.
    CvsUploaded,
    CvAnalyses,
    JobsSaved,
    ApplicationsSubmitted,
    // Read from the aggregate state row.
    Streak,
    Level,
    TotalXp,
}

impl StatField {
    pub const ALL: [StatField; 10] = [
        StatField::ProfileCompleteness,
        StatField::HasAvatar,
        StatField::HasGithubLinked,
        StatField::CvsUploaded,
        StatField::CvAnalyses,
        StatField::JobsSaved,
        StatField::ApplicationsSubmitted,
        StatField::Streak,
        StatField::Level,
        StatField::TotalXp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StatField::ProfileCompleteness   => "profile_completeness",
            StatField::HasAvatar             => "has_avatar",
            StatField::HasGithubLinked       => "has_github_linked",
            StatField::CvsUploaded           => "cvs_uploaded",
            StatField::CvAnalyses            => "cv_analyses",
            StatField::JobsSaved             => "jobs_saved",
            StatField::ApplicationsSubmitted => "applications_submitted",
            StatField::Streak                => "streak",
            StatField::Level                 => "level",
            StatField::TotalXp               => "total_xp",
        }
    }

    /// Fields the engine cannot derive and must be told about.
    pub fn is_reported(&self) -> bool {
        matches!(
            self,
            StatField::ProfileCompleteness | StatField::HasAvatar | StatField::HasGithubLinked
        )
    }

    /// Check a reported value before storing it.
    pub fn validate_reported(&self, value: i64) -> GameResult<()> {
        if !self.is_reported() {
            return Err(GameError::invalid(format!(
                "stat '{self}' is derived by the engine and cannot be reported"
            )));
        }
        let valid = match self {
            StatField::ProfileCompleteness => (0..=100).contains(&value),
            _ => value == 0 || value == 1,
        };
        if !valid {
            return Err(GameError::invalid(format!("value {value} out of range for stat '{self}'")));
        }
        Ok(())
    }
}

impl fmt::Display for StatField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatField {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StatField::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| GameError::invalid(format!("unknown stat field '{s}'")))
    }
}

/// Snapshot of everything a badge requirement may look at.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub profile_completeness:   i64,
    pub has_avatar:             bool,
    pub has_github_linked:      bool,
    pub cvs_uploaded:           i64,
    pub cv_analyses:            i64,
    pub jobs_saved:             i64,
    pub applications_submitted: i64,
    pub streak:                 i64,
    pub level:                  i64,
    pub total_xp:               i64,
}

impl UserStats {
    pub fn value(&self, field: StatField) -> i64 {
        match field {
            StatField::ProfileCompleteness   => self.profile_completeness,
            StatField::HasAvatar             => i64::from(self.has_avatar),
            StatField::HasGithubLinked       => i64::from(self.has_github_linked),
            StatField::CvsUploaded           => self.cvs_uploaded,
            StatField::CvAnalyses            => self.cv_analyses,
            StatField::JobsSaved             => self.jobs_saved,
            StatField::ApplicationsSubmitted => self.applications_submitted,
            StatField::Streak                => self.streak,
            StatField::Level                 => self.level,
            StatField::TotalXp               => self.total_xp,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Requirement {
    /// `field >= min`; progress grows linearly toward `min`.
    Count { field: StatField, min: i64 },
    /// `field != 0`; progress is all or nothing.
    Boolean { field: StatField },
}

impl Requirement {
    /// Progress toward this requirement, 0..=100.
    pub fn progress(&self, stats: &UserStats) -> u8 {
        match *self {
            Requirement::Count { field, min } => {
                if min <= 0 {
                    return 100;
                }
                let value = stats.value(field).max(0);
                (value.saturating_mul(100) / min).min(100) as u8
            }
            Requirement::Boolean { field } => {
                if stats.value(field) != 0 { 100 } else { 0 }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeCategory {
    Profile,
    Cv,
    JobSearch,
    Engagement,
    Milestone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeTier {
    Bronze,
    Silver,
    Gold,
    Platinum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeDefinition {
    pub id:           BadgeId,
    pub name:         &'static str,
    pub description:  &'static str,
    pub icon:         &'static str,
    pub category:     BadgeCategory,
    pub tier:         BadgeTier,
    pub xp_reward:    Xp,
    pub requirements: &'static [Requirement],
    pub rarity:       Rarity,
    pub is_hidden:    bool,
}

impl BadgeDefinition {
    /// Mean progress across all requirements; 100 only when every one is met.
    pub fn progress(&self, stats: &UserStats) -> u8 {
        if self.requirements.is_empty() {
            return 100;
        }
        let total: u32 = self
            .requirements
            .iter()
            .map(|r| u32::from(r.progress(stats)))
            .sum();
        (total / self.requirements.len() as u32) as u8
    }
}

/// All badges, in display order. Ids are stable and never reused.
pub static BADGES: &[BadgeDefinition] = &[
    BadgeDefinition {
        id:           "profile_pioneer",
        name:         "Profile Pioneer",
        description:  "Complete 100% of your developer profile",
        icon:         "user-check",
        category:     BadgeCategory::Profile,
        tier:         BadgeTier::Gold,
        xp_reward:    100,
        requirements: &[Requirement::Count { field: StatField::ProfileCompleteness, min: 100 }],
        rarity:       Rarity::Uncommon,
        is_hidden:    false,
    },
    BadgeDefinition {
        id:           "picture_perfect",
        name:         "Picture Perfect",
        description:  "Upload a profile photo",
        icon:         "camera",
        category:     BadgeCategory::Profile,
        tier:         BadgeTier::Bronze,
        xp_reward:    10,
        requirements: &[Requirement::Boolean { field: StatField::HasAvatar }],
        rarity:       Rarity::Common,
        is_hidden:    false,
    },
    BadgeDefinition {
        id:           "open_source",
        name:         "Open Source",
        description:  "Link your GitHub account",
        icon:         "github",
        category:     BadgeCategory::Profile,
        tier:         BadgeTier::Bronze,
        xp_reward:    20,
        requirements: &[Requirement::Boolean { field: StatField::HasGithubLinked }],
        rarity:       Rarity::Common,
        is_hidden:    false,
    },
    BadgeDefinition {
        id:           "first_draft",
        name:         "First Draft",
        description:  "Upload your first CV",
        icon:         "file-up",
        category:     BadgeCategory::Cv,
        tier:         BadgeTier::Bronze,
        xp_reward:    25,
        requirements: &[Requirement::Count { field: StatField::CvsUploaded, min: 1 }],
        rarity:       Rarity::Common,
        is_hidden:    false,
    },
    BadgeDefinition {
        id:           "cv_connoisseur",
        name:         "CV Connoisseur",
        description:  "Run five AI analyses on your CV",
        icon:         "sparkles",
        category:     BadgeCategory::Cv,
        tier:         BadgeTier::Silver,
        xp_reward:    50,
        requirements: &[Requirement::Count { field: StatField::CvAnalyses, min: 5 }],
        rarity:       Rarity::Uncommon,
        is_hidden:    false,
    },
    BadgeDefinition {
        id:           "window_shopper",
        name:         "Window Shopper",
        description:  "Save ten job roles",
        icon:         "bookmark",
        category:     BadgeCategory::JobSearch,
        tier:         BadgeTier::Bronze,
        xp_reward:    20,
        requirements: &[Requirement::Count { field: StatField::JobsSaved, min: 10 }],
        rarity:       Rarity::Common,
        is_hidden:    false,
    },
    BadgeDefinition {
        id:           "go_getter",
        name:         "Go-Getter",
        description:  "Submit your first application",
        icon:         "send",
        category:     BadgeCategory::JobSearch,
        tier:         BadgeTier::Bronze,
        xp_reward:    25,
        requirements: &[Requirement::Count { field: StatField::ApplicationsSubmitted, min: 1 }],
        rarity:       Rarity::Common,
        is_hidden:    false,
    },
    BadgeDefinition {
        id:           "application_ace",
        name:         "Application Ace",
        description:  "Submit 25 applications",
        icon:         "target",
        category:     BadgeCategory::JobSearch,
        tier:         BadgeTier::Gold,
        xp_reward:    150,
        requirements: &[Requirement::Count { field: StatField::ApplicationsSubmitted, min: 25 }],
        rarity:       Rarity::Rare,
        is_hidden:    false,
    },
    BadgeDefinition {
        id:           "on_a_roll",
        name:         "On a Roll",
        description:  "Keep a 7-day activity streak",
        icon:         "flame",
        category:     BadgeCategory::Engagement,
        tier:         BadgeTier::Silver,
        xp_reward:    50,
        requirements: &[Requirement::Count { field: StatField::Streak, min: 7 }],
        rarity:       Rarity::Uncommon,
        is_hidden:    false,
    },
    BadgeDefinition {
        id:           "unstoppable",
        name:         "Unstoppable",
        description:  "Keep a 30-day activity streak",
        icon:         "zap",
        category:     BadgeCategory::Engagement,
        tier:         BadgeTier::Platinum,
        xp_reward:    300,
        requirements: &[Requirement::Count { field: StatField::Streak, min: 30 }],
        rarity:       Rarity::Epic,
        is_hidden:    true,
    },
    BadgeDefinition {
        id:           "rising_star",
        name:         "Rising Star",
        description:  "Reach level 10",
        icon:         "star",
        category:     BadgeCategory::Milestone,
        tier:         BadgeTier::Gold,
        xp_reward:    0,
        requirements: &[Requirement::Count { field: StatField::Level, min: 10 }],
        rarity:       Rarity::Rare,
        is_hidden:    false,
    },
    BadgeDefinition {
        id:           "all_rounder",
        name:         "All-Rounder",
        description:  "Complete your profile, apply to five roles and keep a week-long streak",
        icon:         "trophy",
        category:     BadgeCategory::Milestone,
        tier:         BadgeTier::Platinum,
        xp_reward:    250,
        requirements: &[
            Requirement::Count { field: StatField::ProfileCompleteness, min: 100 },
            Requirement::Count { field: StatField::ApplicationsSubmitted, min: 5 },
            Requirement::Count { field: StatField::Streak, min: 7 },
        ],
        rarity:       Rarity::Legendary,
        is_hidden:    true,
    },
];

pub fn find_badge(id: &str) -> Option<&'static BadgeDefinition> {
    BADGES.iter().find(|b| b.id == id)
}

/// A badge a user has earned.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserBadge {
    pub user_id:   UserId,
    pub badge_id:  String,
    pub earned_at: DateTime<Utc>,
}

/// One row of the badge list returned by the evaluator.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeWithProgress {
    #[serde(flatten)]
    pub badge:          &'static BadgeDefinition,
    pub is_earned:      bool,
    pub progress:       u8,
    pub is_in_progress: bool,
    pub earned_at:      Option<DateTime<Utc>>,
}

impl BadgeWithProgress {
    pub fn earned(badge: &'static BadgeDefinition, earned_at: DateTime<Utc>) -> Self {
        Self {
            badge,
            is_earned: true,
            progress: 100,
            is_in_progress: false,
            earned_at: Some(earned_at),
        }
    }

    pub fn pending(badge: &'static BadgeDefinition, progress: u8) -> Self {
        debug_assert!(progress < 100);
        Self {
            badge,
            is_earned: false,
            progress,
            is_in_progress: progress > 0,
            earned_at: None,
        }
    }
}
