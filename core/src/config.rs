use crate::{
    error::{GameError, GameResult},
    leveling::XpSource,
    types::{Points, Xp},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LevelCurveConfig {
    /// XP required for level 2.
    pub base: f64,
    /// Growth exponent. 1.0 is linear; above 1.0 each level costs more.
    pub exponent: f64,
    pub max_level: u32,
}

/// Upper bound on `max_level`; the threshold table holds one entry per level.
pub const MAX_LEVEL_LIMIT: u32 = 10_000;

/// Upper bound on the XP threshold of the top level.
pub const MAX_TOP_THRESHOLD: f64 = 1e15;

impl LevelCurveConfig {
    /// `base >= 1` and `exponent >= 1` keep consecutive thresholds at least
    /// one XP apart after rounding, so the table is strictly increasing.
    /// The top threshold must stay well inside the `Xp` range.
    pub fn validate(&self) -> GameResult<()> {
        if !self.base.is_finite() || self.base < 1.0 {
            return Err(GameError::invalid(format!(
                "level_curve.base must be >= 1, got {}",
                self.base
            )));
        }
        if !self.exponent.is_finite() || self.exponent < 1.0 {
            return Err(GameError::invalid(format!(
                "level_curve.exponent must be >= 1, got {}",
                self.exponent
            )));
        }
        if !(2..=MAX_LEVEL_LIMIT).contains(&self.max_level) {
            return Err(GameError::invalid(format!(
                "level_curve.max_level must be in 2..={MAX_LEVEL_LIMIT}, got {}",
                self.max_level
            )));
        }
        let top = self.base * f64::from(self.max_level - 1).powf(self.exponent);
        if !top.is_finite() || top > MAX_TOP_THRESHOLD {
            return Err(GameError::invalid(format!(
                "level_curve reaches {top} XP at level {}, limit is {MAX_TOP_THRESHOLD}",
                self.max_level
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PointsConfig {
    /// Budget granted at the start of every monthly period.
    pub monthly_allocation: Points,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryConfig {
    /// Extra attempts after a concurrency conflict before surfacing it.
    pub max_conflict_retries: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheConfig {
    /// Profile read-model TTL. 0 disables the cache.
    pub profile_ttl_secs: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageConfig {
    /// How long a connection waits on another writer's lock.
    pub busy_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
struct GamificationConfigFile {
    level_curve:               LevelCurveConfig,
    points:                    PointsConfig,
    xp_rewards:                HashMap<XpSource, Xp>,
    retry:                     RetryConfig,
    cache:                     CacheConfig,
    storage:                   StorageConfig,
    recent_transactions_limit: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GamificationConfig {
    pub level_curve:               LevelCurveConfig,
    pub points:                    PointsConfig,
    /// Default XP per source for `award_xp_for`.
    pub xp_rewards:                HashMap<XpSource, Xp>,
    pub retry:                     RetryConfig,
    pub cache:                     CacheConfig,
    pub storage:                   StorageConfig,
    /// How many XP + points records the profile carries.
    pub recent_transactions_limit: usize,
}

impl GamificationConfig {
    /// Load from the data/ directory.
    /// In tests, use GamificationConfig::default_test().
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let path = format!("{data_dir}/gamification/gamification_config.json");
        let content = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let file: GamificationConfigFile = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;

        let config = Self {
            level_curve:               file.level_curve,
            points:                    file.points,
            xp_rewards:                file.xp_rewards,
            retry:                     file.retry,
            cache:                     file.cache,
            storage:                   file.storage,
            recent_transactions_limit: file.recent_transactions_limit,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> GameResult<()> {
        self.level_curve.validate()?;
        if self.points.monthly_allocation < 0 {
            return Err(GameError::invalid(format!(
                "points.monthly_allocation must be >= 0, got {}",
                self.points.monthly_allocation
            )));
        }
        if let Some((source, xp)) = self.xp_rewards.iter().find(|(_, xp)| **xp <= 0) {
            return Err(GameError::invalid(format!(
                "xp_rewards.{source} must be positive, got {xp}"
            )));
        }
        if self.cache.profile_ttl_secs < 0
            || chrono::Duration::try_seconds(self.cache.profile_ttl_secs).is_none()
        {
            return Err(GameError::invalid(format!(
                "cache.profile_ttl_secs must be a non-negative duration, got {}",
                self.cache.profile_ttl_secs
            )));
        }
        Ok(())
    }

    /// Configured reward for `source`, if one exists.
    pub fn xp_reward(&self, source: XpSource) -> Option<Xp> {
        self.xp_rewards.get(&source).copied()
    }

    /// Config with hardcoded defaults for use in unit tests.
    pub fn default_test() -> Self {
        let xp_rewards = [
            (XpSource::CvUploaded, 100),
            (XpSource::CvAnalyzed, 50),
            (XpSource::ProfileUpdated, 10),
            (XpSource::ProfileCompleted, 150),
            (XpSource::JobSaved, 5),
            (XpSource::ApplicationSubmitted, 25),
            (XpSource::DailyLogin, 5),
            (XpSource::StreakBonus, 20),
            (XpSource::Referral, 200),
        ]
        .into();

        Self {
            level_curve: LevelCurveConfig {
                base:      100.0,
                exponent:  1.5,
                max_level: 50,
            },
            points: PointsConfig { monthly_allocation: 100 },
            xp_rewards,
            retry: RetryConfig { max_conflict_retries: 3 },
            cache: CacheConfig { profile_ttl_secs: 30 },
            storage: StorageConfig { busy_timeout_ms: 5_000 },
            recent_transactions_limit: 10,
        }
    }
}
