//! The gamification engine: the façade route handlers call.
//!
//! RULES:
//!   - Every mutation runs inside one `StoreTx`: state row, audit record
//!     and event log entries commit together or not at all.
//!   - State rows are written with a version compare-and-set. Conflicts
//!     (stale version, busy database) are retried a bounded number of times.
//!   - Validation happens before any transaction is opened.
//!   - Badges are never evaluated on the XP write path; they are checked
//!     when a profile is read.
//!   - Monthly point resets are applied lazily by whichever read or write
//!     first sees that the reset date has passed.

use crate::{
    badges::{BadgeDefinition, BadgeWithProgress, StatField, BADGES},
    cache::TtlCache,
    clock::{Clock, ManualClock, SystemClock},
    config::GamificationConfig,
    error::{GameError, GameResult},
    event::GamificationEvent,
    leveling::{apply_xp, LevelCurve, LevelInfo, XpOutcome, XpSource, XpTransaction},
    points::{PointsBalance, PointsSource, PointsTransaction, SpendType},
    profile::{
        merge_recent, require_user_id, AwardXpRequest, AwardXpResponse, GamificationProfile,
        LeaderboardEntry, PointsReceipt, XpAward,
    },
    state::UserGamificationState,
    store::{GameStore, StoreTx},
    types::{Points, UserId, Xp},
};
use chrono::{DateTime, Duration, Utc};
use std::{collections::HashMap, sync::Arc};

pub struct GamificationEngine {
    config:        GamificationConfig,
    curve:         LevelCurve,
    clock:         Arc<dyn Clock>,
    store:         GameStore,
    profile_cache: TtlCache<UserId, GamificationProfile>,
}

impl GamificationEngine {
    pub fn new(
        config: GamificationConfig,
        store: GameStore,
        clock: Arc<dyn Clock>,
    ) -> GameResult<Self> {
        config.validate()?;
        let curve = LevelCurve::from_config(&config.level_curve)?;
        store.set_busy_timeout(std::time::Duration::from_millis(
            config.storage.busy_timeout_ms,
        ))?;
        let ttl = Duration::try_seconds(config.cache.profile_ttl_secs).ok_or_else(|| {
            GameError::invalid(format!(
                "profile cache TTL out of range: {}s",
                config.cache.profile_ttl_secs
            ))
        })?;
        let profile_cache = TtlCache::new(ttl);
        log::debug!(
            "engine ready: max_level={} monthly_points={}",
            curve.max_level(),
            config.points.monthly_allocation
        );
        Ok(Self {
            config,
            curve,
            clock,
            store,
            profile_cache,
        })
    }

    /// Build a fully wired engine from the data/ directory and a database path.
    pub fn build(data_dir: &str, db_path: &str) -> anyhow::Result<Self> {
        let config = GamificationConfig::load(data_dir)?;
        let store = GameStore::open(db_path)?;
        store.migrate()?;
        Ok(Self::new(config, store, Arc::new(SystemClock))?)
    }

    /// In-memory engine with test defaults, driven by a manual clock.
    pub fn build_test(clock: Arc<ManualClock>) -> GameResult<Self> {
        Self::build_test_with_config(GamificationConfig::default_test(), clock)
    }

    pub fn build_test_with_config(
        config: GamificationConfig,
        clock: Arc<ManualClock>,
    ) -> GameResult<Self> {
        let store = GameStore::in_memory()?;
        store.migrate()?;
        Self::new(config, store, clock)
    }

    pub fn store(&self) -> &GameStore {
        &self.store
    }

    pub fn config(&self) -> &GamificationConfig {
        &self.config
    }

    pub fn curve(&self) -> &LevelCurve {
        &self.curve
    }

    pub fn compute_level(&self, total_xp: Xp) -> GameResult<LevelInfo> {
        self.curve.compute_level(total_xp)
    }

    // ── XP ─────────────────────────────────────────────────────

    /// Award XP and persist the new total with its transaction record.
    /// Initialises the user's state on first award.
    pub fn award_xp(&mut self, req: AwardXpRequest) -> GameResult<XpAward> {
        req.validate()?;
        let now = self.clock.now();
        let curve = &self.curve;
        let monthly = self.config.points.monthly_allocation;
        let max_retries = self.config.retry.max_conflict_retries;

        let (txn, outcome) = retry_on_conflict(&mut self.store, &req.user_id, max_retries, |store| {
            let tx = store.begin_write()?;
            let mut state = load_or_init(&tx, &req.user_id, monthly, now)?;
            let mut events = Vec::new();
            let awarded = award_in_tx(
                &tx,
                curve,
                &mut state,
                XpGrant {
                    amount:      req.amount,
                    source:      req.source,
                    source_id:   req.source_id.clone(),
                    description: req.description.clone(),
                },
                now,
                &mut events,
            )?;
            state.updated_at = now;
            tx.update_state(&mut state)?;
            tx.append_events(&events, now)?;
            tx.commit()?;
            Ok(awarded)
        })?;

        self.profile_cache.invalidate(&req.user_id);

        log::debug!(
            "user={} +{} XP ({}) total={}",
            req.user_id,
            txn.amount,
            txn.source,
            outcome.new_total
        );
        if let Some(level) = outcome.level_up() {
            log::info!(
                "user={} level up {} -> {level} at {} XP",
                req.user_id,
                outcome.previous_level,
                outcome.new_total
            );
        }

        Ok(XpAward {
            user_id:        req.user_id,
            xp_awarded:     txn.amount,
            total_xp:       outcome.new_total,
            level:          outcome.level.level,
            new_level:      outcome.level_up(),
            transaction_id: txn.id,
        })
    }

    /// `award_xp` with the result folded into the wire response shape.
    pub fn award_xp_response(&mut self, req: AwardXpRequest) -> AwardXpResponse {
        let result = self.award_xp(req);
        if let Err(e) = &result {
            log::debug!("XP award rejected: {e}");
        }
        result.into()
    }

    /// Award the configured default amount for `source`.
    pub fn award_xp_for(
        &mut self,
        user_id: &str,
        source: XpSource,
        source_id: Option<&str>,
    ) -> GameResult<XpAward> {
        let amount = self.config.xp_reward(source).ok_or_else(|| {
            GameError::invalid(format!("no default XP reward configured for {source}"))
        })?;
        let mut req = AwardXpRequest::new(user_id, amount, source);
        req.source_id = source_id.map(str::to_string);
        self.award_xp(req)
    }

    // ── Points ─────────────────────────────────────────────────

    /// Current balance, after applying a due monthly reset.
    pub fn points_balance(&mut self, user_id: &str) -> GameResult<PointsBalance> {
        require_user_id(user_id)?;
        let now = self.clock.now();
        let state = self
            .store
            .load_state(user_id)?
            .ok_or_else(|| missing_state(user_id))?;
        if now < state.points.points_reset_date {
            return Ok(state.points);
        }

        let max_retries = self.config.retry.max_conflict_retries;
        let balance = retry_on_conflict(&mut self.store, user_id, max_retries, |store| {
            let tx = store.begin_write()?;
            let mut state = load_existing(&tx, user_id)?;
            if apply_due_reset(&tx, &mut state, now)? {
                state.updated_at = now;
                tx.update_state(&mut state)?;
                tx.commit()?;
            }
            Ok(state.points)
        })?;
        self.profile_cache.invalidate(&user_id.to_string());
        Ok(balance)
    }

    pub fn available_points(&mut self, user_id: &str) -> GameResult<Points> {
        self.points_balance(user_id)?.available()
    }

    /// Spend points. Fails with `InsufficientPoints` and changes nothing
    /// when `amount` exceeds the available balance.
    pub fn spend_points(
        &mut self,
        user_id: &str,
        amount: Points,
        spend_type: SpendType,
        description: Option<&str>,
    ) -> GameResult<PointsReceipt> {
        require_user_id(user_id)?;
        if amount <= 0 {
            return Err(GameError::invalid(format!(
                "spend amount must be positive, got {amount}"
            )));
        }
        let now = self.clock.now();
        let max_retries = self.config.retry.max_conflict_retries;

        let receipt = retry_on_conflict(&mut self.store, user_id, max_retries, |store| {
            let tx = store.begin_write()?;
            let mut state = load_existing(&tx, user_id)?;
            apply_due_reset(&tx, &mut state, now)?;
            state.points.spend(amount)?;
            let available = state.points.available()?;

            let txn = PointsTransaction {
                id:          new_id(),
                user_id:     user_id.to_string(),
                amount:      -amount,
                source:      PointsSource::Spend,
                spend_type:  Some(spend_type),
                description: description.map(str::to_string),
                metadata:    serde_json::json!({ "availableAfter": available }),
                created_at:  now,
            };
            tx.insert_points_transaction(&txn)?;
            state.updated_at = now;
            tx.update_state(&mut state)?;
            tx.append_event(
                &GamificationEvent::PointsSpent {
                    user_id: user_id.to_string(),
                    amount,
                    spend_type,
                    available,
                },
                now,
            )?;
            tx.commit()?;

            Ok(PointsReceipt {
                user_id:        user_id.to_string(),
                delta:          -amount,
                available,
                transaction_id: Some(txn.id),
            })
        })?;

        self.profile_cache.invalidate(&user_id.to_string());
        log::debug!(
            "user={user_id} spent {amount} points on {spend_type}, {} left",
            receipt.available
        );
        Ok(receipt)
    }

    /// Add earned points from a non-admin source (bonus, referral).
    pub fn credit_points(
        &mut self,
        user_id: &str,
        amount: Points,
        source: PointsSource,
        description: Option<&str>,
    ) -> GameResult<PointsReceipt> {
        match source {
            PointsSource::Spend | PointsSource::MonthlyReset | PointsSource::AdminSetExact => {
                return Err(GameError::invalid(format!(
                    "{source} cannot be used to credit points"
                )));
            }
            PointsSource::AdminGranted | PointsSource::Bonus | PointsSource::Referral => {}
        }
        self.credit(user_id, amount, source, description, serde_json::json!({}))
    }

    /// Admin "award": add `amount` to the user's earned points.
    pub fn award_points(
        &mut self,
        user_id: &str,
        amount: Points,
        admin_id: Option<&str>,
        reason: Option<&str>,
    ) -> GameResult<PointsReceipt> {
        let receipt = self.credit(
            user_id,
            amount,
            PointsSource::AdminGranted,
            reason,
            serde_json::json!({ "adminId": admin_id }),
        )?;
        log::info!(
            "user={user_id} admin {} awarded {amount} points, available={}",
            admin_id.unwrap_or("-"),
            receipt.available
        );
        Ok(receipt)
    }

    /// Admin "set exact": make the available balance equal `target` by
    /// folding `target - available` into earned points.
    ///
    /// With `expected_available`, the call fails with `ConcurrencyConflict`
    /// if the balance moved since the caller read it. Such calls are not
    /// retried.
    pub fn set_exact_points(
        &mut self,
        user_id: &str,
        target: Points,
        admin_id: Option<&str>,
        expected_available: Option<Points>,
    ) -> GameResult<PointsReceipt> {
        require_user_id(user_id)?;
        if target < 0 {
            return Err(GameError::invalid(format!(
                "target points must be non-negative, got {target}"
            )));
        }
        let now = self.clock.now();
        let monthly = self.config.points.monthly_allocation;
        let max_retries = if expected_available.is_some() {
            0
        } else {
            self.config.retry.max_conflict_retries
        };

        let receipt = retry_on_conflict(&mut self.store, user_id, max_retries, |store| {
            let tx = store.begin_write()?;
            let mut state = load_or_init(&tx, user_id, monthly, now)?;
            let reset = apply_due_reset(&tx, &mut state, now)?;

            let before = state.points.available()?;
            if let Some(expected) = expected_available {
                if expected != before {
                    return Err(GameError::conflict(
                        user_id,
                        format!("expected {expected} available points, found {before}"),
                    ));
                }
            }

            let delta = state.points.set_exact(target)?;
            if delta == 0 {
                if reset {
                    state.updated_at = now;
                    tx.update_state(&mut state)?;
                }
                // Still commit: the state row may have just been created.
                tx.commit()?;
                return Ok(PointsReceipt {
                    user_id:        user_id.to_string(),
                    delta:          0,
                    available:      target,
                    transaction_id: None,
                });
            }

            let txn = PointsTransaction {
                id:          new_id(),
                user_id:     user_id.to_string(),
                amount:      delta,
                source:      PointsSource::AdminSetExact,
                spend_type:  None,
                description: Some(format!("Set available points to {target}")),
                metadata:    serde_json::json!({
                    "adminId": admin_id,
                    "previousAvailable": before,
                    "target": target,
                }),
                created_at:  now,
            };
            tx.insert_points_transaction(&txn)?;
            state.updated_at = now;
            tx.update_state(&mut state)?;
            tx.append_event(
                &GamificationEvent::PointsSetExact {
                    user_id:  user_id.to_string(),
                    target,
                    delta,
                    admin_id: admin_id.map(str::to_string),
                },
                now,
            )?;
            tx.commit()?;

            Ok(PointsReceipt {
                user_id:        user_id.to_string(),
                delta,
                available:      target,
                transaction_id: Some(txn.id),
            })
        })?;

        self.profile_cache.invalidate(&user_id.to_string());
        log::info!(
            "user={user_id} admin {} set points to {target} (delta {:+})",
            admin_id.unwrap_or("-"),
            receipt.delta
        );
        Ok(receipt)
    }

    fn credit(
        &mut self,
        user_id: &str,
        amount: Points,
        source: PointsSource,
        description: Option<&str>,
        metadata: serde_json::Value,
    ) -> GameResult<PointsReceipt> {
        require_user_id(user_id)?;
        if amount <= 0 {
            return Err(GameError::invalid(format!(
                "credit amount must be positive, got {amount}"
            )));
        }
        let now = self.clock.now();
        let monthly = self.config.points.monthly_allocation;
        let max_retries = self.config.retry.max_conflict_retries;

        let receipt = retry_on_conflict(&mut self.store, user_id, max_retries, |store| {
            let tx = store.begin_write()?;
            let mut state = load_or_init(&tx, user_id, monthly, now)?;
            apply_due_reset(&tx, &mut state, now)?;
            state.points.credit(amount)?;
            let available = state.points.available()?;

            let txn = PointsTransaction {
                id:          new_id(),
                user_id:     user_id.to_string(),
                amount,
                source,
                spend_type:  None,
                description: description.map(str::to_string),
                metadata:    metadata.clone(),
                created_at:  now,
            };
            tx.insert_points_transaction(&txn)?;
            state.updated_at = now;
            tx.update_state(&mut state)?;
            tx.append_event(
                &GamificationEvent::PointsCredited {
                    user_id: user_id.to_string(),
                    amount,
                    source,
                    available,
                },
                now,
            )?;
            tx.commit()?;

            Ok(PointsReceipt {
                user_id:        user_id.to_string(),
                delta:          amount,
                available,
                transaction_id: Some(txn.id),
            })
        })?;

        self.profile_cache.invalidate(&user_id.to_string());
        Ok(receipt)
    }

    // ── Badges ─────────────────────────────────────────────────

    /// One entry per badge definition. Badges whose requirements are now
    /// met are earned on the spot; repeated calls are side-effect free.
    ///
    /// A badge's XP reward can complete a level badge, so evaluation is
    /// repeated against fresh stats until a pass grants no XP.
    pub fn evaluate_badges(&mut self, user_id: &str) -> GameResult<Vec<BadgeWithProgress>> {
        require_user_id(user_id)?;
        let now = self.clock.now();
        let curve = &self.curve;
        let max_retries = self.config.retry.max_conflict_retries;
        let mut newly_earned = 0;

        let badges = loop {
            let state = self
                .store
                .load_state(user_id)?
                .ok_or_else(|| missing_state(user_id))?;
            let stats = self.store.user_stats(&state)?;
            let earned: HashMap<String, DateTime<Utc>> = self
                .store
                .user_badges(user_id)?
                .into_iter()
                .map(|b| (b.badge_id, b.earned_at))
                .collect();

            let mut rewarded = false;
            let mut out = Vec::with_capacity(BADGES.len());
            for badge in BADGES {
                if let Some(at) = earned.get(badge.id) {
                    out.push(BadgeWithProgress::earned(badge, *at));
                    continue;
                }
                let progress = badge.progress(&stats);
                if progress < 100 {
                    out.push(BadgeWithProgress::pending(badge, progress));
                    continue;
                }

                let (earned_at, inserted) =
                    retry_on_conflict(&mut self.store, user_id, max_retries, |store| {
                        earn_badge(store, curve, user_id, badge, now)
                    })?;
                if inserted {
                    newly_earned += 1;
                    rewarded |= badge.xp_reward > 0;
                    log::info!("user={user_id} earned badge '{}'", badge.id);
                }
                out.push(BadgeWithProgress::earned(badge, earned_at));
            }

            if !rewarded {
                break out;
            }
            log::debug!("user={user_id} badge rewards granted XP, re-evaluating");
        };

        if newly_earned > 0 {
            self.profile_cache.invalidate(&user_id.to_string());
        }
        Ok(badges)
    }

    // ── Profile ────────────────────────────────────────────────

    /// Aggregate XP, points, badges and recent history.
    /// Fails with `NotFound` for users the engine has never seen.
    pub fn get_user_profile(&mut self, user_id: &str) -> GameResult<GamificationProfile> {
        require_user_id(user_id)?;
        let key = user_id.to_string();
        let now = self.clock.now();
        if let Some(profile) = self.profile_cache.get(&key, now) {
            return Ok(profile);
        }

        self.points_balance(user_id)?;
        let badges = self.evaluate_badges(user_id)?;
        let state = self
            .store
            .load_state(user_id)?
            .ok_or_else(|| missing_state(user_id))?;
        let level = self.curve.compute_level(state.total_xp)?;

        let limit = self.config.recent_transactions_limit;
        let recent = merge_recent(
            self.store.recent_xp_transactions(user_id, limit)?,
            self.store.recent_points_transactions(user_id, limit)?,
            limit,
        );

        let profile = GamificationProfile::assemble(&state, &level, badges, recent)?;
        // A cached profile must not outlive the points reset it shows.
        self.profile_cache
            .insert_until(key, profile.clone(), now, profile.points_reset_date);
        Ok(profile)
    }

    // ── Activity & stats ───────────────────────────────────────

    /// Register activity for today and return the current streak.
    pub fn record_activity(&mut self, user_id: &str) -> GameResult<u32> {
        require_user_id(user_id)?;
        let now = self.clock.now();
        let today = now.date_naive();
        let monthly = self.config.points.monthly_allocation;
        let max_retries = self.config.retry.max_conflict_retries;

        let streak = retry_on_conflict(&mut self.store, user_id, max_retries, |store| {
            let tx = store.begin_write()?;
            let mut state = load_or_init(&tx, user_id, monthly, now)?;
            if state.record_activity(today) {
                state.updated_at = now;
                tx.update_state(&mut state)?;
                tx.append_event(
                    &GamificationEvent::StreakUpdated {
                        user_id: user_id.to_string(),
                        streak:  state.streak,
                    },
                    now,
                )?;
            }
            tx.commit()?;
            Ok(state.streak)
        })?;

        self.profile_cache.invalidate(&user_id.to_string());
        log::debug!("user={user_id} activity on {today}, streak={streak}");
        Ok(streak)
    }

    /// Store a stat reported by the profile layer.
    pub fn record_stat(&mut self, user_id: &str, field: StatField, value: i64) -> GameResult<()> {
        require_user_id(user_id)?;
        field.validate_reported(value)?;
        let now = self.clock.now();
        let monthly = self.config.points.monthly_allocation;
        let max_retries = self.config.retry.max_conflict_retries;

        retry_on_conflict(&mut self.store, user_id, max_retries, |store| {
            let tx = store.begin_write()?;
            load_or_init(&tx, user_id, monthly, now)?;
            tx.upsert_stat(user_id, field, value, now)?;
            tx.commit()
        })?;

        self.profile_cache.invalidate(&user_id.to_string());
        log::debug!("user={user_id} stat {field}={value}");
        Ok(())
    }

    pub fn leaderboard(&self, limit: usize) -> GameResult<Vec<LeaderboardEntry>> {
        let rows = self.store.top_users_by_xp(limit)?;
        Ok(rows
            .into_iter()
            .enumerate()
            .map(|(i, row)| LeaderboardEntry { rank: i + 1, row })
            .collect())
    }
}

// ── Unit-of-work helpers ───────────────────────────────────────

struct XpGrant {
    amount:      Xp,
    source:      XpSource,
    source_id:   Option<String>,
    description: Option<String>,
}

/// Run `op` again when it fails with a concurrency conflict, up to
/// `max_retries` extra attempts. Every attempt opens its own transaction.
fn retry_on_conflict<T>(
    store: &mut GameStore,
    user_id: &str,
    max_retries: u32,
    mut op: impl FnMut(&mut GameStore) -> GameResult<T>,
) -> GameResult<T> {
    let mut attempt = 0;
    loop {
        match op(store) {
            Err(GameError::ConcurrencyConflict { detail, .. }) if attempt < max_retries => {
                attempt += 1;
                log::warn!("user={user_id} write conflict, retry {attempt}/{max_retries}: {detail}");
                std::thread::sleep(std::time::Duration::from_millis(5 * u64::from(attempt)));
            }
            Err(GameError::ConcurrencyConflict { detail, .. }) => {
                return Err(GameError::conflict(user_id, detail));
            }
            other => return other,
        }
    }
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn missing_state(user_id: &str) -> GameError {
    GameError::NotFound(format!("no gamification state for user '{user_id}'"))
}

fn load_existing(tx: &StoreTx<'_>, user_id: &str) -> GameResult<UserGamificationState> {
    tx.load_state(user_id)?.ok_or_else(|| missing_state(user_id))
}

fn load_or_init(
    tx: &StoreTx<'_>,
    user_id: &str,
    monthly_points: Points,
    now: DateTime<Utc>,
) -> GameResult<UserGamificationState> {
    if let Some(state) = tx.load_state(user_id)? {
        return Ok(state);
    }
    let state = UserGamificationState::new(user_id, monthly_points, now)?;
    tx.insert_state(&state)?;
    log::debug!("user={user_id} gamification state initialised");
    Ok(state)
}

/// Apply a due monthly reset to `state` and record it. The caller still
/// has to write `state` back. Returns true when a reset happened.
fn apply_due_reset(
    tx: &StoreTx<'_>,
    state: &mut UserGamificationState,
    now: DateTime<Utc>,
) -> GameResult<bool> {
    let Some(reset) = state.points.reset_if_due(now)? else {
        return Ok(false);
    };
    tx.insert_points_transaction(&PointsTransaction {
        id:          new_id(),
        user_id:     state.user_id.clone(),
        amount:      reset.restored,
        source:      PointsSource::MonthlyReset,
        spend_type:  None,
        description: Some("Monthly points reset".to_string()),
        metadata:    serde_json::json!({
            "previousResetDate": reset.previous_reset_date,
            "nextResetDate": reset.next_reset_date,
        }),
        created_at:  now,
    })?;
    tx.append_event(
        &GamificationEvent::PointsMonthlyReset {
            user_id:         state.user_id.clone(),
            restored:        reset.restored,
            next_reset_date: reset.next_reset_date,
        },
        now,
    )?;
    log::debug!(
        "user={} monthly reset, restored {} points, next reset {}",
        state.user_id,
        reset.restored,
        reset.next_reset_date
    );
    Ok(true)
}

/// Add XP to `state` and write the XP transaction. Events are collected
/// into `events`; the caller writes `state` and the events.
fn award_in_tx(
    tx: &StoreTx<'_>,
    curve: &LevelCurve,
    state: &mut UserGamificationState,
    grant: XpGrant,
    now: DateTime<Utc>,
    events: &mut Vec<GamificationEvent>,
) -> GameResult<(XpTransaction, XpOutcome)> {
    let outcome = apply_xp(curve, state.total_xp, grant.amount)?;
    state.apply_xp(&outcome);

    let txn = XpTransaction {
        id:          new_id(),
        user_id:     state.user_id.clone(),
        amount:      grant.amount,
        source:      grant.source,
        source_id:   grant.source_id,
        description: grant.description,
        earned_at:   now,
    };
    tx.insert_xp_transaction(&txn)?;

    events.push(GamificationEvent::XpAwarded {
        user_id:  state.user_id.clone(),
        amount:   grant.amount,
        source:   grant.source,
        total_xp: outcome.new_total,
    });
    if let Some(to) = outcome.level_up() {
        events.push(GamificationEvent::LevelUp {
            user_id: state.user_id.clone(),
            from:    outcome.previous_level,
            to,
        });
    }
    Ok((txn, outcome))
}

/// Insert the badge row and grant its XP reward in one transaction.
/// Returns the stored `earned_at` and whether this call created the row.
fn earn_badge(
    store: &mut GameStore,
    curve: &LevelCurve,
    user_id: &str,
    badge: &'static BadgeDefinition,
    now: DateTime<Utc>,
) -> GameResult<(DateTime<Utc>, bool)> {
    let tx = store.begin_write()?;
    if !tx.insert_user_badge(user_id, badge.id, now)? {
        // Someone else earned it first; nothing to write.
        let earned_at = tx.badge_earned_at(user_id, badge.id)?.unwrap_or(now);
        return Ok((earned_at, false));
    }

    let mut events = vec![GamificationEvent::BadgeEarned {
        user_id:   user_id.to_string(),
        badge_id:  badge.id.to_string(),
        xp_reward: badge.xp_reward,
    }];
    if badge.xp_reward > 0 {
        let mut state = load_existing(&tx, user_id)?;
        award_in_tx(
            &tx,
            curve,
            &mut state,
            XpGrant {
                amount:      badge.xp_reward,
                source:      XpSource::BadgeEarned,
                source_id:   Some(badge.id.to_string()),
                description: Some(format!("Badge earned: {}", badge.name)),
            },
            now,
            &mut events,
        )?;
        state.updated_at = now;
        tx.update_state(&mut state)?;
    }
    tx.append_events(&events, now)?;
    tx.commit()?;
    Ok((now, true))
}
