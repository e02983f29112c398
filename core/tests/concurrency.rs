//! Concurrent writers on one database file, each with its own connection.

use chrono::{TimeZone, Utc};
use gamification_core::{
    badges::StatField,
    clock::ManualClock,
    config::GamificationConfig,
    engine::GamificationEngine,
    error::GameError,
    leveling::XpSource,
    points::SpendType,
    profile::AwardXpRequest,
    store::GameStore,
};
use std::{sync::Arc, thread};

const WRITERS: usize = 4;

struct Fixture {
    _dir:  tempfile::TempDir,
    path:  String,
    clock: Arc<ManualClock>,
}

impl Fixture {
    fn new() -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("game.db").to_str().unwrap().to_string();
        GameStore::open(&path).unwrap().migrate().unwrap();
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 5, 10, 8, 0, 0).unwrap()));
        Self { _dir: dir, path, clock }
    }

    /// A separate engine with its own connection to the shared file.
    fn engine(&self) -> GamificationEngine {
        GamificationEngine::new(
            GamificationConfig::default_test(),
            GameStore::open(&self.path).unwrap(),
            self.clock.clone(),
        )
        .unwrap()
    }
}

#[test]
fn concurrent_awards_are_all_counted() {
    let fx = Fixture::new();
    thread::scope(|s| {
        for _ in 0..WRITERS {
            s.spawn(|| {
                let mut engine = fx.engine();
                for _ in 0..25 {
                    engine
                        .award_xp(AwardXpRequest::new("dev-1", 10, XpSource::JobSaved))
                        .unwrap();
                }
            });
        }
    });

    let store = GameStore::open(&fx.path).unwrap();
    let state = store.load_state("dev-1").unwrap().unwrap();
    assert_eq!(state.total_xp, 10 * 25 * WRITERS as i64);
    assert_eq!(store.xp_transaction_count("dev-1").unwrap(), 25 * WRITERS as i64);
    assert_eq!(store.xp_transaction_total("dev-1").unwrap(), state.total_xp);
    assert_eq!(store.user_count().unwrap(), 1);
}

#[test]
fn concurrent_evaluations_earn_a_badge_once() {
    let fx = Fixture::new();
    fx.engine()
        .record_stat("dev-1", StatField::ProfileCompleteness, 100)
        .unwrap();

    thread::scope(|s| {
        for _ in 0..WRITERS {
            s.spawn(|| {
                let badges = fx.engine().evaluate_badges("dev-1").unwrap();
                let pioneer = badges
                    .iter()
                    .find(|b| b.badge.id == "profile_pioneer")
                    .unwrap();
                assert!(pioneer.is_earned);
            });
        }
    });

    let store = GameStore::open(&fx.path).unwrap();
    assert_eq!(store.user_badge_count("dev-1", "profile_pioneer").unwrap(), 1);
    let counts = store.xp_source_counts("dev-1").unwrap();
    assert_eq!(counts.get(&XpSource::BadgeEarned).copied(), Some(1));
    assert_eq!(store.load_state("dev-1").unwrap().unwrap().total_xp, 100);
}

/// Eight spends of 20 against a balance of 100: exactly five succeed and
/// the balance never goes negative.
#[test]
fn concurrent_spends_never_overdraw() {
    let fx = Fixture::new();
    fx.engine().record_activity("dev-1").unwrap();

    let outcomes: Vec<Result<i64, GameError>> = thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                s.spawn(|| {
                    fx.engine()
                        .spend_points("dev-1", 20, SpendType::JobApplication, None)
                        .map(|r| r.available)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let succeeded = outcomes.iter().filter(|r| r.is_ok()).count();
    let insufficient = outcomes
        .iter()
        .filter(|r| matches!(r, Err(GameError::InsufficientPoints { .. })))
        .count();
    assert_eq!(succeeded, 5);
    assert_eq!(insufficient, 3);

    let mut engine = fx.engine();
    assert_eq!(engine.available_points("dev-1").unwrap(), 0);
    assert_eq!(engine.store().points_transaction_count("dev-1").unwrap(), 5);
}
