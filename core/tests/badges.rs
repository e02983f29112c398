//! Badge evaluation: progress, earning, and exactly-once rewards.

use chrono::{TimeZone, Utc};
use gamification_core::{
    badges::{BadgeWithProgress, StatField, BADGES},
    clock::ManualClock,
    engine::GamificationEngine,
    error::GameError,
    leveling::XpSource,
    profile::AwardXpRequest,
};
use std::sync::Arc;

fn setup() -> (GamificationEngine, Arc<ManualClock>) {
    let _ = env_logger::builder().is_test(true).try_init();
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 5, 10, 8, 0, 0).unwrap()));
    let engine = GamificationEngine::build_test(clock.clone()).unwrap();
    (engine, clock)
}

fn find<'a>(badges: &'a [BadgeWithProgress], id: &str) -> &'a BadgeWithProgress {
    badges
        .iter()
        .find(|b| b.badge.id == id)
        .unwrap_or_else(|| panic!("badge {id} missing from evaluation"))
}

/// A complete profile earns Profile Pioneer once; evaluating again reports
/// it as earned without a second row or a second XP reward.
#[test]
fn complete_profile_earns_badge_exactly_once() {
    let (mut engine, _) = setup();
    engine.record_stat("dev-1", StatField::ProfileCompleteness, 100).unwrap();

    let first = engine.evaluate_badges("dev-1").unwrap();
    let pioneer = find(&first, "profile_pioneer");
    assert!(pioneer.is_earned);
    assert_eq!(pioneer.progress, 100);
    assert!(pioneer.earned_at.is_some());
    assert_eq!(engine.store().user_badge_count("dev-1", "profile_pioneer").unwrap(), 1);

    let reward = pioneer.badge.xp_reward;
    let state = engine.store().load_state("dev-1").unwrap().unwrap();
    assert_eq!(state.total_xp, reward);

    let second = engine.evaluate_badges("dev-1").unwrap();
    let again = find(&second, "profile_pioneer");
    assert!(again.is_earned);
    assert_eq!(again.earned_at, pioneer.earned_at);
    assert_eq!(engine.store().user_badge_count("dev-1", "profile_pioneer").unwrap(), 1);

    let counts = engine.store().xp_source_counts("dev-1").unwrap();
    assert_eq!(counts.get(&XpSource::BadgeEarned).copied(), Some(1));
    let state = engine.store().load_state("dev-1").unwrap().unwrap();
    assert_eq!(state.total_xp, reward);

    let earned_events = engine
        .store()
        .events_for_user("dev-1")
        .unwrap()
        .into_iter()
        .filter(|e| e.event_type == "badge_earned")
        .count();
    assert_eq!(earned_events, 1);
}

#[test]
fn every_definition_is_reported_with_progress() {
    let (mut engine, _) = setup();
    engine.record_stat("dev-1", StatField::ProfileCompleteness, 50).unwrap();

    let badges = engine.evaluate_badges("dev-1").unwrap();
    assert_eq!(badges.len(), BADGES.len());

    let pioneer = find(&badges, "profile_pioneer");
    assert!(!pioneer.is_earned);
    assert_eq!(pioneer.progress, 50);
    assert!(pioneer.is_in_progress);
    assert!(pioneer.earned_at.is_none());

    let avatar = find(&badges, "picture_perfect");
    assert_eq!(avatar.progress, 0);
    assert!(!avatar.is_in_progress);
}

/// Multi-requirement badges report the mean of their requirements.
#[test]
fn multi_requirement_badge_averages_progress() {
    let (mut engine, _) = setup();
    engine.record_stat("dev-1", StatField::ProfileCompleteness, 100).unwrap();
    engine.record_activity("dev-1").unwrap();

    let badges = engine.evaluate_badges("dev-1").unwrap();
    let all_rounder = find(&badges, "all_rounder");
    // Profile 100%, 0 of 5 applications, streak 1 of 7 (14%).
    assert_eq!(all_rounder.progress, (100 + 0 + 14) / 3);
    assert!(!all_rounder.is_earned);
}

#[test]
fn cv_upload_earns_first_draft_with_reward() {
    let (mut engine, _) = setup();
    engine.award_xp_for("dev-1", XpSource::CvUploaded, Some("cv-1")).unwrap();

    let badges = engine.evaluate_badges("dev-1").unwrap();
    let first_draft = find(&badges, "first_draft");
    assert!(first_draft.is_earned);

    let state = engine.store().load_state("dev-1").unwrap().unwrap();
    assert_eq!(state.total_xp, 100 + first_draft.badge.xp_reward);
    assert_eq!(
        engine.store().xp_transaction_total("dev-1").unwrap(),
        state.total_xp
    );
}

#[test]
fn seven_day_streak_earns_on_a_roll() {
    let (mut engine, clock) = setup();
    for _ in 0..6 {
        engine.record_activity("dev-1").unwrap();
        clock.advance_days(1);
    }
    let streak = engine.record_activity("dev-1").unwrap();
    assert_eq!(streak, 7);

    let badges = engine.evaluate_badges("dev-1").unwrap();
    assert!(find(&badges, "on_a_roll").is_earned);
    assert!(!find(&badges, "unstoppable").is_earned);
}

#[test]
fn derived_and_out_of_range_stats_are_rejected() {
    let (mut engine, _) = setup();
    let err = engine.record_stat("dev-1", StatField::CvsUploaded, 3).unwrap_err();
    assert!(matches!(err, GameError::InvalidArgument(_)), "got {err:?}");

    let err = engine.record_stat("dev-1", StatField::ProfileCompleteness, 101).unwrap_err();
    assert!(matches!(err, GameError::InvalidArgument(_)), "got {err:?}");

    let err = engine.record_stat("dev-1", StatField::HasAvatar, 2).unwrap_err();
    assert!(matches!(err, GameError::InvalidArgument(_)), "got {err:?}");

    assert!(engine.store().load_state("dev-1").unwrap().is_none());
}

#[test]
fn evaluating_unknown_user_is_not_found() {
    let (mut engine, _) = setup();
    let err = engine.evaluate_badges("nobody").unwrap_err();
    assert!(matches!(err, GameError::NotFound(_)), "got {err:?}");
}

/// Profile Pioneer's reward lifts a level-9 user to level 10, so Rising
/// Star is earned by the same profile read.
#[test]
fn badge_reward_that_reaches_level_ten_earns_rising_star() {
    let (mut engine, _) = setup();
    engine
        .award_xp(AwardXpRequest::new("dev-1", 2650, XpSource::Referral))
        .unwrap();
    engine.record_stat("dev-1", StatField::ProfileCompleteness, 100).unwrap();

    let profile = engine.get_user_profile("dev-1").unwrap();
    assert_eq!(profile.total_xp, 2750);
    assert_eq!(profile.current_level, 10);
    assert!(find(&profile.badges, "profile_pioneer").is_earned);
    assert!(find(&profile.badges, "rising_star").is_earned);

    let again = engine.evaluate_badges("dev-1").unwrap();
    assert!(find(&again, "rising_star").is_earned);
    assert_eq!(engine.store().user_badge_count("dev-1", "rising_star").unwrap(), 1);
    assert_eq!(engine.store().xp_transaction_total("dev-1").unwrap(), 2750);
}
