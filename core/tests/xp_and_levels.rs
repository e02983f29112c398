//! XP awards and level computation through the engine.

use chrono::{TimeZone, Utc};
use gamification_core::{
    clock::ManualClock,
    engine::GamificationEngine,
    error::GameError,
    leveling::XpSource,
    profile::AwardXpRequest,
};
use std::sync::Arc;

fn engine() -> GamificationEngine {
    let _ = env_logger::builder().is_test(true).try_init();
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 5, 10, 8, 0, 0).unwrap()));
    GamificationEngine::build_test(clock).unwrap()
}

/// A fresh user awarded 100 XP for a CV upload ends at 100 XP with exactly
/// one transaction and the level the curve assigns to 100 XP.
#[test]
fn first_award_initialises_state_and_records_one_transaction() {
    let mut engine = engine();
    let award = engine
        .award_xp(AwardXpRequest::new("dev-1", 100, XpSource::CvUploaded))
        .unwrap();

    assert_eq!(award.xp_awarded, 100);
    assert_eq!(award.total_xp, 100);
    let expected = engine.compute_level(100).unwrap();
    assert_eq!(award.level, expected.level);

    let state = engine.store().load_state("dev-1").unwrap().expect("state created");
    assert_eq!(state.total_xp, 100);
    assert_eq!(state.current_level, expected.level);
    assert_eq!(state.level_progress, expected.progress);

    let txns = engine.store().recent_xp_transactions("dev-1", 10).unwrap();
    assert_eq!(txns.len(), 1);
    assert_eq!(txns[0].amount, 100);
    assert_eq!(txns[0].source, XpSource::CvUploaded);
    assert_eq!(txns[0].id, award.transaction_id);
}

#[test]
fn crossing_a_threshold_reports_new_level() {
    let mut engine = engine();
    let first = engine
        .award_xp(AwardXpRequest::new("dev-1", 50, XpSource::ProfileUpdated))
        .unwrap();
    assert_eq!(first.level, 1);
    assert_eq!(first.new_level, None);

    // 50 + 60 = 110 clears the level-2 threshold of 100.
    let second = engine
        .award_xp(AwardXpRequest::new("dev-1", 60, XpSource::ProfileUpdated))
        .unwrap();
    assert_eq!(second.new_level, Some(2));

    let events = engine.store().events_for_user("dev-1").unwrap();
    let level_ups = events.iter().filter(|e| e.event_type == "level_up").count();
    assert_eq!(level_ups, 1);
}

#[test]
fn non_positive_amounts_are_rejected_without_side_effects() {
    let mut engine = engine();
    for amount in [0, -5] {
        let err = engine
            .award_xp(AwardXpRequest::new("dev-1", amount, XpSource::JobSaved))
            .unwrap_err();
        assert!(matches!(err, GameError::InvalidArgument(_)), "got {err:?}");
    }
    assert!(engine.store().load_state("dev-1").unwrap().is_none());
    assert_eq!(engine.store().xp_transaction_count("dev-1").unwrap(), 0);
}

#[test]
fn blank_user_id_is_rejected() {
    let mut engine = engine();
    let err = engine
        .award_xp(AwardXpRequest::new("  ", 10, XpSource::JobSaved))
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_ARGUMENT");
}

#[test]
fn response_shape_reports_failure_instead_of_erroring() {
    let mut engine = engine();
    let ok = engine.award_xp_response(
        AwardXpRequest::new("dev-1", 120, XpSource::CvUploaded)
            .with_source_id("cv-9")
            .with_description("Uploaded resume.pdf"),
    );
    assert!(ok.success);
    assert_eq!(ok.xp_awarded, Some(120));
    assert_eq!(ok.new_level, Some(2));
    assert!(ok.error.is_none());

    let failed = engine.award_xp_response(AwardXpRequest::new("dev-1", 0, XpSource::CvUploaded));
    assert!(!failed.success);
    assert!(failed.xp_awarded.is_none());
    assert!(failed.error.unwrap().contains("positive"));
}

#[test]
fn default_rewards_come_from_config() {
    let mut engine = engine();
    let award = engine.award_xp_for("dev-1", XpSource::JobSaved, Some("job-3")).unwrap();
    assert_eq!(award.xp_awarded, 5);

    let txns = engine.store().recent_xp_transactions("dev-1", 1).unwrap();
    assert_eq!(txns[0].source_id.as_deref(), Some("job-3"));

    // Badge rewards are defined per badge, not per source.
    let err = engine.award_xp_for("dev-1", XpSource::BadgeEarned, None).unwrap_err();
    assert!(matches!(err, GameError::InvalidArgument(_)));
}

/// Level never decreases as XP accumulates, and the stored total always
/// equals the sum of the user's XP transactions.
#[test]
fn level_is_monotonic_and_total_matches_audit_trail() {
    let mut engine = engine();
    let mut last_level = 1;
    let mut expected_total = 0;
    for i in 1..=40 {
        let amount = (i * 37) % 90 + 1;
        let award = engine
            .award_xp(AwardXpRequest::new("grinder", amount, XpSource::ApplicationSubmitted))
            .unwrap();
        expected_total += amount;
        assert!(award.level >= last_level);
        assert_eq!(award.total_xp, expected_total);
        last_level = award.level;
    }
    assert_eq!(engine.store().xp_transaction_total("grinder").unwrap(), expected_total);
    assert_eq!(engine.store().xp_transaction_count("grinder").unwrap(), 40);
}

#[test]
fn progress_stays_below_one_until_max_level() {
    let engine = engine();
    let curve = engine.curve();
    for level in 1..curve.max_level() {
        let next = curve.threshold(level + 1).unwrap();
        let info = engine.compute_level(next - 1).unwrap();
        assert_eq!(info.level, level);
        assert!(info.progress >= 0.0 && info.progress < 1.0);
    }
    let top = curve.threshold(curve.max_level()).unwrap();
    let info = engine.compute_level(top * 2).unwrap();
    assert_eq!(info.level, curve.max_level());
    assert_eq!(info.progress, 1.0);
    assert_eq!(info.xp_to_next_level(top * 2), None);
}
