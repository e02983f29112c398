//! JSON command boundary.

use chrono::{TimeZone, Utc};
use gamification_core::{clock::ManualClock, engine::GamificationEngine};
use serde_json::json;
use std::sync::Arc;

fn engine() -> GamificationEngine {
    let _ = env_logger::builder().is_test(true).try_init();
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 5, 10, 8, 0, 0).unwrap()));
    GamificationEngine::build_test(clock).unwrap()
}

#[test]
fn award_xp_command_returns_award_response() {
    let mut engine = engine();
    let out = engine.dispatch_json(
        r#"{"cmd":"award_xp","userId":"dev-1","amount":100,"source":"CV_UPLOADED","sourceId":"cv-1"}"#,
    );
    assert_eq!(out, json!({ "success": true, "xpAwarded": 100, "newLevel": 2 }));

    let failed = engine.dispatch_json(
        r#"{"cmd":"award_xp","userId":"dev-1","amount":-1,"source":"CV_UPLOADED"}"#,
    );
    assert_eq!(failed["success"], false);
    assert!(failed["error"].is_string());
}

#[test]
fn unknown_enum_values_are_invalid_arguments() {
    let mut engine = engine();
    // award_xp keeps its own response shape for every failure.
    let out = engine.dispatch_json(
        r#"{"cmd":"award_xp","userId":"dev-1","amount":10,"source":"TELEPORTED"}"#,
    );
    assert_eq!(out["success"], false);
    assert!(out["error"].as_str().unwrap().contains("TELEPORTED"));
    assert!(out.get("xpAwarded").is_none());

    let zero = engine.dispatch_json(
        r#"{"cmd":"award_xp","userId":"dev-1","amount":0,"source":"CV_UPLOADED"}"#,
    );
    assert_eq!(zero["success"], false);
    assert!(zero["error"].is_string());

    let out = engine.dispatch_json(
        r#"{"cmd":"spend_points","userId":"dev-1","amount":10,"spendType":"LOTTERY"}"#,
    );
    assert_eq!(out["error"]["code"], "INVALID_ARGUMENT");
}

#[test]
fn malformed_json_is_reported_not_panicked() {
    let mut engine = engine();
    let out = engine.dispatch_json("{not json");
    assert_eq!(out["error"]["code"], "INVALID_ARGUMENT");

    let out = engine.dispatch_json(r#"{"cmd":"launch_rockets"}"#);
    assert_eq!(out["error"]["code"], "INVALID_ARGUMENT");
}

#[test]
fn points_commands_round_trip_through_the_engine() {
    let mut engine = engine();
    let out = engine.dispatch_json(r#"{"cmd":"record_activity","userId":"dev-1"}"#);
    assert_eq!(out, json!({ "userId": "dev-1", "streak": 1 }));

    let out = engine.dispatch_json(
        r#"{"cmd":"spend_points","userId":"dev-1","amount":60,"spendType":"CV_ANALYSIS"}"#,
    );
    assert_eq!(out["available"], 40);
    assert_eq!(out["delta"], -60);

    let out = engine.dispatch_json(
        r#"{"cmd":"spend_points","userId":"dev-1","amount":60,"spendType":"CV_ANALYSIS"}"#,
    );
    assert_eq!(out["error"]["code"], "INSUFFICIENT_POINTS");

    let out = engine.dispatch_json(
        r#"{"cmd":"set_exact_points","userId":"dev-1","target":100,"adminId":"admin-1"}"#,
    );
    assert_eq!(out["delta"], 60);
    assert_eq!(out["available"], 100);

    let out = engine.dispatch_json(
        r#"{"cmd":"award_points","userId":"dev-1","amount":25,"reason":"bug bounty"}"#,
    );
    assert_eq!(out["available"], 125);

    let out = engine.dispatch_json(
        r#"{"cmd":"credit_points","userId":"dev-1","amount":5,"source":"MONTHLY_RESET"}"#,
    );
    assert_eq!(out["error"]["code"], "INVALID_ARGUMENT");
}

#[test]
fn profile_and_stats_commands() {
    let mut engine = engine();
    let out = engine.dispatch_json(r#"{"cmd":"get_profile","userId":"ghost"}"#);
    assert_eq!(out["error"]["code"], "NOT_FOUND");

    let out = engine.dispatch_json(
        r#"{"cmd":"record_stat","userId":"dev-1","field":"profile_completeness","value":100}"#,
    );
    assert_eq!(out["field"], "profile_completeness");

    let out = engine.dispatch_json(r#"{"cmd":"get_profile","userId":"dev-1"}"#);
    assert_eq!(out["totalXP"], 100);
    let badges = out["badges"].as_array().unwrap();
    let pioneer = badges
        .iter()
        .find(|b| b["id"] == "profile_pioneer")
        .unwrap();
    assert_eq!(pioneer["isEarned"], true);

    let out = engine.dispatch_json(r#"{"cmd":"leaderboard","limit":5}"#);
    assert_eq!(out[0]["rank"], 1);
    assert_eq!(out[0]["userId"], "dev-1");
    assert_eq!(out[0]["totalXP"], 100);
}
