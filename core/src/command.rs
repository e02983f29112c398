use crate::{
    badges::StatField,
    engine::GamificationEngine,
    error::{GameError, GameResult},
    leveling::XpSource,
    points::{PointsSource, SpendType},
    profile::{AwardXpRequest, AwardXpResponse, XpAward},
    types::{Points, UserId, Xp},
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// All commands accepted at the JSON boundary.
/// Variants are added over time; never removed or reordered.
///
/// Enum-valued fields arrive as plain strings and are parsed by the
/// engine, so an unknown source comes back as `INVALID_ARGUMENT` rather
/// than a malformed-request error. `award_xp` always answers in the
/// `AwardXpResponse` shape, parse failures included.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum GamificationCommand {
    // ── XP ─────────────────────────────────────────
    #[serde(rename_all = "camelCase")]
    AwardXp {
        user_id:     UserId,
        amount:      Xp,
        source:      String,
        #[serde(default)]
        source_id:   Option<String>,
        #[serde(default)]
        description: Option<String>,
    },

    // ── Points ─────────────────────────────────────
    #[serde(rename_all = "camelCase")]
    SpendPoints {
        user_id:     UserId,
        amount:      Points,
        spend_type:  String,
        #[serde(default)]
        description: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    CreditPoints {
        user_id:     UserId,
        amount:      Points,
        source:      String,
        #[serde(default)]
        description: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    AwardPoints {
        user_id:  UserId,
        amount:   Points,
        #[serde(default)]
        admin_id: Option<String>,
        #[serde(default)]
        reason:   Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    SetExactPoints {
        user_id:            UserId,
        target:             Points,
        #[serde(default)]
        admin_id:           Option<String>,
        #[serde(default)]
        expected_available: Option<Points>,
    },

    // ── Reads ──────────────────────────────────────
    #[serde(rename_all = "camelCase")]
    GetProfile { user_id: UserId },
    #[serde(rename_all = "camelCase")]
    GetBadges { user_id: UserId },
    Leaderboard {
        #[serde(default = "default_leaderboard_limit")]
        limit: usize,
    },

    // ── Activity & stats ───────────────────────────
    #[serde(rename_all = "camelCase")]
    RecordActivity { user_id: UserId },
    #[serde(rename_all = "camelCase")]
    RecordStat {
        user_id: UserId,
        field:   String,
        value:   i64,
    },
}

fn default_leaderboard_limit() -> usize {
    10
}

/// Error payload shape: `{ "error": { "code", "message" } }`.
pub fn error_json(err: &GameError) -> Value {
    json!({ "error": { "code": err.code(), "message": err.to_string() } })
}

fn respond<T: Serialize>(result: GameResult<T>) -> Value {
    match result.and_then(|v| serde_json::to_value(v).map_err(GameError::from)) {
        Ok(value) => value,
        Err(e) => {
            if e.is_client_error() {
                log::debug!("command rejected: {e}");
            } else {
                log::warn!("command failed: {e}");
            }
            error_json(&e)
        }
    }
}

impl GamificationEngine {
    /// Execute one command and render its result as JSON.
    pub fn dispatch(&mut self, cmd: GamificationCommand) -> Value {
        match cmd {
            GamificationCommand::AwardXp {
                user_id,
                amount,
                source,
                source_id,
                description,
            } => {
                let response = match source.parse::<XpSource>() {
                    Ok(source) => self.award_xp_response(AwardXpRequest {
                        user_id,
                        amount,
                        source,
                        source_id,
                        description,
                    }),
                    Err(e) => {
                        log::debug!("award_xp rejected: {e}");
                        AwardXpResponse::from(Err::<XpAward, _>(e))
                    }
                };
                respond(Ok(response))
            }
            GamificationCommand::SpendPoints {
                user_id,
                amount,
                spend_type,
                description,
            } => respond(spend_type.parse::<SpendType>().and_then(|spend_type| {
                self.spend_points(&user_id, amount, spend_type, description.as_deref())
            })),
            GamificationCommand::CreditPoints {
                user_id,
                amount,
                source,
                description,
            } => respond(source.parse::<PointsSource>().and_then(|source| {
                self.credit_points(&user_id, amount, source, description.as_deref())
            })),
            GamificationCommand::AwardPoints {
                user_id,
                amount,
                admin_id,
                reason,
            } => respond(self.award_points(
                &user_id,
                amount,
                admin_id.as_deref(),
                reason.as_deref(),
            )),
            GamificationCommand::SetExactPoints {
                user_id,
                target,
                admin_id,
                expected_available,
            } => respond(self.set_exact_points(
                &user_id,
                target,
                admin_id.as_deref(),
                expected_available,
            )),
            GamificationCommand::GetProfile { user_id } => {
                respond(self.get_user_profile(&user_id))
            }
            GamificationCommand::GetBadges { user_id } => respond(self.evaluate_badges(&user_id)),
            GamificationCommand::Leaderboard { limit } => respond(self.leaderboard(limit)),
            GamificationCommand::RecordActivity { user_id } => respond(
                self.record_activity(&user_id)
                    .map(|streak| json!({ "userId": user_id, "streak": streak })),
            ),
            GamificationCommand::RecordStat {
                user_id,
                field,
                value,
            } => respond(field.parse::<StatField>().and_then(|field| {
                self.record_stat(&user_id, field, value)?;
                Ok(json!({ "userId": user_id, "field": field, "value": value }))
            })),
        }
    }

    /// Parse one JSON line and dispatch it. Malformed input is reported
    /// as `INVALID_ARGUMENT`.
    pub fn dispatch_json(&mut self, line: &str) -> Value {
        match serde_json::from_str::<GamificationCommand>(line) {
            Ok(cmd) => self.dispatch(cmd),
            Err(e) => error_json(&GameError::invalid(format!("malformed command: {e}"))),
        }
    }
}
