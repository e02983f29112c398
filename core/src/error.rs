use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GameError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Insufficient points: requested {requested}, available {available}")]
    InsufficientPoints { requested: i64, available: i64 },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Concurrency conflict on user '{user_id}': {detail}")]
    ConcurrencyConflict { user_id: String, detail: String },

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Database error: {0}")]
    Database(rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type GameResult<T> = Result<T, GameError>;

impl GameError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        GameError::InvalidArgument(msg.into())
    }

    pub fn conflict(user_id: &str, detail: impl Into<String>) -> Self {
        GameError::ConcurrencyConflict {
            user_id: user_id.to_string(),
            detail:  detail.into(),
        }
    }

    /// Stable machine-readable code used at the JSON boundary.
    pub fn code(&self) -> &'static str {
        match self {
            GameError::InvalidArgument(_)          => "INVALID_ARGUMENT",
            GameError::InsufficientPoints { .. }   => "INSUFFICIENT_POINTS",
            GameError::NotFound(_)                 => "NOT_FOUND",
            GameError::ConcurrencyConflict { .. }  => "CONCURRENCY_CONFLICT",
            GameError::StorageUnavailable(_)       => "STORAGE_UNAVAILABLE",
            GameError::Database(_)                 => "DATABASE_ERROR",
            GameError::Serialization(_)            => "SERIALIZATION_ERROR",
            GameError::Other(_)                    => "INTERNAL_ERROR",
        }
    }

    /// True for errors the caller can fix by changing its input.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            GameError::InvalidArgument(_)
                | GameError::InsufficientPoints { .. }
                | GameError::NotFound(_)
        )
    }
}

/// Busy and locked databases mean another writer holds the lock, which the
/// façade treats as a retryable conflict. Errors that make the database
/// unusable for this request become `StorageUnavailable`.
impl From<rusqlite::Error> for GameError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => {
                GameError::ConcurrencyConflict {
                    user_id: String::new(),
                    detail:  err.to_string(),
                }
            }
            Some(ErrorCode::CannotOpen)
            | Some(ErrorCode::SystemIoFailure)
            | Some(ErrorCode::DiskFull)
            | Some(ErrorCode::ReadOnly)
            | Some(ErrorCode::NotADatabase)
            | Some(ErrorCode::DatabaseCorrupt) => GameError::StorageUnavailable(err.to_string()),
            _ => GameError::Database(err),
        }
    }
}
