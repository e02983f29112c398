//! Shared primitive types used across the engine.

/// Identifier of a platform user. Issued by the auth layer, opaque here.
pub type UserId = String;

/// Identifier of an XP or points transaction record (UUID v4 text).
pub type TransactionId = String;

/// Identifier of a static badge definition.
pub type BadgeId = &'static str;

/// Experience points. Signed so that invalid input can be rejected
/// explicitly instead of wrapping.
pub type Xp = i64;

/// Spendable points. Transaction amounts are signed.
pub type Points = i64;

/// Level number, starting at 1.
pub type Level = u32;
