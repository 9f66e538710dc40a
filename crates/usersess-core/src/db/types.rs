//! Database types for usersess-core.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Entity Types
// ─────────────────────────────────────────────────────────────────────────────

/// Relational metadata for one live or recently-expired session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Primary key used by the host session protocol
    pub identifier: String,
    /// Key under which the delegate engine stores the payload
    pub payload_key: String,
    /// Owning principal, once known
    pub user_id: Option<String>,
    /// Human readable label, e.g. "Firefox on Linux (Generic desktop)"
    pub display_name: String,
    pub user_agent: String,
    pub client_address: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub accessed_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
}

impl SessionRecord {
    /// Whether the record is logically expired at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }

    /// Whether the record is logically expired right now
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Whether a non-empty owner has been associated
    pub fn has_user(&self) -> bool {
        self.user_id.as_deref().is_some_and(|u| !u.is_empty())
    }
}

/// Result of moving a record to a new primary key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenameOutcome {
    /// The source row was rewritten under the new identifier
    Renamed(SessionRecord),
    /// The source row is gone and the target exists: an earlier attempt won
    AlreadyRenamed(SessionRecord),
    /// Neither row exists (the source was destroyed or swept meanwhile)
    SourceMissing,
}

// ─────────────────────────────────────────────────────────────────────────────
// Timestamp helpers (stored as unix milliseconds)
// ─────────────────────────────────────────────────────────────────────────────

pub(crate) fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

pub(crate) fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}
