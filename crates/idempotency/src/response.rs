use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Cached outcome of a guarded operation.
///
/// Derived from or persisted into an
/// [`IdempotencyKeyRecord`](crate::IdempotencyKeyRecord); this is what a
/// repeat caller receives instead of re-running the handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub status_code: u16,
    pub body: Option<String>,
    pub content_type: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CachedResponse {
    /// Expired responses are treated as absent by the store.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
