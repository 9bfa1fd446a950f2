use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::key::IdempotencyKey;
use crate::response::CachedResponse;
use crate::store::IdempotencyError;

/// Storage bound for cached response bodies (1 MiB).
pub const MAX_BODY_BYTES: usize = 1024 * 1024;
/// Storage bound for the content-type column.
pub const MAX_CONTENT_TYPE_LENGTH: usize = 256;

/// Persistent idempotency row.
///
/// Created once per distinct composite key on first successful completion of
/// the guarded operation; never updated. Rows become eligible for deletion
/// once `expires_at` has passed (a housekeeping job's business, not this
/// crate's).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdempotencyKeyRecord {
    pub id: Uuid,
    pub idempotent_key: String,
    pub endpoint: String,
    pub method: String,
    pub composite_key: String,
    pub status_code: u16,
    pub body: Option<String>,
    pub content_type: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl IdempotencyKeyRecord {
    /// Build a record from a validated key and a response.
    ///
    /// Enforces in code what the check constraint enforces in the schema:
    /// status 100–599, body ≤ 1 MiB, content-type ≤ 256 chars.
    pub fn new(
        key: &IdempotencyKey,
        response: &CachedResponse,
    ) -> Result<Self, IdempotencyError> {
        if !(100..=599).contains(&response.status_code) {
            return Err(IdempotencyError::validation(format!(
                "status code {} outside 100..=599",
                response.status_code
            )));
        }
        if let Some(body) = &response.body {
            if body.len() > MAX_BODY_BYTES {
                return Err(IdempotencyError::validation(format!(
                    "response body exceeds {MAX_BODY_BYTES} bytes"
                )));
            }
        }
        if let Some(content_type) = &response.content_type {
            if content_type.len() > MAX_CONTENT_TYPE_LENGTH {
                return Err(IdempotencyError::validation(format!(
                    "content type exceeds {MAX_CONTENT_TYPE_LENGTH} characters"
                )));
            }
        }

        Ok(Self {
            id: Uuid::now_v7(),
            idempotent_key: key.key().to_string(),
            endpoint: key.endpoint().to_string(),
            method: key.method().to_string(),
            composite_key: key.composite().into_string(),
            status_code: response.status_code,
            body: response.body.clone(),
            content_type: response.content_type.clone(),
            created_at: response.created_at,
            expires_at: response.expires_at,
        })
    }

    /// The cached response a repeat caller receives.
    pub fn to_response(&self) -> CachedResponse {
        CachedResponse {
            status_code: self.status_code,
            body: self.body.clone(),
            content_type: self.content_type.clone(),
            created_at: self.created_at,
            expires_at: self.expires_at,
        }
    }
}
