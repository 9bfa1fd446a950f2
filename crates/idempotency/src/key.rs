//! Idempotency-key normalization and composite-key derivation.
//!
//! Raw client keys are normalized before use: every character outside
//! `[A-Za-z0-9-]` is stripped, the remainder is case-folded to lowercase and
//! truncated. Normalization prevents storage injection through the key column
//! and collapses whitespace/casing variants of the same logical key onto one
//! composite key.
//!
//! The composite key, the store's true dedup key, is the lowercase hex
//! SHA-256 digest of `method '\n' endpoint '\n' sanitized-key`. The digest is
//! 64 characters, which keeps arbitrary endpoint lengths inside the bounded
//! unique column.

use sha2::{Digest, Sha256};

use crate::store::IdempotencyError;

/// Storage bound for the sanitized client key.
pub const MAX_KEY_LENGTH: usize = 150;
/// Storage bound for the endpoint fingerprint.
pub const MAX_ENDPOINT_LENGTH: usize = 250;
/// Storage bound for the method fingerprint.
pub const MAX_METHOD_LENGTH: usize = 20;

/// Normalize a raw client key: strip everything outside `[A-Za-z0-9-]`,
/// lowercase, truncate to `max_len`.
pub fn sanitize_key(raw: &str, max_len: usize) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .map(|c| c.to_ascii_lowercase())
        .take(max_len)
        .collect()
}

/// A validated `(key, endpoint, method)` triple.
///
/// Construction sanitizes the client key and rejects malformed input before
/// any store access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdempotencyKey {
    key: String,
    endpoint: String,
    method: String,
}

impl IdempotencyKey {
    /// Sanitize and validate. `max_key_length` comes from configuration and
    /// is clamped to the storage bound.
    pub fn new(
        raw_key: &str,
        endpoint: &str,
        method: &str,
        max_key_length: usize,
    ) -> Result<Self, IdempotencyError> {
        let max_key_length = max_key_length.min(MAX_KEY_LENGTH);

        if raw_key.len() > max_key_length {
            return Err(IdempotencyError::validation(format!(
                "idempotency key exceeds {max_key_length} characters"
            )));
        }

        let key = sanitize_key(raw_key, max_key_length);
        if key.is_empty() {
            return Err(IdempotencyError::validation(
                "idempotency key contains no valid characters",
            ));
        }

        if endpoint.is_empty() || endpoint.len() > MAX_ENDPOINT_LENGTH {
            return Err(IdempotencyError::validation(format!(
                "endpoint must be 1..={MAX_ENDPOINT_LENGTH} characters"
            )));
        }
        if method.is_empty() || method.len() > MAX_METHOD_LENGTH {
            return Err(IdempotencyError::validation(format!(
                "method must be 1..={MAX_METHOD_LENGTH} characters"
            )));
        }

        Ok(Self {
            key,
            endpoint: endpoint.to_string(),
            method: method.to_ascii_uppercase(),
        })
    }

    /// The sanitized client key.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// Derive the store's dedup key for this triple.
    pub fn composite(&self) -> CompositeKey {
        let mut hasher = Sha256::new();
        hasher.update(self.method.as_bytes());
        hasher.update(b"\n");
        hasher.update(self.endpoint.as_bytes());
        hasher.update(b"\n");
        hasher.update(self.key.as_bytes());
        CompositeKey(hex::encode(hasher.finalize()))
    }
}

/// Unique dedup key derived from a sanitized `(key, endpoint, method)`
/// triple. 64 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompositeKey(String);

impl CompositeKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl core::fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
