//! Idempotency guard configuration.

use chrono::Duration;

use crate::key::MAX_KEY_LENGTH;
use crate::record::MAX_BODY_BYTES;

/// What a repeat caller sees once a key is already processed.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ConflictHandling {
    /// Replay the cached status/body/content-type.
    ReturnCachedResult,
    /// Signal an explicit conflict instead of replaying.
    ConflictResponse,
}

/// Policy when the store itself is unavailable.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FailureMode {
    /// Proceed without the idempotency guarantee.
    FailOpen,
    /// Reject the request.
    FailClosed,
}

/// Recognized options of the idempotency guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdempotencyConfig {
    pub conflict_handling: ConflictHandling,
    /// Whether non-2xx results are persisted at all.
    pub cache_error_responses: bool,
    /// Row lifetime; expired rows are treated as absent.
    pub expiration: Duration,
    /// Bodies above this size are silently not cached (the handler result is
    /// still returned to the caller).
    pub max_body_bytes: usize,
    /// Raw keys above this length are rejected before any store access.
    pub max_key_length: usize,
    pub failure_mode: FailureMode,
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            conflict_handling: ConflictHandling::ReturnCachedResult,
            cache_error_responses: false,
            expiration: Duration::hours(24),
            max_body_bytes: MAX_BODY_BYTES,
            max_key_length: MAX_KEY_LENGTH,
            failure_mode: FailureMode::FailOpen,
        }
    }
}
