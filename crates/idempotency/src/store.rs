//! Idempotency store contract.
//!
//! State machine per composite key: `Unseen → Processing (implicit, not
//! persisted) → Processed(cached response)`. Only the terminal `Processed`
//! state exists as a row; "in-flight" is inferred by absence.
//!
//! ## Concurrency
//!
//! A check-then-act sequence ("look up, then insert") is inherently racy
//! across concurrent callers presenting the same key: all of them may
//! observe "absent" before any insert commits. Correctness is therefore NOT
//! provided by the lookup; it is provided by the backing store's unique
//! constraint on the composite key, which admits exactly one successful
//! insert and rejects the rest. Implementations must catch that **specific**
//! violation and report it as [`MarkOutcome::AlreadyRecorded`], an expected,
//! benign outcome, never an error surfaced to the caller.
//!
//! The store deduplicates **storage**, not handler execution: callers that
//! lose the race have already run their handler redundantly. If true
//! single-execution is required, serialize upstream with an explicit
//! lock/timeout; a distributed-lock variant is a documented but
//! unimplemented extension.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::key::CompositeKey;
use crate::record::IdempotencyKeyRecord;
use crate::response::CachedResponse;

/// Idempotency guard failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdempotencyError {
    /// Malformed or oversized input; rejected before any store access. Never
    /// retried.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The backing store could not be reached or timed out. Whether the
    /// caller fails open or closed is a policy decision, not this crate's.
    #[error("idempotency store unavailable: {0}")]
    Unavailable(String),
}

impl IdempotencyError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }
}

/// Result of recording a processed key.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MarkOutcome {
    /// This caller's insert won; its response is the canonical cached value.
    Recorded,
    /// A row for the composite key already existed (concurrent caller won
    /// the race, or the key was processed earlier). Benign.
    AlreadyRecorded,
}

/// Persistent at-most-once guard keyed by composite key.
#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    /// Look up a composite key.
    ///
    /// Returns `None` when the key is absent **or** the stored row has
    /// expired. Expired rows are treated as absent, not deleted here.
    async fn is_key_processed(
        &self,
        key: &CompositeKey,
    ) -> Result<Option<CachedResponse>, IdempotencyError>;

    /// Record a processed key.
    ///
    /// At most one row per composite key ever exists; losing the insert race
    /// yields [`MarkOutcome::AlreadyRecorded`], not an error. The first
    /// recorded response is retained.
    async fn mark_key_processed(
        &self,
        record: IdempotencyKeyRecord,
    ) -> Result<MarkOutcome, IdempotencyError>;
}

#[async_trait]
impl<S> IdempotencyStore for Arc<S>
where
    S: IdempotencyStore + ?Sized,
{
    async fn is_key_processed(
        &self,
        key: &CompositeKey,
    ) -> Result<Option<CachedResponse>, IdempotencyError> {
        (**self).is_key_processed(key).await
    }

    async fn mark_key_processed(
        &self,
        record: IdempotencyKeyRecord,
    ) -> Result<MarkOutcome, IdempotencyError> {
        (**self).mark_key_processed(record).await
    }
}
