//! `savekit-api` — HTTP integration for the idempotency guard.
//!
//! An axum middleware that short-circuits repeat requests carrying an
//! `Idempotency-Key` header with the cached response (or a conflict),
//! and records first-time results in the configured store.

pub mod middleware;

pub use middleware::{IDEMPOTENCY_KEY_HEADER, IdempotencyState, idempotency_middleware};
