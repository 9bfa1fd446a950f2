//! Idempotency store backends.
//!
//! The store contract and the in-memory implementation live in
//! `savekit-idempotency`; this module provides the Postgres production
//! backend.

mod postgres;

pub use postgres::PostgresIdempotencyStore;
