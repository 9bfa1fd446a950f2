//! `savekit-infra` — infrastructure composition.
//!
//! Home of the save pipeline (the unit-of-work orchestrator that composes
//! tracking context, hooks, write engine and event bus) and the Postgres
//! backend of the idempotency store.

pub mod idempotency_store;
pub mod save_pipeline;

#[cfg(test)]
mod integration_tests;

pub use idempotency_store::PostgresIdempotencyStore;
pub use save_pipeline::{PersistenceEngine, SaveError, SaveOutcome, SavePipeline, WriteError};
