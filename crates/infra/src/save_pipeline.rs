//! Save pipeline (unit-of-work orchestration).
//!
//! One save runs this sequence:
//!
//! ```text
//! Tracking context
//!   ↓
//! 1. Capture pre-write snapshot (fails if the context was disposed)
//!   ↓
//! 2. Run before-hooks (registration order, fail-fast; aborts the write)
//!   ↓
//! 3. Execute the underlying write
//!   ↓
//! 4. Run after-hooks (only if the write succeeded)
//!   ↓
//! 5. Extract queued domain events from the snapshot and publish them
//!   ↓
//! 6. Release the snapshot (every exit path, including errors)
//! ```
//!
//! The pipeline composes trait objects only (tracking context, persistence
//! engine, event bus), so the same orchestration runs against in-memory
//! implementations in tests and real backends in production. Calling `save`
//! twice on the same context is legal: each call takes a fresh snapshot and
//! runs the hooks again; whether anything material changed is the write
//! engine's business.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use savekit_core::{SaveSnapshot, SnapshotError, TrackingContext};
use savekit_events::{EventBus, EventMapper, EventObject, extract_events};
use savekit_hooks::{HookError, HookRegistry, HookRunner, HookSuspension};

/// Executes the underlying write of a unit-of-work.
///
/// The persistence engine is an external collaborator; the pipeline only
/// cares that the write either succeeds with an affected-row count or fails.
#[async_trait]
pub trait PersistenceEngine: Send + Sync {
    async fn execute_write(&self) -> Result<u64, WriteError>;
}

/// Underlying write failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("write failed: {0}")]
pub struct WriteError(pub String);

/// Save pipeline failure.
#[derive(Debug, Error)]
pub enum SaveError {
    /// Snapshot capture or access failed (disposed context, released
    /// snapshot).
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    /// A hook failed; the phase and the write were aborted.
    #[error(transparent)]
    Hook(#[from] HookError),

    /// The underlying write failed; after-hooks did not run.
    #[error(transparent)]
    Write(#[from] WriteError),

    /// Event publication failed after a successful write. The write is
    /// committed; re-publication is the caller's decision.
    #[error("event publication failed: {0}")]
    Publish(String),
}

/// Result of a completed unit-of-work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOutcome {
    pub rows_affected: u64,
    pub events_published: usize,
}

/// Unit-of-work orchestrator.
#[derive(Debug)]
pub struct SavePipeline<E, B> {
    engine: E,
    bus: B,
    hooks: HookRegistry,
    runner: HookRunner,
}

impl<E, B> SavePipeline<E, B> {
    pub fn new(engine: E, bus: B, hooks: HookRegistry) -> Self {
        Self {
            engine,
            bus,
            hooks,
            runner: HookRunner::new(),
        }
    }

    /// The suspension switch governing this pipeline's hook phases.
    pub fn suspension(&self) -> Arc<HookSuspension> {
        self.runner.suspension()
    }

    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }
}

impl<E, B> SavePipeline<E, B>
where
    E: PersistenceEngine,
    B: EventBus<EventObject>,
{
    /// Run one unit-of-work without an event mapper.
    pub async fn save(&self, context: Arc<dyn TrackingContext>) -> Result<SaveOutcome, SaveError> {
        self.save_with_mapper(context, None).await
    }

    /// Run one unit-of-work.
    ///
    /// The snapshot is released on every exit path; a failure in any phase
    /// still leaves the snapshot cleanly released.
    pub async fn save_with_mapper(
        &self,
        context: Arc<dyn TrackingContext>,
        mapper: Option<&dyn EventMapper>,
    ) -> Result<SaveOutcome, SaveError> {
        // 1) Capture the pre-write snapshot.
        let snapshot = SaveSnapshot::capture(context)?;

        let result = self.run_phases(&snapshot, mapper).await;

        // 6) Release, success or not.
        snapshot.release();

        result
    }

    async fn run_phases(
        &self,
        snapshot: &SaveSnapshot,
        mapper: Option<&dyn EventMapper>,
    ) -> Result<SaveOutcome, SaveError> {
        // 2) Before-hooks (no-op while suspended; fail-fast aborts the write).
        self.runner
            .run_before(snapshot, self.hooks.before_hooks())
            .await?;

        // 3) Underlying write.
        let rows_affected = self.engine.execute_write().await?;

        // 4) After-hooks (only reached when the write succeeded).
        self.runner
            .run_after(snapshot, self.hooks.after_hooks())
            .await?;

        // 5) Drain queued events and publish them.
        let mut events_published = 0;
        for event_object in extract_events(snapshot, mapper)? {
            self.bus
                .publish(event_object)
                .map_err(|e| SaveError::Publish(format!("{e:?}")))?;
            events_published += 1;
        }

        tracing::debug!(rows_affected, events_published, "unit-of-work completed");

        Ok(SaveOutcome {
            rows_affected,
            events_published,
        })
    }
}
