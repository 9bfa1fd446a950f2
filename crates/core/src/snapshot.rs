//! Pre-write snapshot of tracked entities.
//!
//! A `SaveSnapshot` is taken at the start of every unit-of-work, before any
//! hook runs. It captures each tracked entity's state **at the instant of
//! capture**; the captured state never changes afterwards, even if the live
//! entity is mutated during hook execution. Entries are computed exactly once
//! and memoized; repeated access returns the same allocation.
//!
//! Lifecycle: capture → hooks/extraction read it → release. Release clears
//! the entry list and drops the reference to the tracking context; the
//! snapshot never owns or disposes the context itself. The caller is
//! responsible for releasing on every exit path (the save pipeline does this
//! for errors and early returns alike).

use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::state::EntityState;
use crate::tracking::{TrackedObject, TrackingContext, TrackingError};

/// One tracked object, frozen at snapshot time.
pub struct SnapshotEntry {
    entity: Arc<dyn TrackedObject>,
    original_state: EntityState,
    carries_events: bool,
}

impl SnapshotEntry {
    /// The tracked object (shared with the tracking context).
    pub fn entity(&self) -> &Arc<dyn TrackedObject> {
        &self.entity
    }

    /// The entity's state at the instant the snapshot was captured.
    pub fn original_state(&self) -> EntityState {
        self.original_state
    }

    /// Whether the entity exposed the event-source capability at capture
    /// time. Checked once and cached here.
    pub fn carries_events(&self) -> bool {
        self.carries_events
    }
}

impl core::fmt::Debug for SnapshotEntry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SnapshotEntry")
            .field("entity_type_name", &self.entity.entity_type_name())
            .field("original_state", &self.original_state)
            .field("carries_events", &self.carries_events)
            .finish()
    }
}

/// Snapshot access failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    /// The tracking context was already released when capture was attempted.
    #[error("tracking context has been disposed")]
    ContextDisposed,
    /// The snapshot was released before the access.
    #[error("snapshot has been released")]
    Released,
}

impl From<TrackingError> for SnapshotError {
    fn from(value: TrackingError) -> Self {
        match value {
            TrackingError::Disposed => SnapshotError::ContextDisposed,
        }
    }
}

struct SnapshotInner {
    entries: Arc<[SnapshotEntry]>,
    // Held so hook implementations observing the snapshot keep a live
    // tracker; dropped on release. Not disposed here.
    #[allow(dead_code)]
    context: Arc<dyn TrackingContext>,
}

/// Immutable capture of tracked-entity identities and their pre-write state.
///
/// One per unit-of-work.
pub struct SaveSnapshot {
    inner: Mutex<Option<SnapshotInner>>,
}

impl SaveSnapshot {
    /// Capture an entry for every object the context currently tracks, each
    /// tagged with its state at the instant of this call.
    ///
    /// Does not mutate any entity. Fails only if the context has already been
    /// released.
    pub fn capture(context: Arc<dyn TrackingContext>) -> Result<Self, SnapshotError> {
        let tracked = context.tracked()?;
        let entries: Vec<SnapshotEntry> = tracked
            .into_iter()
            .map(|(entity, state)| {
                let carries_events = entity.as_event_source().is_some();
                SnapshotEntry {
                    entity,
                    original_state: state,
                    carries_events,
                }
            })
            .collect();

        tracing::trace!(entries = entries.len(), "captured save snapshot");

        Ok(Self {
            inner: Mutex::new(Some(SnapshotInner {
                entries: entries.into(),
                context,
            })),
        })
    }

    /// The memoized entry list, in the tracking context's enumeration order.
    ///
    /// Every call returns the same allocation until `release`.
    pub fn entries(&self) -> Result<Arc<[SnapshotEntry]>, SnapshotError> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner
            .as_ref()
            .map(|i| Arc::clone(&i.entries))
            .ok_or(SnapshotError::Released)
    }

    pub fn is_released(&self) -> bool {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.is_none()
    }

    /// Clear the entry list and drop the tracking-context reference.
    ///
    /// Idempotent; subsequent `entries()` calls fail with
    /// [`SnapshotError::Released`].
    pub fn release(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        *inner = None;
    }
}

impl core::fmt::Debug for SaveSnapshot {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        match inner.as_ref() {
            Some(i) => f
                .debug_struct("SaveSnapshot")
                .field("entries", &i.entries.len())
                .finish(),
            None => f.debug_struct("SaveSnapshot").field("released", &true).finish(),
        }
    }
}
